//! Driver-native handles for the `interact_*` helpers.

#[cfg(feature = "embedded")]
use crate::embedded::EmbeddedStore;

/// The native connection under a pooled slot, lent to a user closure.
///
/// Whatever the closure does bypasses mode tracking and the subscription
/// registry. It must leave the connection the way it found it: no open
/// `MULTI`, no `WATCH`, no subscriptions.
pub enum AnyConnWrapper<'a> {
    /// redis-rs multiplexed connection
    #[cfg(feature = "multiplexed")]
    Multiplexed(&'a mut redis::aio::MultiplexedConnection),
    /// Synchronous redis-rs connection, lent on the worker thread
    #[cfg(feature = "blocking")]
    Blocking(&'a mut redis::Connection),
    /// Shared in-process store
    #[cfg(feature = "embedded")]
    Embedded(&'a EmbeddedStore),
}

impl std::fmt::Debug for AnyConnWrapper<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "multiplexed")]
            AnyConnWrapper::Multiplexed(_) => f.write_str("AnyConnWrapper::Multiplexed"),
            #[cfg(feature = "blocking")]
            AnyConnWrapper::Blocking(_) => f.write_str("AnyConnWrapper::Blocking"),
            #[cfg(feature = "embedded")]
            AnyConnWrapper::Embedded(store) => {
                f.debug_tuple("AnyConnWrapper::Embedded").field(store).finish()
            }
        }
    }
}
