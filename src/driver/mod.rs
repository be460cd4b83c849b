//! Capability interface shared by the three native drivers.
//!
//! A physical connection picks its driver once, when the pool creates it.
//! Everything above this module talks to [`DriverAdapter`] and never to a
//! driver type directly.

use async_trait::async_trait;
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::Value;
use crate::types::DriverType;

#[cfg(feature = "blocking")]
use crate::blocking::BlockingDriver;
#[cfg(feature = "embedded")]
use crate::embedded::EmbeddedConnection;
#[cfg(feature = "multiplexed")]
use crate::multiplexed::MultiplexedDriver;

pub(crate) use crate::pubsub::MessageSink;

/// Native reply to `MULTI` ... `EXEC`.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TransactionReply {
    Committed(Vec<Value>),
    /// `EXEC` answered nil because a watched key changed.
    Aborted,
}

/// One command surface over a native driver.
///
/// Server-side rejections come back in-band as [`Value::Error`]; an `Err`
/// means the driver itself failed (socket, worker thread, timeout).
#[async_trait]
pub(crate) trait DriverAdapter: Send {
    fn driver_type(&self) -> DriverType;

    async fn execute(&mut self, command: &Command) -> Result<Value, ValkeyMiddlewareError>;

    /// Send every command without waiting for individual replies; one reply
    /// per command, in order.
    async fn execute_pipeline(
        &mut self,
        commands: &[Command],
    ) -> Result<Vec<Value>, ValkeyMiddlewareError>;

    /// Wrap the commands in `MULTI` / `EXEC`.
    async fn execute_transaction(
        &mut self,
        commands: &[Command],
    ) -> Result<TransactionReply, ValkeyMiddlewareError>;

    /// Subscribe to exact channels, opening the pub/sub link on first use.
    /// Returns once the driver has confirmed the subscription.
    async fn subscribe(
        &mut self,
        channels: &[Vec<u8>],
        sink: &MessageSink,
    ) -> Result<(), ValkeyMiddlewareError>;

    async fn psubscribe(
        &mut self,
        patterns: &[Vec<u8>],
        sink: &MessageSink,
    ) -> Result<(), ValkeyMiddlewareError>;

    async fn unsubscribe(&mut self, channels: &[Vec<u8>]) -> Result<(), ValkeyMiddlewareError>;

    async fn punsubscribe(&mut self, patterns: &[Vec<u8>]) -> Result<(), ValkeyMiddlewareError>;
}

/// The driver a physical connection was created with.
pub(crate) enum DriverConnection {
    #[cfg(feature = "multiplexed")]
    Multiplexed(MultiplexedDriver),
    #[cfg(feature = "blocking")]
    Blocking(BlockingDriver),
    #[cfg(feature = "embedded")]
    Embedded(EmbeddedConnection),
}

impl DriverConnection {
    pub(crate) fn adapter(&mut self) -> &mut dyn DriverAdapter {
        match self {
            #[cfg(feature = "multiplexed")]
            DriverConnection::Multiplexed(driver) => driver,
            #[cfg(feature = "blocking")]
            DriverConnection::Blocking(driver) => driver,
            #[cfg(feature = "embedded")]
            DriverConnection::Embedded(conn) => conn,
        }
    }

    pub(crate) fn driver_type(&self) -> DriverType {
        match self {
            #[cfg(feature = "multiplexed")]
            DriverConnection::Multiplexed(_) => DriverType::Multiplexed,
            #[cfg(feature = "blocking")]
            DriverConnection::Blocking(_) => DriverType::Blocking,
            #[cfg(feature = "embedded")]
            DriverConnection::Embedded(_) => DriverType::Embedded,
        }
    }
}

impl std::fmt::Debug for DriverConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("DriverConnection")
            .field(&self.driver_type())
            .finish()
    }
}

/// Subscription change a network driver forwards to its pub/sub link.
#[cfg(any(feature = "multiplexed", feature = "blocking"))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SubscribeVerb {
    Subscribe,
    PSubscribe,
    Unsubscribe,
    PUnsubscribe,
}

/// Read the `EXEC` reply of a transaction whose commands were queued one by one.
#[cfg(any(feature = "multiplexed", feature = "blocking"))]
pub(crate) fn exec_reply(reply: Value) -> Result<TransactionReply, ValkeyMiddlewareError> {
    match reply {
        Value::Nil => Ok(TransactionReply::Aborted),
        Value::Array(items) => Ok(TransactionReply::Committed(items)),
        Value::Error(err) => Err(ValkeyMiddlewareError::Backend(err)),
        other => Err(ValkeyMiddlewareError::Backend(
            crate::error::ServerError::err(format!("unexpected EXEC reply {}", other.describe())),
        )),
    }
}

#[cfg(all(test, any(feature = "multiplexed", feature = "blocking")))]
mod tests {
    use super::*;
    use crate::error::ServerError;

    #[test]
    fn nil_exec_means_aborted() {
        assert_eq!(exec_reply(Value::Nil).ok(), Some(TransactionReply::Aborted));
        assert_eq!(
            exec_reply(Value::Array(vec![])).ok(),
            Some(TransactionReply::Committed(vec![]))
        );
        let err = exec_reply(Value::Error(ServerError::parse("EXECABORT Transaction discarded")))
            .unwrap_err();
        assert_eq!(err.server_error().map(|e| e.code.as_str()), Some("EXECABORT"));
    }
}
