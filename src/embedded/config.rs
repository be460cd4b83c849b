use super::EmbeddedStore;
use crate::config::ConnectionOptions;
use crate::error::ValkeyMiddlewareError;
use crate::pool::{ConfigAndPool, DriverFactory};

impl ConfigAndPool {
    /// Pool over a fresh in-process store. `opts.url` is ignored.
    ///
    /// # Errors
    /// Returns `ValkeyMiddlewareError::ConfigError` for invalid pool options.
    pub async fn new_embedded(opts: ConnectionOptions) -> Result<Self, ValkeyMiddlewareError> {
        Self::new_embedded_with_store(opts, EmbeddedStore::new()).await
    }

    /// Pool over an existing store, so several pools can share one keyspace.
    ///
    /// # Errors
    /// Returns `ValkeyMiddlewareError::ConfigError` for invalid pool options.
    pub async fn new_embedded_with_store(
        opts: ConnectionOptions,
        store: EmbeddedStore,
    ) -> Result<Self, ValkeyMiddlewareError> {
        Self::from_factory(opts, DriverFactory::Embedded(store)).await
    }
}
