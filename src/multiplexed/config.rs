use crate::config::ConnectionOptions;
use crate::error::ValkeyMiddlewareError;
use crate::pool::{ConfigAndPool, DriverFactory};

impl ConfigAndPool {
    /// Pool of multiplexed connections to the server at `opts.url`.
    ///
    /// # Errors
    /// Returns `ValkeyMiddlewareError::ConfigError` for a malformed URL or
    /// invalid pool options and `ConnectionError` if the first connection
    /// fails.
    pub async fn new_multiplexed(opts: ConnectionOptions) -> Result<Self, ValkeyMiddlewareError> {
        let client = redis::Client::open(opts.url.as_str()).map_err(|e| {
            ValkeyMiddlewareError::ConfigError(format!("invalid server url {}: {e}", opts.url))
        })?;
        Self::from_factory(opts, DriverFactory::Multiplexed(client)).await
    }
}
