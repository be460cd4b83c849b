use std::time::Duration;

use serde::Deserialize;

use crate::error::ValkeyMiddlewareError;
use crate::pool::ConfigAndPool;
use crate::types::DriverType;

/// Pool sizing and borrow behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    pub max_size: u32,
    pub min_idle: Option<u32>,
    /// How long `get_connection` waits for a free slot before failing with
    /// `PoolExhausted`.
    pub max_wait: Duration,
    /// PING and check every slot before it is handed out.
    pub validate_on_borrow: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 10,
            min_idle: None,
            max_wait: Duration::from_secs(30),
            validate_on_borrow: true,
        }
    }
}

/// Options for a pool of connections to one server (or one embedded store).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ConnectionOptions {
    /// `redis://host:port/db` for the network drivers; ignored by `Embedded`.
    pub url: String,
    pub driver: DriverType,
    #[serde(default)]
    pub pool: PoolOptions,
    /// Upper bound on a single immediate command, pipeline or `EXEC`.
    #[serde(default)]
    pub command_timeout: Option<Duration>,
    /// Upper bound on waiting for a subscribe/unsubscribe acknowledgement.
    #[serde(default = "default_subscription_timeout")]
    pub subscription_timeout: Duration,
}

fn default_subscription_timeout() -> Duration {
    Duration::from_secs(5)
}

impl ConnectionOptions {
    #[must_use]
    pub fn new(url: impl Into<String>, driver: DriverType) -> Self {
        Self {
            url: url.into(),
            driver,
            pool: PoolOptions::default(),
            command_timeout: None,
            subscription_timeout: default_subscription_timeout(),
        }
    }

    /// Options for an in-process store; no server needed.
    #[cfg(feature = "embedded")]
    #[must_use]
    pub fn embedded() -> Self {
        Self::new("embedded://", DriverType::Embedded)
    }

    pub(crate) fn validate(&self) -> Result<(), ValkeyMiddlewareError> {
        if self.pool.max_size == 0 {
            return Err(ValkeyMiddlewareError::ConfigError(
                "pool max_size must be at least 1".into(),
            ));
        }
        if self.pool.min_idle.is_some_and(|idle| idle > self.pool.max_size) {
            return Err(ValkeyMiddlewareError::ConfigError(format!(
                "pool min_idle {:?} exceeds max_size {}",
                self.pool.min_idle, self.pool.max_size
            )));
        }
        if self.subscription_timeout.is_zero() {
            return Err(ValkeyMiddlewareError::ConfigError(
                "subscription_timeout must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

/// Fluent builder for [`ConnectionOptions`].
#[derive(Debug, Clone)]
pub struct ConnectionOptionsBuilder {
    opts: ConnectionOptions,
}

impl ConnectionOptionsBuilder {
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            opts: ConnectionOptions::new(url, DriverType::default()),
        }
    }

    #[must_use]
    pub fn driver(mut self, driver: DriverType) -> Self {
        self.opts.driver = driver;
        self
    }

    #[must_use]
    pub fn max_size(mut self, max_size: u32) -> Self {
        self.opts.pool.max_size = max_size;
        self
    }

    #[must_use]
    pub fn min_idle(mut self, min_idle: Option<u32>) -> Self {
        self.opts.pool.min_idle = min_idle;
        self
    }

    #[must_use]
    pub fn max_wait(mut self, max_wait: Duration) -> Self {
        self.opts.pool.max_wait = max_wait;
        self
    }

    #[must_use]
    pub fn validate_on_borrow(mut self, validate: bool) -> Self {
        self.opts.pool.validate_on_borrow = validate;
        self
    }

    #[must_use]
    pub fn command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.opts.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn subscription_timeout(mut self, timeout: Duration) -> Self {
        self.opts.subscription_timeout = timeout;
        self
    }

    #[must_use]
    pub fn finish(self) -> ConnectionOptions {
        self.opts
    }

    /// Build a `ConfigAndPool` for the selected driver.
    ///
    /// # Errors
    ///
    /// Returns `ValkeyMiddlewareError` if the options are invalid or the
    /// first connection cannot be established.
    pub async fn build(self) -> Result<ConfigAndPool, ValkeyMiddlewareError> {
        ConfigAndPool::new(self.finish()).await
    }
}

impl ConfigAndPool {
    #[must_use]
    pub fn builder(url: impl Into<String>) -> ConnectionOptionsBuilder {
        ConnectionOptionsBuilder::new(url)
    }

    /// Create a pool for whichever driver `opts.driver` names.
    ///
    /// # Errors
    ///
    /// Returns `ValkeyMiddlewareError::ConfigError` for invalid options and
    /// `ConnectionError` when the first connection fails.
    pub async fn new(opts: ConnectionOptions) -> Result<Self, ValkeyMiddlewareError> {
        match opts.driver {
            #[cfg(feature = "multiplexed")]
            DriverType::Multiplexed => Self::new_multiplexed(opts).await,
            #[cfg(feature = "blocking")]
            DriverType::Blocking => Self::new_blocking(opts).await,
            #[cfg(feature = "embedded")]
            DriverType::Embedded => Self::new_embedded(opts).await,
            #[allow(unreachable_patterns)]
            _ => Err(ValkeyMiddlewareError::Unimplemented(format!(
                "driver {} is not compiled in",
                opts.driver
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_fills_pool_knobs() {
        let opts = ConnectionOptionsBuilder::new("redis://127.0.0.1/")
            .max_size(3)
            .min_idle(Some(1))
            .max_wait(Duration::from_millis(250))
            .validate_on_borrow(false)
            .finish();
        assert_eq!(opts.pool.max_size, 3);
        assert_eq!(opts.pool.min_idle, Some(1));
        assert_eq!(opts.pool.max_wait, Duration::from_millis(250));
        assert!(!opts.pool.validate_on_borrow);
        assert!(opts.validate().is_ok());
    }

    #[test]
    fn zero_sized_pool_is_rejected() {
        let opts = ConnectionOptionsBuilder::new("redis://127.0.0.1/")
            .max_size(0)
            .finish();
        assert!(matches!(
            opts.validate(),
            Err(ValkeyMiddlewareError::ConfigError(_))
        ));
    }

    #[test]
    fn min_idle_above_max_is_rejected() {
        let opts = ConnectionOptionsBuilder::new("redis://127.0.0.1/")
            .max_size(2)
            .min_idle(Some(5))
            .finish();
        assert!(opts.validate().is_err());
    }

    #[cfg(feature = "embedded")]
    #[test]
    fn options_deserialize_with_defaults() {
        let opts: ConnectionOptions = serde_json::from_str(
            r#"{"url": "embedded://", "driver": "embedded", "pool": {"max_size": 2}}"#,
        )
        .unwrap();
        assert_eq!(opts.driver, DriverType::Embedded);
        assert_eq!(opts.pool.max_size, 2);
        assert_eq!(opts.pool.max_wait, Duration::from_secs(30));
        assert_eq!(opts.command_timeout, None);
        assert_eq!(opts.subscription_timeout, Duration::from_secs(5));
        assert!(opts.validate().is_ok());
    }
}
