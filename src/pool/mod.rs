pub mod any_conn_wrapper;
pub mod connection;
pub mod interaction;
mod manager;
pub mod types;

pub use any_conn_wrapper::AnyConnWrapper;
pub use connection::MiddlewarePoolConnection;
pub use manager::{PhysicalConnection, ValkeyManager};
pub use types::{MiddlewarePool, PoolStatus};

pub(crate) use manager::DriverFactory;
pub(crate) use types::ConnectionSettings;

use bb8::Pool;
use tracing::debug;

use crate::command::Command;
use crate::config::ConnectionOptions;
use crate::error::ValkeyMiddlewareError;
use crate::handle::ResultHandle;
use crate::pubsub::SubscriptionRegistry;
use crate::results::{Reply, convert};
use crate::types::DriverType;

/// Configuration and connection pool for one server
///
/// Holds the pool together with the driver it was created for. Cloning is
/// cheap; clones share the same pool.
#[derive(Clone, Debug)]
pub struct ConfigAndPool {
    /// The connection pool
    pub pool: MiddlewarePool,
    /// The driver every connection of the pool uses
    pub driver_type: DriverType,
}

impl ConfigAndPool {
    /// Shared by the per-driver constructors: build the bb8 pool and run a
    /// PING through it.
    pub(crate) async fn from_factory(
        opts: ConnectionOptions,
        factory: DriverFactory,
    ) -> Result<Self, ValkeyMiddlewareError> {
        opts.validate()?;
        let registry = SubscriptionRegistry::new();
        let manager = ValkeyManager::new(factory, registry.clone());
        let driver_type = manager.driver_type();

        let pool = Pool::builder()
            .max_size(opts.pool.max_size)
            .min_idle(opts.pool.min_idle)
            .connection_timeout(opts.pool.max_wait)
            .test_on_check_out(opts.pool.validate_on_borrow)
            .build(manager)
            .await?;

        let pool = MiddlewarePool {
            pool,
            registry,
            settings: ConnectionSettings {
                command_timeout: opts.command_timeout,
                subscription_timeout: opts.subscription_timeout,
            },
        };

        // Smoke test: the first connection must answer PING
        {
            let mut conn = MiddlewarePool::get_connection(&pool).await?;
            conn.ping().await?;
            conn.close().await;
        }
        debug!(driver = %driver_type, max_size = opts.pool.max_size, "pool ready");

        Ok(ConfigAndPool { pool, driver_type })
    }

    /// Borrow a connection from the pool.
    ///
    /// # Errors
    /// See [`MiddlewarePool::get_connection`].
    pub async fn get_connection(&self) -> Result<MiddlewarePoolConnection, ValkeyMiddlewareError> {
        MiddlewarePool::get_connection(&self.pool).await
    }

    #[must_use]
    pub fn pool_status(&self) -> PoolStatus {
        self.pool.status()
    }

    /// Run one command on a pooled connection in the background.
    ///
    /// The returned handle can be waited on with a timeout or cancelled;
    /// the connection goes back to the pool either way.
    #[must_use]
    pub fn submit(&self, command: Command) -> ResultHandle<Reply> {
        let pool = self.pool.clone();
        ResultHandle::spawn(async move {
            let mut conn = MiddlewarePool::get_connection(&pool).await?;
            let outcome = conn.dispatch(command, convert::RAW).await;
            conn.close().await;
            outcome?.into_ready().map(Reply::from)
        })
    }
}
