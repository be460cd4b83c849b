use std::time::Duration;

use bb8::Pool;

use super::connection::MiddlewarePoolConnection;
use super::manager::ValkeyManager;
use crate::error::ValkeyMiddlewareError;
use crate::pubsub::SubscriptionRegistry;

/// Per-connection limits copied from `ConnectionOptions`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConnectionSettings {
    pub(crate) command_timeout: Option<Duration>,
    pub(crate) subscription_timeout: Duration,
}

/// Snapshot of the pool's bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolStatus {
    /// Physical connections currently open, borrowed or idle.
    pub connections: u32,
    pub idle: u32,
    /// Slots that currently carry subscriptions.
    pub subscribed: usize,
}

/// Connection pool for one driver.
#[derive(Clone)]
pub struct MiddlewarePool {
    pub(crate) pool: Pool<ValkeyManager>,
    pub(crate) registry: SubscriptionRegistry,
    pub(crate) settings: ConnectionSettings,
}

// Manual Debug implementation because bb8::Pool only shows its state
impl std::fmt::Debug for MiddlewarePool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewarePool")
            .field("status", &self.status())
            .field("settings", &self.settings)
            .finish()
    }
}

impl MiddlewarePool {
    /// Borrow a connection.
    ///
    /// # Errors
    /// Returns `ValkeyMiddlewareError::PoolExhausted` when no slot frees up
    /// within the pool's `max_wait`, or `ConnectionError` when a new physical
    /// connection cannot be opened.
    pub async fn get_connection(
        pool: &MiddlewarePool,
    ) -> Result<MiddlewarePoolConnection, ValkeyMiddlewareError> {
        let conn = pool.pool.get_owned().await?;
        Ok(MiddlewarePoolConnection::new(
            conn,
            pool.registry.clone(),
            pool.settings,
        ))
    }

    #[must_use]
    pub fn status(&self) -> PoolStatus {
        let state = self.pool.state();
        PoolStatus {
            connections: state.connections,
            idle: state.idle_connections,
            subscribed: self.registry.subscribed_slots(),
        }
    }

    #[must_use]
    pub fn registry(&self) -> &SubscriptionRegistry {
        &self.registry
    }
}
