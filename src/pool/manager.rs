use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

use bb8::ManageConnection;
use tracing::{debug, warn};

use crate::command::Command;
use crate::driver::DriverConnection;
use crate::error::ValkeyMiddlewareError;
use crate::execution::{ExecutionMode, ModeState};
use crate::pubsub::{Dispatcher, SlotId, SubscriptionRegistry};
use crate::results::Value;
use crate::types::DriverType;

#[cfg(feature = "blocking")]
use crate::blocking::BlockingDriver;
#[cfg(feature = "embedded")]
use crate::embedded::EmbeddedStore;
#[cfg(feature = "multiplexed")]
use crate::multiplexed::MultiplexedDriver;

/// How the manager opens a new physical connection.
#[derive(Clone)]
pub(crate) enum DriverFactory {
    #[cfg(feature = "multiplexed")]
    Multiplexed(redis::Client),
    #[cfg(feature = "blocking")]
    Blocking(redis::Client),
    #[cfg(feature = "embedded")]
    Embedded(EmbeddedStore),
}

impl DriverFactory {
    fn driver_type(&self) -> DriverType {
        match self {
            #[cfg(feature = "multiplexed")]
            DriverFactory::Multiplexed(_) => DriverType::Multiplexed,
            #[cfg(feature = "blocking")]
            DriverFactory::Blocking(_) => DriverType::Blocking,
            #[cfg(feature = "embedded")]
            DriverFactory::Embedded(_) => DriverType::Embedded,
        }
    }

    async fn open(&self) -> Result<DriverConnection, ValkeyMiddlewareError> {
        match self {
            #[cfg(feature = "multiplexed")]
            DriverFactory::Multiplexed(client) => Ok(DriverConnection::Multiplexed(
                MultiplexedDriver::connect(client.clone()).await?,
            )),
            #[cfg(feature = "blocking")]
            DriverFactory::Blocking(client) => Ok(DriverConnection::Blocking(
                BlockingDriver::connect(client.clone()).await?,
            )),
            #[cfg(feature = "embedded")]
            DriverFactory::Embedded(store) => Ok(DriverConnection::Embedded(store.connect())),
        }
    }
}

/// One pooled physical connection plus the state that decides whether it
/// may go back to the free list.
pub struct PhysicalConnection {
    pub(crate) id: SlotId,
    pub(crate) created_at: Instant,
    pub(crate) driver: DriverConnection,
    pub(crate) mode: ModeState,
    /// Keys are being watched; cleared by `EXEC`, `DISCARD` and `UNWATCH`.
    pub(crate) watching: bool,
    /// A reset failed or the link broke; never reuse.
    pub(crate) poisoned: bool,
    pub(crate) dispatcher: Option<Dispatcher>,
    registry: SubscriptionRegistry,
}

impl PhysicalConnection {
    #[must_use]
    pub fn id(&self) -> SlotId {
        self.id
    }

    #[must_use]
    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    #[must_use]
    pub fn driver_type(&self) -> DriverType {
        self.driver.driver_type()
    }

    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.mode.mode()
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.registry.is_subscribed(self.id)
    }

    /// Why this slot must not be handed to another borrower, if it must not.
    pub(crate) fn dirty_reason(&self) -> Option<&'static str> {
        if self.poisoned {
            Some("poisoned")
        } else if !self.mode.is_immediate() {
            Some("pipeline or transaction still open")
        } else if !self.mode.is_clean() {
            Some("queued commands left behind")
        } else if self.watching {
            Some("WATCH still active")
        } else if self.is_subscribed() {
            Some("subscriptions still active")
        } else {
            None
        }
    }
}

impl Drop for PhysicalConnection {
    fn drop(&mut self) {
        self.registry.clear(self.id);
        debug!(slot = %self.id, age = ?self.created_at.elapsed(), "physical connection closed");
    }
}

impl std::fmt::Debug for PhysicalConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhysicalConnection")
            .field("id", &self.id)
            .field("driver", &self.driver)
            .field("mode", &self.mode.mode())
            .field("watching", &self.watching)
            .field("poisoned", &self.poisoned)
            .finish_non_exhaustive()
    }
}

/// bb8 manager for physical connections of one driver.
pub struct ValkeyManager {
    factory: DriverFactory,
    registry: SubscriptionRegistry,
    next_id: AtomicU64,
}

impl ValkeyManager {
    pub(crate) fn new(factory: DriverFactory, registry: SubscriptionRegistry) -> Self {
        Self {
            factory,
            registry,
            next_id: AtomicU64::new(1),
        }
    }

    #[must_use]
    pub fn driver_type(&self) -> DriverType {
        self.factory.driver_type()
    }
}

impl ManageConnection for ValkeyManager {
    type Connection = PhysicalConnection;
    type Error = ValkeyMiddlewareError;

    #[allow(clippy::manual_async_fn)]
    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let factory = self.factory.clone();
        let registry = self.registry.clone();
        let id = SlotId(self.next_id.fetch_add(1, Ordering::Relaxed));
        async move {
            let driver = factory.open().await?;
            debug!(slot = %id, driver = %driver.driver_type(), "physical connection opened");
            Ok(PhysicalConnection {
                id,
                created_at: Instant::now(),
                driver,
                mode: ModeState::default(),
                watching: false,
                poisoned: false,
                dispatcher: None,
                registry,
            })
        }
    }

    #[allow(clippy::manual_async_fn)]
    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move {
            if let Some(reason) = conn.dirty_reason() {
                return Err(ValkeyMiddlewareError::ConnectionError(format!(
                    "slot {} failed validation: {reason}",
                    conn.id
                )));
            }
            let reply = conn.driver.adapter().execute(&Command::new("PING")).await?;
            match reply {
                Value::Status(_) | Value::Bulk(_) => Ok(()),
                other => Err(ValkeyMiddlewareError::ConnectionError(format!(
                    "slot {} answered PING with {}",
                    conn.id,
                    other.describe()
                ))),
            }
        }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        match conn.dirty_reason() {
            Some(reason) => {
                warn!(slot = %conn.id, reason, "discarding dirty connection instead of pooling it");
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for ValkeyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValkeyManager")
            .field("driver", &self.factory.driver_type())
            .finish_non_exhaustive()
    }
}
