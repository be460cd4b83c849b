mod hashes;
mod keys;
mod lists;
mod pubsub;
mod scripting;
mod server;
mod sets;
mod streams;
mod strings;
mod zsets;

use std::future::Future;
use std::time::Duration;

use bb8::PooledConnection;
use tracing::{debug, warn};

use super::manager::ValkeyManager;
use super::types::ConnectionSettings;
use crate::command::Command;
use crate::driver::TransactionReply;
use crate::error::{
    ConversionErrors, ConversionFailure, ErrorKind, ValkeyMiddlewareError,
};
use crate::execution::{ExecutionMode, QueueEntry};
use crate::pubsub::{SlotId, SubscriptionInfo, SubscriptionKind, SubscriptionRegistry};
use crate::results::{Converter, Reply, Value, convert};
use crate::tx_outcome::ExecOutcome;
use crate::types::{CommandOutcome, DriverType};

/// A borrowed connection.
///
/// Every command goes through [`ExecutionMode`]: in `Immediate` mode it is
/// sent at once and its converted reply returned as
/// [`CommandOutcome::Ready`]; inside a pipeline or `MULTI` it is queued and
/// the caller gets [`CommandOutcome::Queued`] with the position its reply
/// will occupy in `close_pipeline` / `exec`.
///
/// Hand the connection back with [`close`](Self::close). Dropping it works
/// too, but a dirty slot is then discarded instead of reset.
pub struct MiddlewarePoolConnection {
    pub(crate) conn: PooledConnection<'static, ValkeyManager>,
    pub(crate) registry: SubscriptionRegistry,
    settings: ConnectionSettings,
}

impl std::fmt::Debug for MiddlewarePoolConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MiddlewarePoolConnection")
            .field("slot", &self.conn.id)
            .field("driver", &self.conn.driver_type())
            .field("mode", &self.conn.mode.mode())
            .field("queued", &self.conn.mode.queued())
            .finish_non_exhaustive()
    }
}

impl MiddlewarePoolConnection {
    pub(crate) fn new(
        conn: PooledConnection<'static, ValkeyManager>,
        registry: SubscriptionRegistry,
        settings: ConnectionSettings,
    ) -> Self {
        Self {
            conn,
            registry,
            settings,
        }
    }

    #[must_use]
    pub fn slot_id(&self) -> SlotId {
        self.conn.id
    }

    #[must_use]
    pub fn driver_type(&self) -> DriverType {
        self.conn.driver_type()
    }

    #[must_use]
    pub fn mode(&self) -> ExecutionMode {
        self.conn.mode.mode()
    }

    #[must_use]
    pub fn is_pipelined(&self) -> bool {
        self.mode() == ExecutionMode::Pipelined
    }

    /// True while commands are being queued (pipeline or `MULTI`).
    #[must_use]
    pub fn is_queueing(&self) -> bool {
        !self.conn.mode.is_immediate()
    }

    /// Number of commands waiting in the current pipeline or transaction.
    #[must_use]
    pub fn queued(&self) -> usize {
        self.conn.mode.queued()
    }

    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.registry.is_subscribed(self.conn.id)
    }

    #[must_use]
    pub fn subscription_info(&self) -> Option<SubscriptionInfo> {
        self.registry.info(self.conn.id)
    }

    /// Send a command now or queue it, depending on the mode.
    ///
    /// # Errors
    /// `Subscribed` while the connection carries subscriptions; `Backend`
    /// when the server rejects an immediate command; `Conversion` when an
    /// immediate reply does not have the converter's shape; connectivity
    /// errors from the driver.
    pub(crate) async fn dispatch<T>(
        &mut self,
        command: Command,
        converter: Converter<T>,
    ) -> Result<CommandOutcome<T>, ValkeyMiddlewareError>
    where
        T: Into<Reply> + 'static,
    {
        self.ensure_not_subscribed(command.name())?;

        if !self.conn.mode.is_immediate() {
            let position = self
                .conn
                .mode
                .enqueue(QueueEntry::new(command, converter))?;
            return Ok(CommandOutcome::Queued { position });
        }

        match self.run(&command).await? {
            Value::Error(err) => Err(ValkeyMiddlewareError::Backend(err)),
            value => converter
                .apply(value)
                .map(CommandOutcome::Ready)
                .map_err(|actual| conversion_error(&command, converter.expected, &actual)),
        }
    }

    /// Run one command through the driver right away, whatever the mode.
    async fn run(&mut self, command: &Command) -> Result<Value, ValkeyMiddlewareError> {
        let limit = self.settings.command_timeout;
        let outcome = bounded(
            limit,
            command.name(),
            self.conn.driver.adapter().execute(command),
        )
        .await;
        self.note_failure(outcome)
    }

    /// Poison the slot when an error leaves the link in an unknown state.
    fn note_failure<T>(
        &mut self,
        outcome: Result<T, ValkeyMiddlewareError>,
    ) -> Result<T, ValkeyMiddlewareError> {
        if let Err(err) = &outcome {
            let broken = err.kind() == ErrorKind::Connectivity
                || matches!(err, ValkeyMiddlewareError::ProtocolDesync { .. });
            if broken && !self.conn.poisoned {
                warn!(slot = %self.conn.id, error = %err, "connection poisoned");
                self.conn.poisoned = true;
            }
        }
        outcome
    }

    fn ensure_not_subscribed(&self, what: &str) -> Result<(), ValkeyMiddlewareError> {
        if self.is_subscribed() {
            return Err(ValkeyMiddlewareError::Subscribed(format!(
                "{what} is not allowed while the connection has active subscriptions"
            )));
        }
        Ok(())
    }

    fn ensure_immediate(&self, what: &str) -> Result<(), ValkeyMiddlewareError> {
        match self.mode() {
            ExecutionMode::Immediate => Ok(()),
            ExecutionMode::Pipelined => Err(ValkeyMiddlewareError::invalid_state(format!(
                "{what} is not allowed while a pipeline is open"
            ))),
            ExecutionMode::Transactional => Err(ValkeyMiddlewareError::invalid_state(format!(
                "{what} is not allowed inside MULTI"
            ))),
        }
    }

    /// Immediate mode with no subscriptions.
    pub(crate) fn ensure_idle(&self, what: &str) -> Result<(), ValkeyMiddlewareError> {
        self.ensure_not_subscribed(what)?;
        self.ensure_immediate(what)
    }

    /// Start queueing commands for one round trip.
    ///
    /// # Errors
    /// `InvalidState` when a pipeline or transaction is already open,
    /// `Subscribed` while subscriptions are active.
    pub fn open_pipeline(&mut self) -> Result<(), ValkeyMiddlewareError> {
        self.ensure_not_subscribed("open_pipeline")?;
        self.conn.mode.open_pipeline()
    }

    /// Send the queued commands and return their replies in queue order.
    ///
    /// # Errors
    /// `InvalidState` without an open pipeline; `ProtocolDesync` when the
    /// reply count does not match; `Conversion` listing every position whose
    /// reply had the wrong shape.
    pub async fn close_pipeline(&mut self) -> Result<Vec<Reply>, ValkeyMiddlewareError> {
        let queue = self.conn.mode.take_pipeline()?;
        if queue.is_empty() {
            return Ok(Vec::new());
        }
        let commands = queue.commands();
        let limit = self.settings.command_timeout;
        let outcome = bounded(
            limit,
            "pipeline",
            self.conn.driver.adapter().execute_pipeline(&commands),
        )
        .await;
        let replies = self.note_failure(outcome)?;
        debug!(slot = %self.conn.id, commands = commands.len(), "pipeline closed");
        let drained = queue.drain(replies);
        self.note_failure(drained)
    }

    /// Begin a transaction. Commands are buffered until `exec`.
    ///
    /// # Errors
    /// `InvalidState` when a pipeline or transaction is already open,
    /// `Subscribed` while subscriptions are active.
    pub fn multi(&mut self) -> Result<(), ValkeyMiddlewareError> {
        self.ensure_not_subscribed("MULTI")?;
        self.conn.mode.begin_transaction()
    }

    /// Run the buffered commands atomically.
    ///
    /// Returns [`ExecOutcome::Aborted`] when a watched key changed.
    ///
    /// # Errors
    /// `InvalidState` without `MULTI`; `Backend` when the server refused the
    /// whole transaction (`EXECABORT`); draining errors as for
    /// [`close_pipeline`](Self::close_pipeline).
    pub async fn exec(&mut self) -> Result<ExecOutcome, ValkeyMiddlewareError> {
        let queue = self.conn.mode.take_transaction("EXEC")?;
        let watching = std::mem::take(&mut self.conn.watching);
        if queue.is_empty() && !watching {
            return Ok(ExecOutcome::Committed(Vec::new()));
        }

        let commands = queue.commands();
        let limit = self.settings.command_timeout;
        let outcome = bounded(
            limit,
            "EXEC",
            self.conn.driver.adapter().execute_transaction(&commands),
        )
        .await;
        match self.note_failure(outcome)? {
            TransactionReply::Aborted => {
                debug!(slot = %self.conn.id, "transaction aborted by WATCH");
                Ok(ExecOutcome::Aborted)
            }
            TransactionReply::Committed(replies) => {
                let drained = queue.drain(replies);
                self.note_failure(drained).map(ExecOutcome::Committed)
            }
        }
    }

    /// Drop the buffered transaction. Only touches the server when keys are
    /// being watched.
    ///
    /// # Errors
    /// `InvalidState` without `MULTI`.
    pub async fn discard(&mut self) -> Result<(), ValkeyMiddlewareError> {
        let queue = self.conn.mode.take_transaction("DISCARD")?;
        debug!(slot = %self.conn.id, dropped = queue.len(), "transaction discarded");
        if self.conn.watching {
            self.unwatch_now().await?;
        }
        Ok(())
    }

    /// Watch keys for the next transaction.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty key list; `InvalidState` inside
    /// `MULTI` or a pipeline.
    pub async fn watch<K: AsRef<[u8]>>(&mut self, keys: &[K]) -> Result<(), ValkeyMiddlewareError> {
        let keys = required(keys, "WATCH", "key")?;
        self.ensure_immediate("WATCH")?;
        self.dispatch(Command::new("WATCH").args(keys), convert::UNIT)
            .await?;
        self.conn.watching = true;
        Ok(())
    }

    /// # Errors
    /// `InvalidState` inside `MULTI` or a pipeline.
    pub async fn unwatch(&mut self) -> Result<(), ValkeyMiddlewareError> {
        self.ensure_immediate("UNWATCH")?;
        self.ensure_not_subscribed("UNWATCH")?;
        self.unwatch_now().await
    }

    async fn unwatch_now(&mut self) -> Result<(), ValkeyMiddlewareError> {
        match self.run(&Command::new("UNWATCH")).await? {
            Value::Error(err) => Err(ValkeyMiddlewareError::Backend(err)),
            _ => {
                self.conn.watching = false;
                Ok(())
            }
        }
    }

    /// Reset the connection and hand the slot back to the pool.
    ///
    /// Queued commands are dropped, watched keys released and every
    /// subscription removed. When any of that fails the slot is marked
    /// poisoned and the pool discards it; nothing is reported to the caller.
    pub async fn close(mut self) {
        let slot = self.conn.id;
        let dropped = self.conn.mode.reset();
        if dropped > 0 {
            debug!(%slot, dropped, "queued commands discarded on close");
        }

        if self.conn.watching && !self.conn.poisoned {
            if let Err(err) = self.unwatch_now().await {
                warn!(%slot, error = %err, "UNWATCH failed on close");
                self.conn.poisoned = true;
            }
        }

        if self.is_subscribed() && !self.conn.poisoned {
            for kind in [SubscriptionKind::Channel, SubscriptionKind::Pattern] {
                if let Err(err) = self.remove_subscriptions(Vec::new(), kind).await {
                    warn!(%slot, error = %err, "unsubscribe failed on close");
                    self.conn.poisoned = true;
                    break;
                }
            }
        }
        // Dropping the PooledConnection hands the slot to has_broken
    }
}

/// Apply the optional command timeout to a driver call.
pub(crate) async fn bounded<F, T>(
    limit: Option<Duration>,
    what: &str,
    fut: F,
) -> Result<T, ValkeyMiddlewareError>
where
    F: Future<Output = Result<T, ValkeyMiddlewareError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, fut).await.map_err(|_| {
            ValkeyMiddlewareError::Timeout(format!("{what} did not complete within {limit:?}"))
        })?,
        None => fut.await,
    }
}

fn conversion_error(command: &Command, expected: &'static str, actual: &Value) -> ValkeyMiddlewareError {
    ValkeyMiddlewareError::Conversion(ConversionErrors {
        failures: vec![ConversionFailure {
            position: 0,
            command: command.display_name(),
            expected,
            actual: actual.describe(),
        }],
    })
}

/// Copy a variadic argument list, rejecting an empty one.
pub(crate) fn required<K: AsRef<[u8]>>(
    items: &[K],
    command: &str,
    what: &str,
) -> Result<Vec<Vec<u8>>, ValkeyMiddlewareError> {
    if items.is_empty() {
        return Err(ValkeyMiddlewareError::invalid_argument(format!(
            "{command} needs at least one {what}"
        )));
    }
    Ok(items.iter().map(|item| item.as_ref().to_vec()).collect())
}

/// Flatten field/value pairs, rejecting an empty list.
pub(crate) fn required_pairs<F: AsRef<[u8]>, V: AsRef<[u8]>>(
    pairs: &[(F, V)],
    command: &str,
) -> Result<Vec<Vec<u8>>, ValkeyMiddlewareError> {
    if pairs.is_empty() {
        return Err(ValkeyMiddlewareError::invalid_argument(format!(
            "{command} needs at least one field/value pair"
        )));
    }
    Ok(pairs
        .iter()
        .flat_map(|(f, v)| [f.as_ref().to_vec(), v.as_ref().to_vec()])
        .collect())
}
