use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use super::{MiddlewarePoolConnection, bounded, required};
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::pubsub::{Dispatcher, MessageListener, SubscriptionKind};
use crate::results::convert;
use crate::types::CommandOutcome;

impl MiddlewarePoolConnection {
    /// # Errors
    /// `Subscribed` when this connection itself carries subscriptions.
    pub async fn publish(
        &mut self,
        channel: impl AsRef<[u8]>,
        message: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("PUBLISH").arg(channel).arg(message),
            convert::INT,
        )
        .await
    }

    /// Subscribe `listener` to exact channels.
    ///
    /// The first subscription opens the connection's pub/sub link; from then
    /// on regular commands are refused until every channel and pattern has
    /// been removed again.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty channel list; `InvalidState` inside a
    /// pipeline or `MULTI`; `Timeout` when the server did not confirm within
    /// the configured subscription timeout.
    pub async fn subscribe<C: AsRef<[u8]>>(
        &mut self,
        listener: Arc<dyn MessageListener>,
        channels: &[C],
    ) -> Result<(), ValkeyMiddlewareError> {
        let channels = required(channels, "SUBSCRIBE", "channel")?;
        self.add_subscriptions(listener, channels, SubscriptionKind::Channel)
            .await
    }

    /// Subscribe `listener` to glob patterns.
    ///
    /// # Errors
    /// As for [`subscribe`](Self::subscribe).
    pub async fn psubscribe<P: AsRef<[u8]>>(
        &mut self,
        listener: Arc<dyn MessageListener>,
        patterns: &[P],
    ) -> Result<(), ValkeyMiddlewareError> {
        let patterns = required(patterns, "PSUBSCRIBE", "pattern")?;
        self.add_subscriptions(listener, patterns, SubscriptionKind::Pattern)
            .await
    }

    /// Remove channels; an empty list removes all of them.
    ///
    /// # Errors
    /// `Timeout` or connectivity errors from the link. The slot is then
    /// poisoned and will not be reused.
    pub async fn unsubscribe<C: AsRef<[u8]>>(
        &mut self,
        channels: &[C],
    ) -> Result<(), ValkeyMiddlewareError> {
        let channels = channels.iter().map(|c| c.as_ref().to_vec()).collect();
        self.remove_subscriptions(channels, SubscriptionKind::Channel)
            .await
    }

    /// Remove patterns; an empty list removes all of them.
    ///
    /// # Errors
    /// As for [`unsubscribe`](Self::unsubscribe).
    pub async fn punsubscribe<P: AsRef<[u8]>>(
        &mut self,
        patterns: &[P],
    ) -> Result<(), ValkeyMiddlewareError> {
        let patterns = patterns.iter().map(|p| p.as_ref().to_vec()).collect();
        self.remove_subscriptions(patterns, SubscriptionKind::Pattern)
            .await
    }

    async fn add_subscriptions(
        &mut self,
        listener: Arc<dyn MessageListener>,
        targets: Vec<Vec<u8>>,
        kind: SubscriptionKind,
    ) -> Result<(), ValkeyMiddlewareError> {
        self.ensure_immediate("subscribe")?;
        let slot = self.conn.id;

        // Only targets the link is not already subscribed to go to the server
        let mut seen: HashSet<Vec<u8>> = self.registry.targets(slot, kind).into_iter().collect();
        let fresh: Vec<Vec<u8>> = targets
            .iter()
            .filter(|target| seen.insert((*target).clone()))
            .cloned()
            .collect();

        // Register first so messages arriving right after the confirmation
        // already find their listener.
        let (count, attached) = self
            .registry
            .register(slot, Arc::clone(&listener), &targets, kind);

        if !fresh.is_empty() {
            let registry = self.registry.clone();
            let limit = self.settings.subscription_timeout;
            let conn = &mut *self.conn;
            let sink = conn
                .dispatcher
                .get_or_insert_with(|| Dispatcher::spawn(slot, registry))
                .sink()
                .clone();
            let adapter = conn.driver.adapter();
            let request = match kind {
                SubscriptionKind::Channel => adapter.subscribe(&fresh, &sink),
                SubscriptionKind::Pattern => adapter.psubscribe(&fresh, &sink),
            };
            let outcome = bounded(Some(limit), "subscribe", request).await;
            if let Err(err) = self.note_failure(outcome) {
                self.registry.detach(slot, &listener, &attached, kind);
                return Err(err);
            }
            debug!(%slot, ?kind, added = fresh.len(), total = count, "subscribed");
        }

        for target in &targets {
            listener.on_subscribed(target, kind, count);
        }
        Ok(())
    }

    pub(super) async fn remove_subscriptions(
        &mut self,
        targets: Vec<Vec<u8>>,
        kind: SubscriptionKind,
    ) -> Result<(), ValkeyMiddlewareError> {
        self.ensure_immediate("unsubscribe")?;
        let slot = self.conn.id;
        let targets = if targets.is_empty() {
            self.registry.targets(slot, kind)
        } else {
            targets
        };
        if targets.is_empty() {
            return Ok(());
        }

        // Dropping the record first stops delivery even before the server
        // confirms.
        let (removed, remaining) = self.registry.remove(slot, &targets, kind);
        if removed.is_empty() {
            return Ok(());
        }
        let gone: Vec<Vec<u8>> = removed.iter().map(|(target, _)| target.clone()).collect();

        let limit = self.settings.subscription_timeout;
        let adapter = self.conn.driver.adapter();
        let request = match kind {
            SubscriptionKind::Channel => adapter.unsubscribe(&gone),
            SubscriptionKind::Pattern => adapter.punsubscribe(&gone),
        };
        if let Err(err) = bounded(Some(limit), "unsubscribe", request).await {
            // The server may still be sending for these targets
            warn!(%slot, error = %err, "unsubscribe failed, connection poisoned");
            self.conn.poisoned = true;
            return Err(err);
        }
        debug!(%slot, ?kind, removed = gone.len(), remaining, "unsubscribed");
        if remaining == 0 {
            if let Some(dispatcher) = &self.conn.dispatcher {
                dispatcher.retire_queued();
            }
        }

        for (target, listeners) in removed {
            for listener in listeners {
                listener.on_unsubscribed(&target, kind, remaining);
            }
        }
        Ok(())
    }
}
