use std::collections::HashMap;

use dashmap::DashMap;
use tracing::debug;
use wildmatch::WildMatch;

use crate::driver::MessageSink;
use crate::pubsub::Message;

/// Subscriber identity inside the embedded engine (one per connection).
pub(crate) type SubscriberId = u64;

/// Channel and pattern subscriptions of the embedded engine.
#[derive(Debug, Default)]
pub(crate) struct Broker {
    channels: DashMap<Vec<u8>, HashMap<SubscriberId, MessageSink>>,
    patterns: DashMap<Vec<u8>, HashMap<SubscriberId, MessageSink>>,
}

impl Broker {
    pub(crate) fn subscribe(&self, id: SubscriberId, channel: &[u8], sink: &MessageSink) {
        self.channels
            .entry(channel.to_vec())
            .or_default()
            .insert(id, sink.clone());
    }

    pub(crate) fn psubscribe(&self, id: SubscriberId, pattern: &[u8], sink: &MessageSink) {
        self.patterns
            .entry(pattern.to_vec())
            .or_default()
            .insert(id, sink.clone());
    }

    pub(crate) fn unsubscribe(&self, id: SubscriberId, channel: &[u8]) {
        Self::detach(&self.channels, id, channel);
    }

    pub(crate) fn punsubscribe(&self, id: SubscriberId, pattern: &[u8]) {
        Self::detach(&self.patterns, id, pattern);
    }

    fn detach(
        table: &DashMap<Vec<u8>, HashMap<SubscriberId, MessageSink>>,
        id: SubscriberId,
        target: &[u8],
    ) {
        if let Some(mut subscribers) = table.get_mut(target) {
            subscribers.remove(&id);
        }
        table.remove_if(target, |_, subscribers| subscribers.is_empty());
    }

    /// Remove every subscription held by `id`.
    pub(crate) fn drop_subscriber(&self, id: SubscriberId) {
        for table in [&self.channels, &self.patterns] {
            table.retain(|_, subscribers| {
                subscribers.remove(&id);
                !subscribers.is_empty()
            });
        }
    }

    /// Deliver to exact subscribers first, then to every matching pattern.
    /// Returns the number of deliveries.
    pub(crate) fn publish(&self, channel: &[u8], payload: &[u8]) -> i64 {
        let mut delivered = 0;
        if let Some(subscribers) = self.channels.get(channel) {
            for sink in subscribers.values() {
                let message = Message {
                    channel: channel.to_vec(),
                    pattern: None,
                    payload: payload.to_vec(),
                };
                if sink.send(message) {
                    delivered += 1;
                }
            }
        }

        let channel_text = String::from_utf8_lossy(channel);
        for entry in &self.patterns {
            let pattern_text = String::from_utf8_lossy(entry.key());
            if !WildMatch::new(&pattern_text).matches(&channel_text) {
                continue;
            }
            for sink in entry.value().values() {
                let message = Message {
                    channel: channel.to_vec(),
                    pattern: Some(entry.key().clone()),
                    payload: payload.to_vec(),
                };
                if sink.send(message) {
                    delivered += 1;
                }
            }
        }
        debug!(delivered, "embedded publish");
        delivered
    }
}
