use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use tracing::trace;

use super::listener::{Message, MessageListener, SubscriptionKind};

/// Identity of one physical connection for as long as the pool keeps it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotId(pub(crate) u64);

impl fmt::Display for SlotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "slot-{}", self.0)
    }
}

type ListenerId = usize;

/// Subscription state of a single physical connection.
///
/// Listeners live in an arena; the channel and pattern tables point into it
/// by index. A listener slot is freed once no channel or pattern refers to
/// it any more.
#[derive(Default)]
struct SubscriptionRecord {
    listeners: Vec<Option<Arc<dyn MessageListener>>>,
    channels: HashMap<Vec<u8>, Vec<ListenerId>>,
    patterns: HashMap<Vec<u8>, Vec<ListenerId>>,
}

impl SubscriptionRecord {
    fn table(&self, kind: SubscriptionKind) -> &HashMap<Vec<u8>, Vec<ListenerId>> {
        match kind {
            SubscriptionKind::Channel => &self.channels,
            SubscriptionKind::Pattern => &self.patterns,
        }
    }

    fn table_mut(&mut self, kind: SubscriptionKind) -> &mut HashMap<Vec<u8>, Vec<ListenerId>> {
        match kind {
            SubscriptionKind::Channel => &mut self.channels,
            SubscriptionKind::Pattern => &mut self.patterns,
        }
    }

    fn count(&self) -> usize {
        self.channels.len() + self.patterns.len()
    }

    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn listener_id(&self, listener: &Arc<dyn MessageListener>) -> Option<ListenerId> {
        self.listeners.iter().position(|slot| {
            slot.as_ref()
                .is_some_and(|current| Arc::ptr_eq(current, listener))
        })
    }

    fn insert_listener(&mut self, listener: Arc<dyn MessageListener>) -> ListenerId {
        if let Some(existing) = self.listener_id(&listener) {
            return existing;
        }
        if let Some(free) = self.listeners.iter().position(Option::is_none) {
            self.listeners[free] = Some(listener);
            free
        } else {
            self.listeners.push(Some(listener));
            self.listeners.len() - 1
        }
    }

    fn release_unreferenced(&mut self) {
        for (id, slot) in self.listeners.iter_mut().enumerate() {
            let referenced = self
                .channels
                .values()
                .chain(self.patterns.values())
                .any(|ids| ids.contains(&id));
            if !referenced {
                *slot = None;
            }
        }
    }

    fn resolve(&self, ids: &[ListenerId]) -> Vec<Arc<dyn MessageListener>> {
        ids.iter()
            .filter_map(|id| self.listeners.get(*id).and_then(Clone::clone))
            .collect()
    }
}

/// Snapshot of what a connection is subscribed to.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubscriptionInfo {
    pub channels: Vec<Vec<u8>>,
    pub patterns: Vec<Vec<u8>>,
}

impl SubscriptionInfo {
    #[must_use]
    pub fn count(&self) -> usize {
        self.channels.len() + self.patterns.len()
    }
}

/// Table of subscription records keyed by physical connection.
///
/// Shared by the pool manager and every borrowed connection. A slot with an
/// entry here is subscribed; the pool only recycles a slot whose entry is
/// absent.
#[derive(Clone, Default)]
pub struct SubscriptionRegistry {
    records: Arc<DashMap<SlotId, SubscriptionRecord>>,
}

impl fmt::Debug for SubscriptionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubscriptionRegistry")
            .field("subscribed_slots", &self.records.len())
            .finish()
    }
}

impl SubscriptionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `listener` to every target. Returns the connection's total
    /// subscription count afterwards and the targets the listener was not
    /// attached to before.
    pub(crate) fn register(
        &self,
        slot: SlotId,
        listener: Arc<dyn MessageListener>,
        targets: &[Vec<u8>],
        kind: SubscriptionKind,
    ) -> (usize, Vec<Vec<u8>>) {
        let mut record = self.records.entry(slot).or_default();
        let id = record.insert_listener(listener);
        let mut attached = Vec::new();
        for target in targets {
            let ids = record.table_mut(kind).entry(target.clone()).or_default();
            if !ids.contains(&id) {
                ids.push(id);
                attached.push(target.clone());
            }
        }
        (record.count(), attached)
    }

    /// Undo a [`register`](Self::register): detach `listener` from
    /// `targets`, dropping targets that are left without listeners.
    pub(crate) fn detach(
        &self,
        slot: SlotId,
        listener: &Arc<dyn MessageListener>,
        targets: &[Vec<u8>],
        kind: SubscriptionKind,
    ) {
        let now_empty = {
            let Some(mut record) = self.records.get_mut(&slot) else {
                return;
            };
            let Some(id) = record.listener_id(listener) else {
                return;
            };
            let table = record.table_mut(kind);
            for target in targets {
                if let Some(ids) = table.get_mut(target) {
                    ids.retain(|current| *current != id);
                    if ids.is_empty() {
                        table.remove(target);
                    }
                }
            }
            record.release_unreferenced();
            record.is_empty()
        };
        if now_empty {
            self.records.remove_if(&slot, |_, record| record.is_empty());
        }
    }

    /// Detach the targets. Returns, per removed target, the listeners that
    /// were attached to it, plus the remaining subscription count.
    pub(crate) fn remove(
        &self,
        slot: SlotId,
        targets: &[Vec<u8>],
        kind: SubscriptionKind,
    ) -> (Vec<(Vec<u8>, Vec<Arc<dyn MessageListener>>)>, usize) {
        let (removed, remaining) = {
            let Some(mut record) = self.records.get_mut(&slot) else {
                return (Vec::new(), 0);
            };
            let mut removed = Vec::new();
            for target in targets {
                if let Some(ids) = record.table_mut(kind).remove(target) {
                    let listeners = record.resolve(&ids);
                    removed.push((target.clone(), listeners));
                }
            }
            record.release_unreferenced();
            (removed, record.count())
        };
        if remaining == 0 {
            self.records.remove_if(&slot, |_, record| record.is_empty());
        }
        (removed, remaining)
    }

    /// Every target of one kind currently registered for the slot.
    pub(crate) fn targets(&self, slot: SlotId, kind: SubscriptionKind) -> Vec<Vec<u8>> {
        self.records
            .get(&slot)
            .map(|record| record.table(kind).keys().cloned().collect())
            .unwrap_or_default()
    }

    #[must_use]
    pub fn is_subscribed(&self, slot: SlotId) -> bool {
        self.records
            .get(&slot)
            .is_some_and(|record| !record.is_empty())
    }

    #[must_use]
    pub fn info(&self, slot: SlotId) -> Option<SubscriptionInfo> {
        self.records.get(&slot).map(|record| {
            let mut channels: Vec<Vec<u8>> = record.channels.keys().cloned().collect();
            let mut patterns: Vec<Vec<u8>> = record.patterns.keys().cloned().collect();
            channels.sort();
            patterns.sort();
            SubscriptionInfo { channels, patterns }
        })
    }

    /// Drop the slot's record entirely.
    pub(crate) fn clear(&self, slot: SlotId) {
        if self.records.remove(&slot).is_some() {
            trace!(%slot, "cleared subscription record");
        }
    }

    /// Number of slots that currently hold subscriptions.
    #[must_use]
    pub fn subscribed_slots(&self) -> usize {
        self.records.iter().filter(|r| !r.is_empty()).count()
    }

    /// Deliver a message read from the slot's pub/sub link.
    ///
    /// Messages whose channel or pattern is no longer registered are
    /// dropped, so a reused connection never sees traffic meant for a
    /// previous borrower.
    pub(crate) fn dispatch(&self, slot: SlotId, message: &Message) -> usize {
        let listeners = {
            let Some(record) = self.records.get(&slot) else {
                trace!(%slot, "dropping message for unsubscribed slot");
                return 0;
            };
            let ids = match &message.pattern {
                Some(pattern) => record.patterns.get(pattern),
                None => record.channels.get(&message.channel),
            };
            match ids {
                Some(ids) => record.resolve(ids),
                None => {
                    trace!(%slot, "dropping message for removed channel or pattern");
                    return 0;
                }
            }
        };
        for listener in &listeners {
            listener.on_message(message);
        }
        listeners.len()
    }
}
