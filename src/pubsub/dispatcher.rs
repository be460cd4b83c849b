use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::task::JoinHandle;
use tracing::trace;

use super::listener::Message;
use super::registry::{SlotId, SubscriptionRegistry};

/// A message tagged with the subscription epoch it was queued in.
pub(crate) type StampedMessage = (u64, Message);

/// Where a pub/sub link forwards the messages it reads.
///
/// Every message is stamped with the slot's current epoch as it enters the
/// queue, so the dispatcher can tell traffic of an earlier subscription
/// period from the current one.
#[derive(Debug, Clone)]
pub(crate) struct MessageSink {
    tx: UnboundedSender<StampedMessage>,
    epoch: Arc<AtomicU64>,
}

impl MessageSink {
    pub(crate) fn channel() -> (Self, UnboundedReceiver<StampedMessage>) {
        let (tx, rx) = unbounded_channel();
        let sink = Self {
            tx,
            epoch: Arc::new(AtomicU64::new(0)),
        };
        (sink, rx)
    }

    /// Queue a message. Returns `false` once the receiving side is gone.
    pub(crate) fn send(&self, message: Message) -> bool {
        let stamp = self.epoch.load(Ordering::Acquire);
        self.tx.send((stamp, message)).is_ok()
    }
}

/// Per-connection task that hands messages from the pub/sub link to the
/// listeners currently registered for the connection.
pub(crate) struct Dispatcher {
    sink: MessageSink,
    task: JoinHandle<()>,
}

impl Dispatcher {
    pub(crate) fn spawn(slot: SlotId, registry: SubscriptionRegistry) -> Self {
        let (sink, mut rx) = MessageSink::channel();
        let epoch = Arc::clone(&sink.epoch);
        let task = tokio::spawn(async move {
            while let Some((stamp, message)) = rx.recv().await {
                if stamp != epoch.load(Ordering::Acquire) {
                    trace!(%slot, stamp, "dropping message queued in an earlier epoch");
                    continue;
                }
                registry.dispatch(slot, &message);
            }
            trace!(%slot, "dispatcher stopped");
        });
        Self { sink, task }
    }

    pub(crate) fn sink(&self) -> &MessageSink {
        &self.sink
    }

    /// Start a new epoch. Messages already queued are dropped, not
    /// dispatched.
    pub(crate) fn retire_queued(&self) {
        let epoch = self.sink.epoch.fetch_add(1, Ordering::AcqRel) + 1;
        trace!(epoch, "dispatcher epoch advanced");
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}
