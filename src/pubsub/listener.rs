use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};

/// A message delivered to a subscriber.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub channel: Vec<u8>,
    /// The matching pattern for pattern subscriptions, `None` for exact
    /// channel subscriptions.
    pub pattern: Option<Vec<u8>>,
    pub payload: Vec<u8>,
}

impl Message {
    #[must_use]
    pub fn channel_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.channel)
    }

    #[must_use]
    pub fn payload_str(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.payload)
    }
}

/// Decode a redis-rs push message. Anything that is not a `message` or
/// `pmessage` (subscribe confirmations, pongs) is skipped.
#[cfg(any(feature = "multiplexed", feature = "blocking"))]
pub(crate) fn message_from_redis(msg: &redis::Msg) -> Option<Message> {
    let channel: Vec<u8> = msg.get_channel().ok()?;
    let pattern = if msg.from_pattern() {
        Some(msg.get_pattern::<Vec<u8>>().ok()?)
    } else {
        None
    };
    Some(Message {
        channel,
        pattern,
        payload: msg.get_payload_bytes().to_vec(),
    })
}

/// Whether a subscription target is an exact channel or a glob pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubscriptionKind {
    Channel,
    Pattern,
}

/// Receives published messages for the channels and patterns it was
/// registered with.
///
/// Callbacks run on the connection's dispatcher task. They must return
/// promptly and must not call back into the connection.
pub trait MessageListener: Send + Sync {
    fn on_message(&self, message: &Message);

    /// Called after the backend confirmed a subscription. `count` is the
    /// number of channels plus patterns now active on the connection.
    fn on_subscribed(&self, _target: &[u8], _kind: SubscriptionKind, _count: usize) {}

    /// Called after a channel or pattern was removed.
    fn on_unsubscribed(&self, _target: &[u8], _kind: SubscriptionKind, _count: usize) {}
}

impl<F> MessageListener for F
where
    F: Fn(&Message) + Send + Sync,
{
    fn on_message(&self, message: &Message) {
        self(message);
    }
}

/// Listener that forwards every message into a channel.
#[derive(Debug, Clone)]
pub struct ChannelListener {
    tx: UnboundedSender<Message>,
}

impl MessageListener for ChannelListener {
    fn on_message(&self, message: &Message) {
        // receiver gone means nobody is waiting any more
        let _ = self.tx.send(message.clone());
    }
}

/// Receiving half of [`message_channel`].
#[derive(Debug)]
pub struct MessageReceiver {
    rx: UnboundedReceiver<Message>,
}

impl MessageReceiver {
    /// Wait for the next message.
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Wait for the next message for at most `timeout`; `None` when the wait
    /// elapsed.
    pub async fn recv_timeout(&mut self, timeout: Duration) -> Option<Message> {
        tokio::time::timeout(timeout, self.rx.recv())
            .await
            .ok()
            .flatten()
    }

    /// Take a message that already arrived, without waiting.
    pub fn try_recv(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }
}

/// Build a listener whose messages can be awaited with a timeout.
///
/// ```rust,no_run
/// use std::time::Duration;
/// use valkey_middleware::prelude::*;
///
/// # async fn demo(conn: &mut MiddlewarePoolConnection) -> Result<(), ValkeyMiddlewareError> {
/// let (listener, mut inbox) = message_channel();
/// conn.subscribe(listener, &["news"]).await?;
/// if let Some(msg) = inbox.recv_timeout(Duration::from_secs(1)).await {
///     println!("{}: {}", msg.channel_str(), msg.payload_str());
/// }
/// # Ok(()) }
/// ```
#[must_use]
pub fn message_channel() -> (Arc<ChannelListener>, MessageReceiver) {
    let (tx, rx) = unbounded_channel();
    (Arc::new(ChannelListener { tx }), MessageReceiver { rx })
}
