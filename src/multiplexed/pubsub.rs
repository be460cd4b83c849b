use futures_util::{FutureExt, StreamExt};
use redis::aio::{PubSubSink, PubSubStream};
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::driver::{MessageSink, SubscribeVerb};
use crate::error::ValkeyMiddlewareError;
use crate::pubsub::message_from_redis;

/// Dedicated pub/sub socket for one multiplexed slot.
///
/// The read half runs on its own task and forwards every message into the
/// slot's dispatcher.
pub(super) struct PubSubLink {
    sink: PubSubSink,
    settle: UnboundedSender<oneshot::Sender<()>>,
    cancel: CancellationToken,
    reader: JoinHandle<()>,
}

impl PubSubLink {
    pub(super) async fn open(
        client: &redis::Client,
        out: MessageSink,
    ) -> Result<Self, ValkeyMiddlewareError> {
        let (sink, stream) = client.get_async_pubsub().await?.split();
        let (settle, settle_rx) = unbounded_channel();
        let cancel = CancellationToken::new();
        let reader = tokio::spawn(forward(stream, out, settle_rx, cancel.clone()));
        debug!("pub/sub link opened");
        Ok(Self {
            sink,
            settle,
            cancel,
            reader,
        })
    }

    /// Each target is acknowledged before the next one is sent.
    pub(super) async fn send(
        &mut self,
        verb: SubscribeVerb,
        targets: &[Vec<u8>],
    ) -> Result<(), ValkeyMiddlewareError> {
        for target in targets {
            match verb {
                SubscribeVerb::Subscribe => self.sink.subscribe(target.as_slice()).await?,
                SubscribeVerb::PSubscribe => self.sink.psubscribe(target.as_slice()).await?,
                SubscribeVerb::Unsubscribe => self.sink.unsubscribe(target.as_slice()).await?,
                SubscribeVerb::PUnsubscribe => self.sink.punsubscribe(target.as_slice()).await?,
            }
        }
        if matches!(verb, SubscribeVerb::Unsubscribe | SubscribeVerb::PUnsubscribe) {
            self.settle().await?;
        }
        Ok(())
    }

    /// Wait until the reader has forwarded every message that arrived ahead
    /// of the last acknowledgement.
    async fn settle(&self) -> Result<(), ValkeyMiddlewareError> {
        let (tx, rx) = oneshot::channel();
        self.settle.send(tx).map_err(|_| {
            ValkeyMiddlewareError::ConnectionError("pub/sub reader stopped".into())
        })?;
        rx.await.map_err(|_| {
            ValkeyMiddlewareError::ConnectionError("pub/sub reader stopped while settling".into())
        })
    }
}

impl Drop for PubSubLink {
    fn drop(&mut self) {
        self.cancel.cancel();
        self.reader.abort();
    }
}

async fn forward(
    mut stream: PubSubStream,
    out: MessageSink,
    mut settle: UnboundedReceiver<oneshot::Sender<()>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            request = settle.recv() => {
                let Some(done) = request else {
                    break;
                };
                // only what is already buffered, never wait for more
                while let Some(Some(msg)) = stream.next().now_or_never() {
                    if !pass_on(&msg, &out) {
                        return;
                    }
                }
                let _ = done.send(());
            }
            next = stream.next() => {
                let Some(msg) = next else {
                    warn!("pub/sub stream ended");
                    break;
                };
                if !pass_on(&msg, &out) {
                    break;
                }
            }
        }
    }
}

/// Returns `false` once the dispatcher is gone.
fn pass_on(msg: &redis::Msg, out: &MessageSink) -> bool {
    match message_from_redis(msg) {
        Some(message) => out.send(message),
        None => true,
    }
}
