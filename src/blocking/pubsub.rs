use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Duration;

use tokio::sync::oneshot;
use tracing::{debug, warn};

use crate::driver::{MessageSink, SubscribeVerb};
use crate::error::ValkeyMiddlewareError;
use crate::pubsub::message_from_redis;

/// How long a read may block before pending control requests are served.
const POLL_INTERVAL: Duration = Duration::from_millis(50);
const ACK_TIMEOUT: Duration = Duration::from_secs(5);
/// Read timeout while handing on messages buffered behind an unsubscribe
/// acknowledgement.
const SETTLE_TIMEOUT: Duration = Duration::from_millis(2);
const SETTLE_LIMIT: usize = 1024;

struct Control {
    verb: SubscribeVerb,
    targets: Vec<Vec<u8>>,
    respond_to: oneshot::Sender<Result<(), ValkeyMiddlewareError>>,
}

/// Second synchronous connection in subscriber mode, read by its own thread.
///
/// Dropping the link closes the control channel, which stops the thread at
/// its next poll.
pub(super) struct PubSubThread {
    control: Sender<Control>,
}

impl PubSubThread {
    pub(super) async fn spawn(
        client: redis::Client,
        name: String,
        out: MessageSink,
    ) -> Result<Self, ValkeyMiddlewareError> {
        let (control, receiver) = mpsc::channel::<Control>();
        let (ready_tx, ready_rx) = oneshot::channel();
        thread::Builder::new()
            .name(name)
            .spawn(move || match client.get_connection() {
                Ok(mut conn) => {
                    let _ = ready_tx.send(Ok(()));
                    run_listener(&mut conn, &receiver, &out);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(ValkeyMiddlewareError::from(err)));
                }
            })
            .map_err(|err| {
                ValkeyMiddlewareError::ConnectionError(format!(
                    "failed to spawn pub/sub thread: {err}"
                ))
            })?;

        ready_rx.await.map_err(|_| {
            ValkeyMiddlewareError::ConnectionError("pub/sub thread exited while connecting".into())
        })??;
        Ok(Self { control })
    }

    pub(super) async fn send(
        &self,
        verb: SubscribeVerb,
        targets: &[Vec<u8>],
    ) -> Result<(), ValkeyMiddlewareError> {
        let (tx, rx) = oneshot::channel();
        self.control
            .send(Control {
                verb,
                targets: targets.to_vec(),
                respond_to: tx,
            })
            .map_err(|_| ValkeyMiddlewareError::ConnectionError("pub/sub thread closed".into()))?;
        rx.await.map_err(|_| {
            ValkeyMiddlewareError::ConnectionError(
                "pub/sub thread dropped while changing subscriptions".into(),
            )
        })?
    }
}

fn run_listener(conn: &mut redis::Connection, control: &Receiver<Control>, out: &MessageSink) {
    let mut pubsub = conn.as_pubsub();
    loop {
        match control.try_recv() {
            Ok(request) => {
                let outcome = apply(&mut pubsub, request.verb, &request.targets, out);
                let failed = outcome.is_err();
                let _ = request.respond_to.send(outcome);
                if failed {
                    break;
                }
                continue;
            }
            Err(TryRecvError::Disconnected) => break,
            Err(TryRecvError::Empty) => {}
        }

        if let Err(err) = pubsub.set_read_timeout(Some(POLL_INTERVAL)) {
            warn!(error = %err, "pub/sub read timeout could not be set");
            break;
        }
        match pubsub.get_message() {
            Ok(msg) => {
                let Some(message) = message_from_redis(&msg) else {
                    continue;
                };
                if !out.send(message) {
                    break;
                }
            }
            Err(err) if err.is_timeout() => {}
            Err(err) => {
                warn!(error = %err, "pub/sub connection failed");
                break;
            }
        }
    }
    debug!("pub/sub thread stopped");
}

fn apply(
    pubsub: &mut redis::PubSub<'_>,
    verb: SubscribeVerb,
    targets: &[Vec<u8>],
    out: &MessageSink,
) -> Result<(), ValkeyMiddlewareError> {
    pubsub.set_read_timeout(Some(ACK_TIMEOUT))?;
    for target in targets {
        let target = target.as_slice();
        match verb {
            SubscribeVerb::Subscribe => pubsub.subscribe(target)?,
            SubscribeVerb::PSubscribe => pubsub.psubscribe(target)?,
            SubscribeVerb::Unsubscribe => pubsub.unsubscribe(target)?,
            SubscribeVerb::PUnsubscribe => pubsub.punsubscribe(target)?,
        }
    }
    if matches!(verb, SubscribeVerb::Unsubscribe | SubscribeVerb::PUnsubscribe) {
        settle(pubsub, out)?;
    }
    Ok(())
}

/// Forward messages that were read while waiting for an unsubscribe
/// acknowledgement before the caller is told it completed.
fn settle(pubsub: &mut redis::PubSub<'_>, out: &MessageSink) -> Result<(), ValkeyMiddlewareError> {
    pubsub.set_read_timeout(Some(SETTLE_TIMEOUT))?;
    for _ in 0..SETTLE_LIMIT {
        match pubsub.get_message() {
            Ok(msg) => {
                if let Some(message) = message_from_redis(&msg) {
                    out.send(message);
                }
            }
            Err(err) if err.is_timeout() => break,
            Err(err) => return Err(err.into()),
        }
    }
    Ok(())
}
