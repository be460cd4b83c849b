use std::any::Any;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use redis::ConnectionLike;
use tokio::sync::oneshot;
use tracing::debug;

use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::{Value, from_redis, from_redis_result};

type BoxedResponse = Result<Box<dyn Any + Send>, ValkeyMiddlewareError>;
type BoxedCallback = Box<dyn FnOnce(&mut redis::Connection) -> BoxedResponse + Send>;

enum Request {
    Execute {
        command: redis::Cmd,
        respond_to: oneshot::Sender<Result<Value, ValkeyMiddlewareError>>,
    },
    Batch {
        commands: Vec<redis::Cmd>,
        respond_to: oneshot::Sender<Result<Vec<Value>, ValkeyMiddlewareError>>,
    },
    Transaction {
        commands: Vec<redis::Cmd>,
        respond_to: oneshot::Sender<Result<Value, ValkeyMiddlewareError>>,
    },
    WithConnection {
        callback: BoxedCallback,
        respond_to: oneshot::Sender<BoxedResponse>,
    },
    Shutdown,
}

/// Thread that owns one synchronous redis-rs connection and serves requests
/// one at a time.
pub(super) struct BlockingWorker {
    sender: Sender<Request>,
}

impl BlockingWorker {
    /// Open the connection on a fresh thread and wait until it is ready.
    pub(super) async fn spawn(
        client: redis::Client,
        name: String,
    ) -> Result<Self, ValkeyMiddlewareError> {
        let (sender, receiver) = mpsc::channel::<Request>();
        let (ready_tx, ready_rx) = oneshot::channel();
        thread::Builder::new()
            .name(name)
            .spawn(move || match client.get_connection() {
                Ok(mut conn) => {
                    let _ = ready_tx.send(Ok(()));
                    run_worker(&mut conn, &receiver);
                }
                Err(err) => {
                    let _ = ready_tx.send(Err(ValkeyMiddlewareError::from(err)));
                }
            })
            .map_err(|err| {
                ValkeyMiddlewareError::ConnectionError(format!(
                    "failed to spawn blocking worker thread: {err}"
                ))
            })?;

        ready_rx.await.map_err(|_| {
            ValkeyMiddlewareError::ConnectionError("blocking worker exited while connecting".into())
        })??;
        Ok(Self { sender })
    }

    fn send_request(&self, request: Request) -> Result<(), ValkeyMiddlewareError> {
        self.sender
            .send(request)
            .map_err(|_| ValkeyMiddlewareError::ConnectionError("blocking worker closed".into()))
    }

    pub(super) async fn execute(&self, command: &Command) -> Result<Value, ValkeyMiddlewareError> {
        let (tx, rx) = oneshot::channel();
        self.send_request(Request::Execute {
            command: command.to_redis(),
            respond_to: tx,
        })?;
        rx.await.map_err(|_| {
            ValkeyMiddlewareError::ConnectionError(
                "blocking worker dropped while executing command".into(),
            )
        })?
    }

    pub(super) async fn batch(
        &self,
        commands: &[Command],
    ) -> Result<Vec<Value>, ValkeyMiddlewareError> {
        let (tx, rx) = oneshot::channel();
        self.send_request(Request::Batch {
            commands: commands.iter().map(Command::to_redis).collect(),
            respond_to: tx,
        })?;
        rx.await.map_err(|_| {
            ValkeyMiddlewareError::ConnectionError(
                "blocking worker dropped while executing pipeline".into(),
            )
        })?
    }

    /// Returns the raw `EXEC` reply.
    pub(super) async fn transaction(
        &self,
        commands: &[Command],
    ) -> Result<Value, ValkeyMiddlewareError> {
        let (tx, rx) = oneshot::channel();
        self.send_request(Request::Transaction {
            commands: commands.iter().map(Command::to_redis).collect(),
            respond_to: tx,
        })?;
        rx.await.map_err(|_| {
            ValkeyMiddlewareError::ConnectionError(
                "blocking worker dropped while executing transaction".into(),
            )
        })?
    }

    pub(super) async fn with_connection<F, R>(&self, func: F) -> Result<R, ValkeyMiddlewareError>
    where
        F: FnOnce(&mut redis::Connection) -> Result<R, ValkeyMiddlewareError> + Send + 'static,
        R: Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let callback: BoxedCallback =
            Box::new(move |conn| func(conn).map(|value| Box::new(value) as Box<dyn Any + Send>));
        self.send_request(Request::WithConnection {
            callback,
            respond_to: tx,
        })?;
        match rx.await {
            Ok(Ok(payload)) => payload.downcast::<R>().map(|boxed| *boxed).map_err(|_| {
                ValkeyMiddlewareError::invalid_state("blocking worker response downcast failure")
            }),
            Ok(Err(err)) => Err(err),
            Err(_) => Err(ValkeyMiddlewareError::ConnectionError(
                "blocking worker dropped while handling custom callback".into(),
            )),
        }
    }
}

impl Drop for BlockingWorker {
    fn drop(&mut self) {
        let _ = self.sender.send(Request::Shutdown);
    }
}

fn run_worker(conn: &mut redis::Connection, receiver: &Receiver<Request>) {
    while let Ok(request) = receiver.recv() {
        match request {
            Request::Execute {
                command,
                respond_to,
            } => {
                let _ = respond_to.send(query(conn, &command));
            }
            Request::Batch {
                commands,
                respond_to,
            } => {
                let _ = respond_to.send(pipeline(conn, commands));
            }
            Request::Transaction {
                commands,
                respond_to,
            } => {
                let _ = respond_to.send(transaction(conn, &commands));
            }
            Request::WithConnection {
                callback,
                respond_to,
            } => {
                let _ = respond_to.send(callback(conn));
            }
            Request::Shutdown => break,
        }
    }
    debug!("blocking worker stopped");
}

fn query(conn: &mut redis::Connection, command: &redis::Cmd) -> Result<Value, ValkeyMiddlewareError> {
    let reply: redis::RedisResult<redis::Value> = command.query(conn);
    from_redis_result(reply)
}

/// Write every command in one packet, then read one reply per command.
/// Server rejections stay at their position.
fn pipeline(
    conn: &mut redis::Connection,
    commands: Vec<redis::Cmd>,
) -> Result<Vec<Value>, ValkeyMiddlewareError> {
    let count = commands.len();
    let mut pipe = redis::pipe();
    for command in commands {
        pipe.add_command(command);
    }
    let replies = conn.req_packed_commands(&pipe.get_packed_pipeline(), 0, count)?;
    Ok(replies.into_iter().map(from_redis).collect())
}

fn transaction(
    conn: &mut redis::Connection,
    commands: &[redis::Cmd],
) -> Result<Value, ValkeyMiddlewareError> {
    if let Value::Error(err) = query(conn, &redis::cmd("MULTI"))? {
        return Err(ValkeyMiddlewareError::Backend(err));
    }
    for command in commands {
        // a rejection here surfaces as EXECABORT from EXEC
        query(conn, command)?;
    }
    query(conn, &redis::cmd("EXEC"))
}
