//! Handle to a command running in the background.

use std::future::Future;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::error::ValkeyMiddlewareError;

/// Lifecycle of a [`ResultHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandleState {
    Pending,
    Ready,
    Failed,
    Cancelled,
}

type Outcome<T> = Result<T, ValkeyMiddlewareError>;

/// Result of work spawned on the runtime, retrieved with an explicit wait.
///
/// The value can be taken once. Waiting again afterwards, or after
/// [`cancel`](Self::cancel), is a state error.
pub struct ResultHandle<T> {
    state: HandleState,
    rx: oneshot::Receiver<Outcome<T>>,
    task: JoinHandle<()>,
    // Outcome that arrived while only the state was being polled
    early: Option<Outcome<T>>,
    taken: bool,
}

impl<T> std::fmt::Debug for ResultHandle<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultHandle")
            .field("state", &self.state)
            .field("taken", &self.taken)
            .finish_non_exhaustive()
    }
}

impl<T: Send + 'static> ResultHandle<T> {
    pub(crate) fn spawn<F>(work: F) -> Self
    where
        F: Future<Output = Outcome<T>> + Send + 'static,
    {
        let (tx, rx) = oneshot::channel();
        let task = tokio::spawn(async move {
            // receiver gone means the handle was dropped
            let _ = tx.send(work.await);
        });
        Self {
            state: HandleState::Pending,
            rx,
            task,
            early: None,
            taken: false,
        }
    }

    /// Current state without waiting.
    pub fn state(&mut self) -> HandleState {
        if self.state == HandleState::Pending {
            if let Ok(outcome) = self.rx.try_recv() {
                self.record(outcome);
            }
        }
        self.state
    }

    /// Wait up to `timeout` for the result.
    ///
    /// Returns `Ok(None)` when the wait elapsed and the work is still
    /// pending; the handle can be waited on again.
    ///
    /// # Errors
    /// The work's own error; `InvalidState` after `cancel` or when the value
    /// was already taken; `ConnectionError` when the task died without
    /// reporting.
    pub async fn wait(&mut self, timeout: Duration) -> Result<Option<T>, ValkeyMiddlewareError> {
        match self.state {
            HandleState::Cancelled => {
                return Err(ValkeyMiddlewareError::invalid_state(
                    "result handle was cancelled",
                ));
            }
            _ if self.taken => {
                return Err(ValkeyMiddlewareError::invalid_state(
                    "result was already taken from this handle",
                ));
            }
            HandleState::Pending => match tokio::time::timeout(timeout, &mut self.rx).await {
                Err(_) => return Ok(None),
                Ok(Ok(outcome)) => self.record(outcome),
                Ok(Err(_)) => {
                    self.state = HandleState::Failed;
                    self.taken = true;
                    return Err(ValkeyMiddlewareError::ConnectionError(
                        "background task ended without a result".into(),
                    ));
                }
            },
            HandleState::Ready | HandleState::Failed => {}
        }

        self.taken = true;
        match self.early.take() {
            Some(Ok(value)) => Ok(Some(value)),
            Some(Err(err)) => Err(err),
            None => Err(ValkeyMiddlewareError::invalid_state(
                "result was already taken from this handle",
            )),
        }
    }

    /// Abort the work if it has not finished. Returns whether anything was
    /// cancelled.
    pub fn cancel(&mut self) -> bool {
        if self.state() != HandleState::Pending {
            return false;
        }
        self.task.abort();
        self.state = HandleState::Cancelled;
        true
    }

    fn record(&mut self, outcome: Outcome<T>) {
        self.state = if outcome.is_ok() {
            HandleState::Ready
        } else {
            HandleState::Failed
        };
        self.early = Some(outcome);
    }
}
