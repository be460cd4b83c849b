use super::MiddlewarePoolConnection;
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::{Value, convert};
use crate::types::CommandOutcome;

/// Verbs the raw escape hatch refuses because the connection tracks their
/// state itself.
const MANAGED_VERBS: &[&str] = &[
    "MULTI",
    "EXEC",
    "DISCARD",
    "WATCH",
    "UNWATCH",
    "SUBSCRIBE",
    "PSUBSCRIBE",
    "UNSUBSCRIBE",
    "PUNSUBSCRIBE",
    "SSUBSCRIBE",
    "SUNSUBSCRIBE",
    "MONITOR",
    "RESET",
    "QUIT",
    "SELECT",
];

impl MiddlewarePoolConnection {
    pub async fn ping(&mut self) -> Result<CommandOutcome<String>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("PING"), convert::STATUS).await
    }

    pub async fn echo(
        &mut self,
        message: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Vec<u8>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("ECHO").arg(message), convert::BYTES)
            .await
    }

    pub async fn dbsize(&mut self) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("DBSIZE"), convert::INT).await
    }

    pub async fn flush_db(&mut self) -> Result<CommandOutcome<()>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("FLUSHDB"), convert::UNIT).await
    }

    pub async fn flush_all(&mut self) -> Result<CommandOutcome<()>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("FLUSHALL"), convert::UNIT).await
    }

    /// Server clock as `(unix seconds, microseconds)`.
    pub async fn time(&mut self) -> Result<CommandOutcome<(i64, i64)>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("TIME"), convert::TIME).await
    }

    /// Send any command and get the reply unconverted.
    ///
    /// Follows the connection's mode like every other command.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty name or for verbs whose state the
    /// connection manages (`MULTI`, `WATCH`, `SUBSCRIBE`, ...); use the
    /// dedicated methods for those.
    pub async fn execute<A: AsRef<[u8]>>(
        &mut self,
        name: &str,
        args: &[A],
    ) -> Result<CommandOutcome<Value>, ValkeyMiddlewareError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ValkeyMiddlewareError::invalid_argument(
                "command name must not be empty",
            ));
        }
        let command = Command::new(name).args(args);
        if MANAGED_VERBS.contains(&command.name()) {
            return Err(ValkeyMiddlewareError::invalid_argument(format!(
                "{} must go through its dedicated method",
                command.name()
            )));
        }
        self.dispatch(command, convert::RAW).await
    }
}
