use super::{MiddlewarePoolConnection, required};
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::convert;
use crate::types::CommandOutcome;

impl MiddlewarePoolConnection {
    /// Prepend values, returning the new length.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty value list.
    pub async fn lpush<V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        values: &[V],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let values = required(values, "LPUSH", "value")?;
        self.dispatch(Command::new("LPUSH").arg(key).args(values), convert::INT)
            .await
    }

    /// Append values, returning the new length.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty value list.
    pub async fn rpush<V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        values: &[V],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let values = required(values, "RPUSH", "value")?;
        self.dispatch(Command::new("RPUSH").arg(key).args(values), convert::INT)
            .await
    }

    pub async fn lpop(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("LPOP").arg(key), convert::OPTIONAL_BYTES)
            .await
    }

    pub async fn rpop(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("RPOP").arg(key), convert::OPTIONAL_BYTES)
            .await
    }

    pub async fn lrange(
        &mut self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("LRANGE").arg(key).arg_int(start).arg_int(stop),
            convert::BYTES_LIST,
        )
        .await
    }

    pub async fn llen(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("LLEN").arg(key), convert::INT)
            .await
    }

    pub async fn lindex(
        &mut self,
        key: impl AsRef<[u8]>,
        index: i64,
    ) -> Result<CommandOutcome<Option<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("LINDEX").arg(key).arg_int(index),
            convert::OPTIONAL_BYTES,
        )
        .await
    }

    pub async fn lset(
        &mut self,
        key: impl AsRef<[u8]>,
        index: i64,
        value: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<()>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("LSET").arg(key).arg_int(index).arg(value),
            convert::UNIT,
        )
        .await
    }

    /// Remove occurrences of `value`: from the head for positive `count`,
    /// from the tail for negative, all of them for `0`.
    pub async fn lrem(
        &mut self,
        key: impl AsRef<[u8]>,
        count: i64,
        value: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("LREM").arg(key).arg_int(count).arg(value),
            convert::INT,
        )
        .await
    }

    pub async fn ltrim(
        &mut self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Result<CommandOutcome<()>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("LTRIM").arg(key).arg_int(start).arg_int(stop),
            convert::UNIT,
        )
        .await
    }
}
