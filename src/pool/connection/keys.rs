use super::{MiddlewarePoolConnection, required};
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::convert;
use crate::scan::ScanCursor;
use crate::types::{CommandOutcome, ScanOptions};

impl MiddlewarePoolConnection {
    /// Delete keys, returning how many existed.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty key list.
    pub async fn del<K: AsRef<[u8]>>(
        &mut self,
        keys: &[K],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let keys = required(keys, "DEL", "key")?;
        self.dispatch(Command::new("DEL").args(keys), convert::INT)
            .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty key list.
    pub async fn exists<K: AsRef<[u8]>>(
        &mut self,
        keys: &[K],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let keys = required(keys, "EXISTS", "key")?;
        self.dispatch(Command::new("EXISTS").args(keys), convert::INT)
            .await
    }

    /// `TYPE`: `string`, `list`, `set`, `zset`, `hash`, `stream` or `none`.
    pub async fn key_type(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<String>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("TYPE").arg(key), convert::STATUS)
            .await
    }

    pub async fn keys(
        &mut self,
        pattern: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("KEYS").arg(pattern), convert::BYTES_LIST)
            .await
    }

    pub async fn rename(
        &mut self,
        key: impl AsRef<[u8]>,
        new_key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<()>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("RENAME").arg(key).arg(new_key), convert::UNIT)
            .await
    }

    /// Returns `false` when the key does not exist.
    pub async fn expire(
        &mut self,
        key: impl AsRef<[u8]>,
        seconds: i64,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("EXPIRE").arg(key).arg_int(seconds),
            convert::BOOL,
        )
        .await
    }

    pub async fn pexpire(
        &mut self,
        key: impl AsRef<[u8]>,
        millis: i64,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("PEXPIRE").arg(key).arg_int(millis),
            convert::BOOL,
        )
        .await
    }

    /// Remaining time to live in seconds; `-1` without expiry, `-2` when the
    /// key does not exist.
    pub async fn ttl(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("TTL").arg(key), convert::INT)
            .await
    }

    pub async fn pttl(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("PTTL").arg(key), convert::INT)
            .await
    }

    pub async fn persist(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("PERSIST").arg(key), convert::BOOL)
            .await
    }

    /// Walk the keyspace with `SCAN`.
    ///
    /// # Errors
    /// `InvalidState` inside a pipeline or `MULTI`.
    pub fn scan(
        &mut self,
        options: ScanOptions,
    ) -> Result<ScanCursor<'_, Vec<u8>>, ValkeyMiddlewareError> {
        ScanCursor::new(self, "SCAN", None, options, convert::BYTES_LIST)
    }
}
