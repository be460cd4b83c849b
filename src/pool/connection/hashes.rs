use super::{MiddlewarePoolConnection, required, required_pairs};
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::convert;
use crate::scan::ScanCursor;
use crate::types::{CommandOutcome, ScanOptions};

impl MiddlewarePoolConnection {
    /// Set one field. Returns `true` when the field is new.
    pub async fn hset(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("HSET").arg(key).arg(field).arg(value),
            convert::BOOL,
        )
        .await
    }

    /// Set several fields, returning how many were new.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty pair list.
    pub async fn hset_multiple<F: AsRef<[u8]>, V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        pairs: &[(F, V)],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let args = required_pairs(pairs, "HSET")?;
        self.dispatch(Command::new("HSET").arg(key).args(args), convert::INT)
            .await
    }

    pub async fn hset_nx(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("HSETNX").arg(key).arg(field).arg(value),
            convert::BOOL,
        )
        .await
    }

    pub async fn hget(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("HGET").arg(key).arg(field),
            convert::OPTIONAL_BYTES,
        )
        .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty field list.
    pub async fn hmget<F: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        fields: &[F],
    ) -> Result<CommandOutcome<Vec<Option<Vec<u8>>>>, ValkeyMiddlewareError> {
        let fields = required(fields, "HMGET", "field")?;
        self.dispatch(
            Command::new("HMGET").arg(key).args(fields),
            convert::OPTIONAL_BYTES_LIST,
        )
        .await
    }

    pub async fn hgetall(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Vec<(Vec<u8>, Vec<u8>)>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("HGETALL").arg(key), convert::PAIRS)
            .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty field list.
    pub async fn hdel<F: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        fields: &[F],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let fields = required(fields, "HDEL", "field")?;
        self.dispatch(Command::new("HDEL").arg(key).args(fields), convert::INT)
            .await
    }

    pub async fn hexists(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("HEXISTS").arg(key).arg(field), convert::BOOL)
            .await
    }

    pub async fn hlen(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("HLEN").arg(key), convert::INT)
            .await
    }

    pub async fn hkeys(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("HKEYS").arg(key), convert::BYTES_LIST)
            .await
    }

    pub async fn hvals(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("HVALS").arg(key), convert::BYTES_LIST)
            .await
    }

    pub async fn hincr_by(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        delta: i64,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("HINCRBY").arg(key).arg(field).arg_int(delta),
            convert::INT,
        )
        .await
    }

    /// Walk a hash's field/value pairs.
    ///
    /// # Errors
    /// `InvalidState` inside a pipeline or `MULTI`.
    pub fn hscan(
        &mut self,
        key: impl AsRef<[u8]>,
        options: ScanOptions,
    ) -> Result<ScanCursor<'_, (Vec<u8>, Vec<u8>)>, ValkeyMiddlewareError> {
        let key = key.as_ref().to_vec();
        ScanCursor::new(self, "HSCAN", Some(key), options, convert::PAIRS)
    }
}
