use super::{MiddlewarePoolConnection, required, required_pairs};
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::convert;
use crate::types::{CommandOutcome, Expiration, SetCondition, SetOptions};

impl MiddlewarePoolConnection {
    pub async fn get(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("GET").arg(key), convert::OPTIONAL_BYTES)
            .await
    }

    pub async fn set(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<()>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("SET").arg(key).arg(value), convert::UNIT)
            .await
    }

    /// `SET` with expiration and/or an `NX` / `XX` condition. Returns
    /// whether the value was written.
    ///
    /// # Errors
    /// `InvalidArgument` for a zero expiration.
    pub async fn set_with(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
        options: SetOptions,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        let mut command = Command::new("SET").arg(key).arg(value);
        match options.expiration {
            Some(expiration) if expiration.is_zero() => {
                return Err(ValkeyMiddlewareError::invalid_argument(
                    "SET expiration must be positive",
                ));
            }
            Some(Expiration::Seconds(secs)) => command = command.arg("EX").arg(secs.to_string()),
            Some(Expiration::Millis(ms)) => command = command.arg("PX").arg(ms.to_string()),
            None => {}
        }
        match options.condition {
            Some(SetCondition::IfAbsent) => command = command.arg("NX"),
            Some(SetCondition::IfPresent) => command = command.arg("XX"),
            None => {}
        }
        self.dispatch(command, convert::BOOL).await
    }

    pub async fn set_nx(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("SETNX").arg(key).arg(value), convert::BOOL)
            .await
    }

    pub async fn get_set(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("GETSET").arg(key).arg(value),
            convert::OPTIONAL_BYTES,
        )
        .await
    }

    pub async fn get_del(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("GETDEL").arg(key), convert::OPTIONAL_BYTES)
            .await
    }

    /// Substring with inclusive, possibly negative, offsets.
    pub async fn get_range(
        &mut self,
        key: impl AsRef<[u8]>,
        start: i64,
        end: i64,
    ) -> Result<CommandOutcome<Vec<u8>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("GETRANGE").arg(key).arg_int(start).arg_int(end),
            convert::BYTES,
        )
        .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty key list.
    pub async fn mget<K: AsRef<[u8]>>(
        &mut self,
        keys: &[K],
    ) -> Result<CommandOutcome<Vec<Option<Vec<u8>>>>, ValkeyMiddlewareError> {
        let keys = required(keys, "MGET", "key")?;
        self.dispatch(Command::new("MGET").args(keys), convert::OPTIONAL_BYTES_LIST)
            .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty pair list.
    pub async fn mset<K: AsRef<[u8]>, V: AsRef<[u8]>>(
        &mut self,
        pairs: &[(K, V)],
    ) -> Result<CommandOutcome<()>, ValkeyMiddlewareError> {
        let args = required_pairs(pairs, "MSET")?;
        self.dispatch(Command::new("MSET").args(args), convert::UNIT)
            .await
    }

    pub async fn incr(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("INCR").arg(key), convert::INT)
            .await
    }

    pub async fn decr(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("DECR").arg(key), convert::INT)
            .await
    }

    pub async fn incr_by(
        &mut self,
        key: impl AsRef<[u8]>,
        delta: i64,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("INCRBY").arg(key).arg_int(delta), convert::INT)
            .await
    }

    pub async fn decr_by(
        &mut self,
        key: impl AsRef<[u8]>,
        delta: i64,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("DECRBY").arg(key).arg_int(delta), convert::INT)
            .await
    }

    /// # Errors
    /// `InvalidArgument` for a NaN or infinite delta.
    pub async fn incr_by_float(
        &mut self,
        key: impl AsRef<[u8]>,
        delta: f64,
    ) -> Result<CommandOutcome<f64>, ValkeyMiddlewareError> {
        if !delta.is_finite() {
            return Err(ValkeyMiddlewareError::invalid_argument(
                "INCRBYFLOAT delta must be finite",
            ));
        }
        self.dispatch(
            Command::new("INCRBYFLOAT").arg(key).arg_float(delta),
            convert::DOUBLE,
        )
        .await
    }

    pub async fn append(
        &mut self,
        key: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("APPEND").arg(key).arg(value), convert::INT)
            .await
    }

    pub async fn strlen(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("STRLEN").arg(key), convert::INT)
            .await
    }
}
