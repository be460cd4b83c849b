use std::collections::HashSet;

use super::{MiddlewarePoolConnection, required};
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::convert;
use crate::scan::ScanCursor;
use crate::types::{CommandOutcome, ScanOptions};

impl MiddlewarePoolConnection {
    /// Add members, returning how many were new.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty member list.
    pub async fn sadd<M: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        members: &[M],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let members = required(members, "SADD", "member")?;
        self.dispatch(Command::new("SADD").arg(key).args(members), convert::INT)
            .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty member list.
    pub async fn srem<M: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        members: &[M],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let members = required(members, "SREM", "member")?;
        self.dispatch(Command::new("SREM").arg(key).args(members), convert::INT)
            .await
    }

    pub async fn smembers(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<HashSet<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("SMEMBERS").arg(key), convert::BYTES_SET)
            .await
    }

    pub async fn sismember(
        &mut self,
        key: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("SISMEMBER").arg(key).arg(member),
            convert::BOOL,
        )
        .await
    }

    /// Membership of each member, in argument order.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty member list.
    pub async fn smismember<M: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        members: &[M],
    ) -> Result<CommandOutcome<Vec<bool>>, ValkeyMiddlewareError> {
        let members = required(members, "SMISMEMBER", "member")?;
        self.dispatch(
            Command::new("SMISMEMBER").arg(key).args(members),
            convert::BOOL_LIST,
        )
        .await
    }

    pub async fn scard(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("SCARD").arg(key), convert::INT)
            .await
    }

    /// Members of the first set missing from every other.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty key list.
    pub async fn sdiff<K: AsRef<[u8]>>(
        &mut self,
        keys: &[K],
    ) -> Result<CommandOutcome<HashSet<Vec<u8>>>, ValkeyMiddlewareError> {
        let keys = required(keys, "SDIFF", "key")?;
        self.dispatch(Command::new("SDIFF").args(keys), convert::BYTES_SET)
            .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty key list.
    pub async fn sinter<K: AsRef<[u8]>>(
        &mut self,
        keys: &[K],
    ) -> Result<CommandOutcome<HashSet<Vec<u8>>>, ValkeyMiddlewareError> {
        let keys = required(keys, "SINTER", "key")?;
        self.dispatch(Command::new("SINTER").args(keys), convert::BYTES_SET)
            .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty key list.
    pub async fn sunion<K: AsRef<[u8]>>(
        &mut self,
        keys: &[K],
    ) -> Result<CommandOutcome<HashSet<Vec<u8>>>, ValkeyMiddlewareError> {
        let keys = required(keys, "SUNION", "key")?;
        self.dispatch(Command::new("SUNION").args(keys), convert::BYTES_SET)
            .await
    }

    /// Store the difference in `destination`, returning its size.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty key list.
    pub async fn sdiff_store<K: AsRef<[u8]>>(
        &mut self,
        destination: impl AsRef<[u8]>,
        keys: &[K],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let keys = required(keys, "SDIFFSTORE", "key")?;
        self.dispatch(
            Command::new("SDIFFSTORE").arg(destination).args(keys),
            convert::INT,
        )
        .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty key list.
    pub async fn sinter_store<K: AsRef<[u8]>>(
        &mut self,
        destination: impl AsRef<[u8]>,
        keys: &[K],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let keys = required(keys, "SINTERSTORE", "key")?;
        self.dispatch(
            Command::new("SINTERSTORE").arg(destination).args(keys),
            convert::INT,
        )
        .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty key list.
    pub async fn sunion_store<K: AsRef<[u8]>>(
        &mut self,
        destination: impl AsRef<[u8]>,
        keys: &[K],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let keys = required(keys, "SUNIONSTORE", "key")?;
        self.dispatch(
            Command::new("SUNIONSTORE").arg(destination).args(keys),
            convert::INT,
        )
        .await
    }

    /// One random member, `None` for a missing key.
    pub async fn srandmember(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("SRANDMEMBER").arg(key),
            convert::OPTIONAL_BYTES,
        )
        .await
    }

    /// Random members.
    ///
    /// A positive `count` returns up to `count` distinct members. A negative
    /// `count` returns exactly `|count|` members and may repeat them.
    pub async fn srandmember_count(
        &mut self,
        key: impl AsRef<[u8]>,
        count: i64,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("SRANDMEMBER").arg(key).arg_int(count),
            convert::BYTES_LIST,
        )
        .await
    }

    pub async fn spop(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("SPOP").arg(key), convert::OPTIONAL_BYTES)
            .await
    }

    /// # Errors
    /// `InvalidArgument` for a negative count.
    pub async fn spop_count(
        &mut self,
        key: impl AsRef<[u8]>,
        count: i64,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        if count < 0 {
            return Err(ValkeyMiddlewareError::invalid_argument(
                "SPOP count must not be negative",
            ));
        }
        self.dispatch(
            Command::new("SPOP").arg(key).arg_int(count),
            convert::BYTES_LIST,
        )
        .await
    }

    pub async fn smove(
        &mut self,
        source: impl AsRef<[u8]>,
        destination: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<bool>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("SMOVE").arg(source).arg(destination).arg(member),
            convert::BOOL,
        )
        .await
    }

    /// Walk a set's members.
    ///
    /// # Errors
    /// `InvalidState` inside a pipeline or `MULTI`.
    pub fn sscan(
        &mut self,
        key: impl AsRef<[u8]>,
        options: ScanOptions,
    ) -> Result<ScanCursor<'_, Vec<u8>>, ValkeyMiddlewareError> {
        let key = key.as_ref().to_vec();
        ScanCursor::new(self, "SSCAN", Some(key), options, convert::BYTES_LIST)
    }
}
