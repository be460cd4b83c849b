use super::{MiddlewarePoolConnection, required, required_pairs};
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::convert;
use crate::types::{CommandOutcome, StreamEntry, StreamId};

impl MiddlewarePoolConnection {
    /// Append an entry, returning the id it was stored under.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty field list.
    pub async fn xadd<F: AsRef<[u8]>, V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        id: &StreamId,
        fields: &[(F, V)],
    ) -> Result<CommandOutcome<String>, ValkeyMiddlewareError> {
        let fields = required_pairs(fields, "XADD")?;
        self.dispatch(
            Command::new("XADD").arg(key).arg(id.as_arg()).args(fields),
            convert::STATUS,
        )
        .await
    }

    /// `XADD` that trims the stream to `max_len` entries afterwards.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty field list.
    pub async fn xadd_maxlen<F: AsRef<[u8]>, V: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        max_len: u64,
        id: &StreamId,
        fields: &[(F, V)],
    ) -> Result<CommandOutcome<String>, ValkeyMiddlewareError> {
        let fields = required_pairs(fields, "XADD")?;
        self.dispatch(
            Command::new("XADD")
                .arg(key)
                .arg("MAXLEN")
                .arg(max_len.to_string())
                .arg(id.as_arg())
                .args(fields),
            convert::STATUS,
        )
        .await
    }

    pub async fn xlen(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("XLEN").arg(key), convert::INT)
            .await
    }

    /// Entries with ids between `start` and `end` (`-` and `+` for the
    /// extremes), oldest first.
    pub async fn xrange(
        &mut self,
        key: impl AsRef<[u8]>,
        start: impl AsRef<[u8]>,
        end: impl AsRef<[u8]>,
        count: Option<u64>,
    ) -> Result<CommandOutcome<Vec<StreamEntry>>, ValkeyMiddlewareError> {
        let command = with_count(Command::new("XRANGE").arg(key).arg(start).arg(end), count);
        self.dispatch(command, convert::STREAM_ENTRIES).await
    }

    /// As [`xrange`](Self::xrange), newest first; `end` is the upper id.
    pub async fn xrevrange(
        &mut self,
        key: impl AsRef<[u8]>,
        end: impl AsRef<[u8]>,
        start: impl AsRef<[u8]>,
        count: Option<u64>,
    ) -> Result<CommandOutcome<Vec<StreamEntry>>, ValkeyMiddlewareError> {
        let command = with_count(Command::new("XREVRANGE").arg(key).arg(end).arg(start), count);
        self.dispatch(command, convert::STREAM_ENTRIES).await
    }

    /// # Errors
    /// `InvalidArgument` for an empty id list.
    pub async fn xdel<I: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        ids: &[I],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let ids = required(ids, "XDEL", "id")?;
        self.dispatch(Command::new("XDEL").arg(key).args(ids), convert::INT)
            .await
    }

    /// Trim to `max_len` entries, returning how many were evicted.
    pub async fn xtrim(
        &mut self,
        key: impl AsRef<[u8]>,
        max_len: u64,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("XTRIM")
                .arg(key)
                .arg("MAXLEN")
                .arg(max_len.to_string()),
            convert::INT,
        )
        .await
    }
}

fn with_count(command: Command, count: Option<u64>) -> Command {
    match count {
        Some(count) => command.arg("COUNT").arg(count.to_string()),
        None => command,
    }
}
