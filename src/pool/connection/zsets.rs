use super::{MiddlewarePoolConnection, required};
use crate::command::Command;
use crate::error::ValkeyMiddlewareError;
use crate::results::convert;
use crate::scan::ScanCursor;
use crate::types::{CommandOutcome, ScanOptions, ScoreBound};

fn not_nan(score: f64, command: &str) -> Result<(), ValkeyMiddlewareError> {
    if score.is_nan() {
        return Err(ValkeyMiddlewareError::invalid_argument(format!(
            "{command} score must not be NaN"
        )));
    }
    Ok(())
}

fn bounds(
    min: ScoreBound,
    max: ScoreBound,
    command: &str,
) -> Result<[String; 2], ValkeyMiddlewareError> {
    if min.is_nan() || max.is_nan() {
        return Err(ValkeyMiddlewareError::invalid_argument(format!(
            "{command} bounds must not be NaN"
        )));
    }
    Ok([min.as_arg(), max.as_arg()])
}

impl MiddlewarePoolConnection {
    /// Add or update `(score, member)` pairs, returning how many were new.
    ///
    /// # Errors
    /// `InvalidArgument` for an empty list or a NaN score.
    pub async fn zadd<M: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        members: &[(f64, M)],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        if members.is_empty() {
            return Err(ValkeyMiddlewareError::invalid_argument(
                "ZADD needs at least one score/member pair",
            ));
        }
        let mut command = Command::new("ZADD").arg(key);
        for (score, member) in members {
            not_nan(*score, "ZADD")?;
            command = command.arg_float(*score).arg(member);
        }
        self.dispatch(command, convert::INT).await
    }

    /// # Errors
    /// `InvalidArgument` for a NaN increment.
    pub async fn zincr_by(
        &mut self,
        key: impl AsRef<[u8]>,
        increment: f64,
        member: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<f64>, ValkeyMiddlewareError> {
        not_nan(increment, "ZINCRBY")?;
        self.dispatch(
            Command::new("ZINCRBY").arg(key).arg_float(increment).arg(member),
            convert::DOUBLE,
        )
        .await
    }

    /// # Errors
    /// `InvalidArgument` for an empty member list.
    pub async fn zrem<M: AsRef<[u8]>>(
        &mut self,
        key: impl AsRef<[u8]>,
        members: &[M],
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let members = required(members, "ZREM", "member")?;
        self.dispatch(Command::new("ZREM").arg(key).args(members), convert::INT)
            .await
    }

    pub async fn zscore(
        &mut self,
        key: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<f64>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("ZSCORE").arg(key).arg(member),
            convert::OPTIONAL_DOUBLE,
        )
        .await
    }

    pub async fn zcard(
        &mut self,
        key: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        self.dispatch(Command::new("ZCARD").arg(key), convert::INT)
            .await
    }

    /// Members with a score between `min` and `max`.
    ///
    /// # Errors
    /// `InvalidArgument` for a NaN bound.
    pub async fn zcount(
        &mut self,
        key: impl AsRef<[u8]>,
        min: impl Into<ScoreBound>,
        max: impl Into<ScoreBound>,
    ) -> Result<CommandOutcome<i64>, ValkeyMiddlewareError> {
        let range = bounds(min.into(), max.into(), "ZCOUNT")?;
        self.dispatch(Command::new("ZCOUNT").arg(key).args(range), convert::INT)
            .await
    }

    /// Zero-based rank by ascending score, `None` for a missing member.
    pub async fn zrank(
        &mut self,
        key: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<i64>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("ZRANK").arg(key).arg(member),
            convert::OPTIONAL_INT,
        )
        .await
    }

    pub async fn zrevrank(
        &mut self,
        key: impl AsRef<[u8]>,
        member: impl AsRef<[u8]>,
    ) -> Result<CommandOutcome<Option<i64>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("ZREVRANK").arg(key).arg(member),
            convert::OPTIONAL_INT,
        )
        .await
    }

    pub async fn zrange(
        &mut self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("ZRANGE").arg(key).arg_int(start).arg_int(stop),
            convert::BYTES_LIST,
        )
        .await
    }

    pub async fn zrevrange(
        &mut self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("ZREVRANGE").arg(key).arg_int(start).arg_int(stop),
            convert::BYTES_LIST,
        )
        .await
    }

    pub async fn zrange_with_scores(
        &mut self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Result<CommandOutcome<Vec<(Vec<u8>, f64)>>, ValkeyMiddlewareError> {
        self.dispatch(
            Command::new("ZRANGE")
                .arg(key)
                .arg_int(start)
                .arg_int(stop)
                .arg("WITHSCORES"),
            convert::SCORED,
        )
        .await
    }

    /// Members with a score between `min` and `max`, lowest first.
    ///
    /// # Errors
    /// `InvalidArgument` for a NaN bound.
    pub async fn zrange_by_score(
        &mut self,
        key: impl AsRef<[u8]>,
        min: impl Into<ScoreBound>,
        max: impl Into<ScoreBound>,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        let range = bounds(min.into(), max.into(), "ZRANGEBYSCORE")?;
        self.dispatch(
            Command::new("ZRANGEBYSCORE").arg(key).args(range),
            convert::BYTES_LIST,
        )
        .await
    }

    /// Page through a score range with `LIMIT offset count`.
    ///
    /// # Errors
    /// `InvalidArgument` for a NaN bound.
    pub async fn zrange_by_score_limit(
        &mut self,
        key: impl AsRef<[u8]>,
        min: impl Into<ScoreBound>,
        max: impl Into<ScoreBound>,
        offset: i64,
        count: i64,
    ) -> Result<CommandOutcome<Vec<Vec<u8>>>, ValkeyMiddlewareError> {
        let range = bounds(min.into(), max.into(), "ZRANGEBYSCORE")?;
        self.dispatch(
            Command::new("ZRANGEBYSCORE")
                .arg(key)
                .args(range)
                .arg("LIMIT")
                .arg_int(offset)
                .arg_int(count),
            convert::BYTES_LIST,
        )
        .await
    }

    /// Walk a sorted set's `(member, score)` pairs.
    ///
    /// # Errors
    /// `InvalidState` inside a pipeline or `MULTI`.
    pub fn zscan(
        &mut self,
        key: impl AsRef<[u8]>,
        options: ScanOptions,
    ) -> Result<ScanCursor<'_, (Vec<u8>, f64)>, ValkeyMiddlewareError> {
        let key = key.as_ref().to_vec();
        ScanCursor::new(self, "ZSCAN", Some(key), options, convert::SCORED)
    }
}
