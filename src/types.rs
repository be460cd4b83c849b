use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use clap::ValueEnum;
use serde::Deserialize;

use crate::command::format_float;
use crate::error::ValkeyMiddlewareError;

/// The native driver a pool talks through.
///
/// Selection happens once, when the pool creates a physical connection; every
/// command afterwards goes through the same driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, ValueEnum, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DriverType {
    /// Async redis-rs multiplexed connection
    #[cfg(feature = "multiplexed")]
    Multiplexed,
    /// Synchronous redis-rs connection owned by a worker thread
    #[cfg(feature = "blocking")]
    Blocking,
    /// In-process engine, no network
    #[cfg(feature = "embedded")]
    Embedded,
}

impl fmt::Display for DriverType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            #[cfg(feature = "multiplexed")]
            DriverType::Multiplexed => "multiplexed",
            #[cfg(feature = "blocking")]
            DriverType::Blocking => "blocking",
            #[cfg(feature = "embedded")]
            DriverType::Embedded => "embedded",
        };
        f.write_str(name)
    }
}

impl Default for DriverType {
    /// The first compiled-in driver, preferring the network drivers.
    #[allow(clippy::needless_return)]
    fn default() -> Self {
        #[cfg(feature = "multiplexed")]
        return DriverType::Multiplexed;
        #[cfg(all(not(feature = "multiplexed"), feature = "blocking"))]
        return DriverType::Blocking;
        #[cfg(all(
            not(feature = "multiplexed"),
            not(feature = "blocking"),
            feature = "embedded"
        ))]
        return DriverType::Embedded;
    }
}

impl FromStr for DriverType {
    type Err = ValkeyMiddlewareError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            #[cfg(feature = "multiplexed")]
            "multiplexed" => Ok(DriverType::Multiplexed),
            #[cfg(feature = "blocking")]
            "blocking" => Ok(DriverType::Blocking),
            #[cfg(feature = "embedded")]
            "embedded" => Ok(DriverType::Embedded),
            other => Err(ValkeyMiddlewareError::ConfigError(format!(
                "unknown or disabled driver '{other}'"
            ))),
        }
    }
}

/// Result of a command issued through a connection.
///
/// In immediate mode the converted reply comes back at once. While a pipeline
/// or transaction is open the command is only queued; its reply shows up at
/// `position` in the list returned by `close_pipeline` / `exec`.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome<T> {
    Ready(T),
    Queued { position: usize },
}

impl<T> CommandOutcome<T> {
    #[must_use]
    pub fn is_queued(&self) -> bool {
        matches!(self, Self::Queued { .. })
    }

    /// Borrow the immediate value, if any.
    #[must_use]
    pub fn ready(&self) -> Option<&T> {
        match self {
            Self::Ready(value) => Some(value),
            Self::Queued { .. } => None,
        }
    }

    /// Take the immediate value.
    ///
    /// # Errors
    /// Returns `ValkeyMiddlewareError::InvalidState` when the command was queued.
    pub fn into_ready(self) -> Result<T, ValkeyMiddlewareError> {
        match self {
            Self::Ready(value) => Ok(value),
            Self::Queued { position } => Err(ValkeyMiddlewareError::invalid_state(format!(
                "command was queued at position {position}; read it from the drained results"
            ))),
        }
    }

    #[must_use]
    pub fn position(&self) -> Option<usize> {
        match self {
            Self::Queued { position } => Some(*position),
            Self::Ready(_) => None,
        }
    }
}

/// Expiration attached to `SET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiration {
    Seconds(u64),
    Millis(u64),
}

impl Expiration {
    #[must_use]
    pub fn from_duration(duration: Duration) -> Self {
        if duration.subsec_millis() == 0 {
            Expiration::Seconds(duration.as_secs())
        } else {
            Expiration::Millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
        }
    }

    pub(crate) fn is_zero(self) -> bool {
        matches!(self, Expiration::Seconds(0) | Expiration::Millis(0))
    }
}

/// `NX` / `XX` condition on `SET`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetCondition {
    IfAbsent,
    IfPresent,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SetOptions {
    pub expiration: Option<Expiration>,
    pub condition: Option<SetCondition>,
}

impl SetOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn expire(mut self, expiration: Expiration) -> Self {
        self.expiration = Some(expiration);
        self
    }

    #[must_use]
    pub fn if_absent(mut self) -> Self {
        self.condition = Some(SetCondition::IfAbsent);
        self
    }

    #[must_use]
    pub fn if_present(mut self) -> Self {
        self.condition = Some(SetCondition::IfPresent);
        self
    }
}

/// `MATCH` / `COUNT` hints for the scan family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanOptions {
    pub pattern: Option<Vec<u8>>,
    pub count: Option<u64>,
}

impl ScanOptions {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn pattern(mut self, pattern: impl AsRef<[u8]>) -> Self {
        self.pattern = Some(pattern.as_ref().to_vec());
        self
    }

    #[must_use]
    pub fn count(mut self, count: u64) -> Self {
        self.count = Some(count);
        self
    }
}

/// Score bound for `ZCOUNT` / `ZRANGEBYSCORE`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ScoreBound {
    Inclusive(f64),
    Exclusive(f64),
}

impl ScoreBound {
    pub(crate) fn as_arg(self) -> String {
        match self {
            ScoreBound::Inclusive(score) => format_float(score),
            ScoreBound::Exclusive(score) => format!("({}", format_float(score)),
        }
    }

    pub(crate) fn is_nan(self) -> bool {
        match self {
            ScoreBound::Inclusive(score) | ScoreBound::Exclusive(score) => score.is_nan(),
        }
    }
}

impl From<f64> for ScoreBound {
    fn from(score: f64) -> Self {
        ScoreBound::Inclusive(score)
    }
}

/// Stream entry id used by `XADD`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamId {
    /// Let the server assign `<ms>-<seq>`.
    Auto,
    Explicit(String),
}

impl StreamId {
    pub(crate) fn as_arg(&self) -> Vec<u8> {
        match self {
            StreamId::Auto => b"*".to_vec(),
            StreamId::Explicit(id) => id.as_bytes().to_vec(),
        }
    }
}

/// One stream record: its id and field/value pairs in insertion order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEntry {
    pub id: String,
    pub fields: Vec<(Vec<u8>, Vec<u8>)>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[cfg(feature = "embedded")]
    #[test]
    fn driver_type_parses_case_insensitively() {
        assert_eq!(
            "Embedded".parse::<DriverType>().ok(),
            Some(DriverType::Embedded)
        );
        assert!("postgres".parse::<DriverType>().is_err());
    }

    #[test]
    fn queued_outcome_refuses_into_ready() {
        let outcome: CommandOutcome<i64> = CommandOutcome::Queued { position: 2 };
        assert_eq!(outcome.position(), Some(2));
        assert!(outcome.into_ready().is_err());
        assert_eq!(CommandOutcome::Ready(5).into_ready().ok(), Some(5));
    }

    #[test]
    fn score_bounds_render_like_the_server() {
        assert_eq!(ScoreBound::from(2.5).as_arg(), "2.5");
        assert_eq!(ScoreBound::Exclusive(1.0).as_arg(), "(1");
        assert_eq!(ScoreBound::Inclusive(f64::NEG_INFINITY).as_arg(), "-inf");
    }

    #[test]
    fn expiration_prefers_seconds() {
        assert_eq!(
            Expiration::from_duration(Duration::from_secs(3)),
            Expiration::Seconds(3)
        );
        assert_eq!(
            Expiration::from_duration(Duration::from_millis(1500)),
            Expiration::Millis(1500)
        );
    }
}
