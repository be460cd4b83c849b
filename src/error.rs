use std::fmt;

use thiserror::Error;

/// Coarse error classes callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Invalid input detected before any I/O.
    Argument,
    /// Operation not allowed in the connection's current mode.
    State,
    /// Failed to obtain or use a physical connection.
    Connectivity,
    /// The server rejected a command.
    Backend,
    /// A reply did not have the shape the command declares.
    Conversion,
}

/// Error reply sent back by the server (or by the embedded engine).
///
/// The leading upper-case token of the message is split off as the `code`
/// (`WRONGTYPE`, `NOSCRIPT`, `EXECABORT`, ...). Messages without such a token
/// get the generic `ERR` code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerError {
    pub code: String,
    pub message: String,
}

impl ServerError {
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
        }
    }

    /// Split a raw error line such as `"WRONGTYPE Operation against a key"`.
    #[must_use]
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line.split_once(' ') {
            Some((head, rest)) if is_error_code(head) => Self::new(head, rest),
            None if is_error_code(line) => Self::new(line, ""),
            _ => Self::new("ERR", line),
        }
    }

    /// Generic `ERR` reply.
    #[must_use]
    pub fn err(message: impl Into<String>) -> Self {
        Self::new("ERR", message)
    }

    #[must_use]
    pub fn wrong_type() -> Self {
        Self::new(
            "WRONGTYPE",
            "Operation against a key holding the wrong kind of value",
        )
    }

    #[must_use]
    pub fn no_script() -> Self {
        Self::new("NOSCRIPT", "No matching script. Please use EVAL.")
    }

    /// True when EVALSHA referenced a script the server has not cached.
    #[must_use]
    pub fn is_no_script(&self) -> bool {
        self.code == "NOSCRIPT"
    }

    #[must_use]
    pub fn is_wrong_type(&self) -> bool {
        self.code == "WRONGTYPE"
    }
}

fn is_error_code(token: &str) -> bool {
    !token.is_empty()
        && token
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit() || c == '_')
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)
        } else {
            write!(f, "{} {}", self.code, self.message)
        }
    }
}

/// One queued reply whose shape did not match its command's converter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionFailure {
    /// Zero-based index in the drained pipeline or transaction.
    pub position: usize,
    pub command: String,
    pub expected: &'static str,
    pub actual: String,
}

impl fmt::Display for ConversionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} {}: expected {}, got {}",
            self.position, self.command, self.expected, self.actual
        )
    }
}

/// Every conversion failure found while walking a drained queue.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConversionErrors {
    pub failures: Vec<ConversionFailure>,
}

impl ConversionErrors {
    #[must_use]
    pub fn positions(&self) -> Vec<usize> {
        self.failures.iter().map(|f| f.position).collect()
    }
}

impl fmt::Display for ConversionErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.failures.iter().map(ToString::to_string).collect();
        write!(f, "{}", parts.join("; "))
    }
}

#[derive(Debug, Error)]
pub enum ValkeyMiddlewareError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Connection is subscribed: {0}")]
    Subscribed(String),

    #[error("Connection error: {0}")]
    ConnectionError(String),

    #[error("Pool exhausted: {0}")]
    PoolExhausted(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Server error: {0}")]
    Backend(ServerError),

    #[error("Reply conversion failed: {0}")]
    Conversion(ConversionErrors),

    #[error("Protocol desync: {expected} queued commands but {received} replies")]
    ProtocolDesync { expected: usize, received: usize },

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Unimplemented feature: {0}")]
    Unimplemented(String),
}

impl ValkeyMiddlewareError {
    /// Map the error onto its class.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidArgument(_) | Self::ConfigError(_) => ErrorKind::Argument,
            Self::InvalidState(_) | Self::Subscribed(_) | Self::Unimplemented(_) => {
                ErrorKind::State
            }
            Self::ConnectionError(_) | Self::PoolExhausted(_) | Self::Timeout(_) => {
                ErrorKind::Connectivity
            }
            Self::Backend(_) | Self::ProtocolDesync { .. } => ErrorKind::Backend,
            Self::Conversion(_) => ErrorKind::Conversion,
        }
    }

    #[must_use]
    pub fn server_error(&self) -> Option<&ServerError> {
        match self {
            Self::Backend(err) => Some(err),
            _ => None,
        }
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub(crate) fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }
}

impl From<ServerError> for ValkeyMiddlewareError {
    fn from(err: ServerError) -> Self {
        ValkeyMiddlewareError::Backend(err)
    }
}

impl From<bb8::RunError<ValkeyMiddlewareError>> for ValkeyMiddlewareError {
    fn from(err: bb8::RunError<ValkeyMiddlewareError>) -> Self {
        match err {
            bb8::RunError::User(inner) => inner,
            bb8::RunError::TimedOut => ValkeyMiddlewareError::PoolExhausted(
                "timed out waiting for a free connection".into(),
            ),
        }
    }
}

#[cfg(any(feature = "multiplexed", feature = "blocking"))]
impl From<redis::RedisError> for ValkeyMiddlewareError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_timeout() {
            return ValkeyMiddlewareError::Timeout(err.to_string());
        }
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            return ValkeyMiddlewareError::ConnectionError(err.to_string());
        }
        match err.kind() {
            redis::ErrorKind::NoScriptError => {
                ValkeyMiddlewareError::Backend(ServerError::new(
                    "NOSCRIPT",
                    err.detail().unwrap_or_default(),
                ))
            }
            redis::ErrorKind::InvalidClientConfig => {
                ValkeyMiddlewareError::ConfigError(err.to_string())
            }
            redis::ErrorKind::TypeError => ValkeyMiddlewareError::Conversion(ConversionErrors {
                failures: vec![ConversionFailure {
                    position: 0,
                    command: String::new(),
                    expected: "driver value",
                    actual: err.to_string(),
                }],
            }),
            _ => {
                let code = err.code().unwrap_or("ERR").to_string();
                let message = err.detail().unwrap_or_default().to_string();
                ValkeyMiddlewareError::Backend(ServerError::new(code, message))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_error_codes() {
        let err = ServerError::parse("WRONGTYPE Operation against a key");
        assert_eq!(err.code, "WRONGTYPE");
        assert_eq!(err.message, "Operation against a key");

        let err = ServerError::parse("NOSCRIPT No matching script");
        assert!(err.is_no_script());

        let err = ServerError::parse("something went wrong");
        assert_eq!(err.code, "ERR");
        assert_eq!(err.message, "something went wrong");
    }

    #[test]
    fn kinds_follow_taxonomy() {
        assert_eq!(
            ValkeyMiddlewareError::invalid_argument("x").kind(),
            ErrorKind::Argument
        );
        assert_eq!(
            ValkeyMiddlewareError::Subscribed("x".into()).kind(),
            ErrorKind::State
        );
        assert_eq!(
            ValkeyMiddlewareError::PoolExhausted("x".into()).kind(),
            ErrorKind::Connectivity
        );
        assert_eq!(
            ValkeyMiddlewareError::Backend(ServerError::wrong_type()).kind(),
            ErrorKind::Backend
        );
        assert_eq!(
            ValkeyMiddlewareError::Conversion(ConversionErrors::default()).kind(),
            ErrorKind::Conversion
        );
    }
}
