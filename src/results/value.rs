use crate::error::ServerError;

/// A driver reply normalized across the three drivers.
///
/// Every driver hands its native reply to the converters as a `Value`, so the
/// converters never see driver-specific types. Server error replies stay
/// in-band as [`Value::Error`] so a failed command inside a pipeline keeps
/// its position.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Nil,
    Int(i64),
    /// Bulk string (binary safe)
    Bulk(Vec<u8>),
    /// Simple status line such as `OK` or `QUEUED`
    Status(String),
    Double(f64),
    Bool(bool),
    Array(Vec<Value>),
    Map(Vec<(Value, Value)>),
    Error(ServerError),
}

impl Value {
    #[must_use]
    pub fn ok() -> Self {
        Value::Status("OK".into())
    }

    #[must_use]
    pub fn bulk(bytes: impl AsRef<[u8]>) -> Self {
        Value::Bulk(bytes.as_ref().to_vec())
    }

    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    #[must_use]
    pub fn as_error(&self) -> Option<&ServerError> {
        if let Value::Error(err) = self {
            Some(err)
        } else {
            None
        }
    }

    /// Byte view of bulk or status replies.
    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Value::Bulk(bytes) => Some(bytes),
            Value::Status(s) => Some(s.as_bytes()),
            _ => None,
        }
    }

    /// Short description of the reply shape used in conversion errors.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Value::Nil => "nil".into(),
            Value::Int(i) => format!("integer({i})"),
            Value::Bulk(b) => format!("bulk({} bytes)", b.len()),
            Value::Status(s) => format!("status({s})"),
            Value::Double(d) => format!("double({d})"),
            Value::Bool(b) => format!("boolean({b})"),
            Value::Array(items) => format!("array(len {})", items.len()),
            Value::Map(pairs) => format!("map(len {})", pairs.len()),
            Value::Error(err) => format!("error({})", err.code),
        }
    }
}

impl From<ServerError> for Value {
    fn from(err: ServerError) -> Self {
        Value::Error(err)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Int(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Int(i64::from(b))
    }
}

impl From<Option<Vec<u8>>> for Value {
    fn from(opt: Option<Vec<u8>>) -> Self {
        opt.map_or(Value::Nil, Value::Bulk)
    }
}

impl From<Vec<Vec<u8>>> for Value {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Value::Array(items.into_iter().map(Value::Bulk).collect())
    }
}

/// Convert a redis-rs reply into the driver-neutral `Value`.
#[cfg(any(feature = "multiplexed", feature = "blocking"))]
pub(crate) fn from_redis(value: redis::Value) -> Value {
    match value {
        redis::Value::Nil => Value::Nil,
        redis::Value::Int(i) => Value::Int(i),
        redis::Value::BulkString(bytes) => Value::Bulk(bytes),
        redis::Value::SimpleString(s) => Value::Status(s),
        redis::Value::Okay => Value::ok(),
        redis::Value::Double(d) => Value::Double(d),
        redis::Value::Boolean(b) => Value::Bool(b),
        redis::Value::Array(items) | redis::Value::Set(items) => {
            Value::Array(items.into_iter().map(from_redis).collect())
        }
        redis::Value::Map(pairs) => Value::Map(
            pairs
                .into_iter()
                .map(|(k, v)| (from_redis(k), from_redis(v)))
                .collect(),
        ),
        redis::Value::VerbatimString { text, .. } => Value::Bulk(text.into_bytes()),
        redis::Value::Attribute { data, .. } => from_redis(*data),
        redis::Value::ServerError(err) => {
            match crate::error::ValkeyMiddlewareError::from(redis::RedisError::from(err)) {
                crate::error::ValkeyMiddlewareError::Backend(server) => Value::Error(server),
                other => Value::Error(ServerError::err(other.to_string())),
            }
        }
        other => Value::Error(ServerError::err(format!("unsupported reply {other:?}"))),
    }
}

/// Keep server rejections in-band and surface driver failures as errors.
#[cfg(any(feature = "multiplexed", feature = "blocking"))]
pub(crate) fn from_redis_result(
    result: redis::RedisResult<redis::Value>,
) -> Result<Value, crate::error::ValkeyMiddlewareError> {
    match result {
        Ok(value) => Ok(from_redis(value)),
        Err(err) => match crate::error::ValkeyMiddlewareError::from(err) {
            crate::error::ValkeyMiddlewareError::Backend(server) => Ok(Value::Error(server)),
            other => Err(other),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describes_shapes() {
        assert_eq!(Value::Int(3).describe(), "integer(3)");
        assert_eq!(Value::bulk("ab").describe(), "bulk(2 bytes)");
        assert_eq!(
            Value::Error(ServerError::wrong_type()).describe(),
            "error(WRONGTYPE)"
        );
    }

    #[cfg(any(feature = "multiplexed", feature = "blocking"))]
    #[test]
    fn converts_redis_values() {
        let native = redis::Value::Array(vec![
            redis::Value::Okay,
            redis::Value::BulkString(b"v".to_vec()),
            redis::Value::Nil,
        ]);
        assert_eq!(
            from_redis(native),
            Value::Array(vec![Value::ok(), Value::bulk("v"), Value::Nil])
        );
    }
}
