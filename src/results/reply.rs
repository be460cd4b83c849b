use std::collections::HashSet;

use crate::error::ServerError;
use crate::types::StreamEntry;

use super::value::Value;

/// Typed reply as it appears in a drained pipeline or transaction.
///
/// Each position holds the shape its command declares, so
/// `SADD`, `SCARD`, `SMEMBERS` drain to `[Int(1), Int(1), BytesSet({v1})]`.
/// A command the server rejected keeps its slot as [`Reply::Error`].
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Nil,
    Unit,
    Bool(bool),
    Int(i64),
    Double(f64),
    Bytes(Vec<u8>),
    Status(String),
    BytesList(Vec<Vec<u8>>),
    OptionalBytesList(Vec<Option<Vec<u8>>>),
    BytesSet(HashSet<Vec<u8>>),
    BoolList(Vec<bool>),
    Map(Vec<(Vec<u8>, Vec<u8>)>),
    Scored(Vec<(Vec<u8>, f64)>),
    StreamEntries(Vec<StreamEntry>),
    Raw(Value),
    Error(ServerError),
}

impl Reply {
    #[must_use]
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }

    #[must_use]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        if let Reply::Int(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Reply::Bool(value) => Some(*value),
            Reply::Int(1) => Some(true),
            Reply::Int(0) => Some(false),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_double(&self) -> Option<f64> {
        if let Reply::Double(value) = self {
            Some(*value)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bytes(&self) -> Option<&[u8]> {
        if let Reply::Bytes(bytes) = self {
            Some(bytes)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_status(&self) -> Option<&str> {
        if let Reply::Status(s) = self {
            Some(s)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bytes_list(&self) -> Option<&[Vec<u8>]> {
        if let Reply::BytesList(items) = self {
            Some(items)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_bytes_set(&self) -> Option<&HashSet<Vec<u8>>> {
        if let Reply::BytesSet(items) = self {
            Some(items)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&[(Vec<u8>, Vec<u8>)]> {
        if let Reply::Map(pairs) = self {
            Some(pairs)
        } else {
            None
        }
    }

    #[must_use]
    pub fn as_error(&self) -> Option<&ServerError> {
        if let Reply::Error(err) = self {
            Some(err)
        } else {
            None
        }
    }
}

impl From<()> for Reply {
    fn from((): ()) -> Self {
        Reply::Unit
    }
}

impl From<bool> for Reply {
    fn from(value: bool) -> Self {
        Reply::Bool(value)
    }
}

impl From<i64> for Reply {
    fn from(value: i64) -> Self {
        Reply::Int(value)
    }
}

impl From<f64> for Reply {
    fn from(value: f64) -> Self {
        Reply::Double(value)
    }
}

impl From<String> for Reply {
    fn from(value: String) -> Self {
        Reply::Status(value)
    }
}

impl From<Vec<u8>> for Reply {
    fn from(value: Vec<u8>) -> Self {
        Reply::Bytes(value)
    }
}

impl From<Option<Vec<u8>>> for Reply {
    fn from(value: Option<Vec<u8>>) -> Self {
        value.map_or(Reply::Nil, Reply::Bytes)
    }
}

impl From<Option<i64>> for Reply {
    fn from(value: Option<i64>) -> Self {
        value.map_or(Reply::Nil, Reply::Int)
    }
}

impl From<Option<f64>> for Reply {
    fn from(value: Option<f64>) -> Self {
        value.map_or(Reply::Nil, Reply::Double)
    }
}

impl From<Vec<Vec<u8>>> for Reply {
    fn from(value: Vec<Vec<u8>>) -> Self {
        Reply::BytesList(value)
    }
}

impl From<Vec<Option<Vec<u8>>>> for Reply {
    fn from(value: Vec<Option<Vec<u8>>>) -> Self {
        Reply::OptionalBytesList(value)
    }
}

impl From<HashSet<Vec<u8>>> for Reply {
    fn from(value: HashSet<Vec<u8>>) -> Self {
        Reply::BytesSet(value)
    }
}

impl From<Vec<bool>> for Reply {
    fn from(value: Vec<bool>) -> Self {
        Reply::BoolList(value)
    }
}

impl From<Vec<(Vec<u8>, Vec<u8>)>> for Reply {
    fn from(value: Vec<(Vec<u8>, Vec<u8>)>) -> Self {
        Reply::Map(value)
    }
}

impl From<Vec<(Vec<u8>, f64)>> for Reply {
    fn from(value: Vec<(Vec<u8>, f64)>) -> Self {
        Reply::Scored(value)
    }
}

impl From<Vec<StreamEntry>> for Reply {
    fn from(value: Vec<StreamEntry>) -> Self {
        Reply::StreamEntries(value)
    }
}

impl From<(i64, i64)> for Reply {
    fn from((secs, micros): (i64, i64)) -> Self {
        Reply::Raw(Value::Array(vec![
            Value::Bulk(secs.to_string().into_bytes()),
            Value::Bulk(micros.to_string().into_bytes()),
        ]))
    }
}

impl From<Value> for Reply {
    fn from(value: Value) -> Self {
        Reply::Raw(value)
    }
}
