//! Converter registry: one entry per reply shape a command can declare.
//!
//! A [`Converter`] pairs a human-readable shape name with a plain function
//! from [`Value`] to the typed result. Immediate calls run the function right
//! away; queued calls store it in the deferred queue next to the command so
//! the reply at the same position is converted when the queue drains.
//! Mismatches are never coerced: the function hands back the offending value.

use std::collections::HashSet;

use crate::types::StreamEntry;

use super::value::Value;

/// Shape-checked conversion from a normalized reply.
pub struct Converter<T> {
    pub expected: &'static str,
    pub convert: fn(Value) -> Result<T, Value>,
}

impl<T> Clone for Converter<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Converter<T> {}

impl<T> std::fmt::Debug for Converter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converter")
            .field("expected", &self.expected)
            .finish()
    }
}

impl<T> Converter<T> {
    /// Run the conversion.
    ///
    /// # Errors
    /// Returns the reply that did not match the declared shape.
    pub fn apply(&self, value: Value) -> Result<T, Value> {
        (self.convert)(value)
    }
}

pub const UNIT: Converter<()> = Converter {
    expected: "status OK",
    convert: to_unit,
};
pub const BOOL: Converter<bool> = Converter {
    expected: "integer 0/1",
    convert: to_bool,
};
pub const INT: Converter<i64> = Converter {
    expected: "integer",
    convert: to_int,
};
pub const OPTIONAL_INT: Converter<Option<i64>> = Converter {
    expected: "integer or nil",
    convert: to_optional_int,
};
pub const DOUBLE: Converter<f64> = Converter {
    expected: "double",
    convert: to_double,
};
pub const OPTIONAL_DOUBLE: Converter<Option<f64>> = Converter {
    expected: "double or nil",
    convert: to_optional_double,
};
pub const BYTES: Converter<Vec<u8>> = Converter {
    expected: "bulk string",
    convert: to_bytes,
};
pub const OPTIONAL_BYTES: Converter<Option<Vec<u8>>> = Converter {
    expected: "bulk string or nil",
    convert: to_optional_bytes,
};
pub const STATUS: Converter<String> = Converter {
    expected: "status or string",
    convert: to_status,
};
pub const BYTES_LIST: Converter<Vec<Vec<u8>>> = Converter {
    expected: "array of bulk strings",
    convert: to_bytes_list,
};
pub const OPTIONAL_BYTES_LIST: Converter<Vec<Option<Vec<u8>>>> = Converter {
    expected: "array of bulk strings or nils",
    convert: to_optional_bytes_list,
};
pub const BYTES_SET: Converter<HashSet<Vec<u8>>> = Converter {
    expected: "set of bulk strings",
    convert: to_bytes_set,
};
pub const BOOL_LIST: Converter<Vec<bool>> = Converter {
    expected: "array of integers 0/1",
    convert: to_bool_list,
};
pub const PAIRS: Converter<Vec<(Vec<u8>, Vec<u8>)>> = Converter {
    expected: "flat field/value array or map",
    convert: to_pairs,
};
pub const SCORED: Converter<Vec<(Vec<u8>, f64)>> = Converter {
    expected: "member/score pairs",
    convert: to_scored,
};
pub const STREAM_ENTRIES: Converter<Vec<StreamEntry>> = Converter {
    expected: "array of stream entries",
    convert: to_stream_entries,
};
pub const TIME: Converter<(i64, i64)> = Converter {
    expected: "[seconds, microseconds]",
    convert: to_time,
};
pub const RAW: Converter<Value> = Converter {
    expected: "any reply",
    convert: Ok,
};

fn to_unit(value: Value) -> Result<(), Value> {
    match value {
        Value::Status(ref s) if s.eq_ignore_ascii_case("ok") => Ok(()),
        other => Err(other),
    }
}

fn to_bool(value: Value) -> Result<bool, Value> {
    match value {
        Value::Int(0) | Value::Bool(false) => Ok(false),
        Value::Int(1) | Value::Bool(true) => Ok(true),
        // SET with NX/XX answers OK or nil
        Value::Status(ref s) if s.eq_ignore_ascii_case("ok") => Ok(true),
        Value::Nil => Ok(false),
        other => Err(other),
    }
}

fn to_int(value: Value) -> Result<i64, Value> {
    match value {
        Value::Int(i) => Ok(i),
        Value::Bulk(bytes) => parse_ascii::<i64>(&bytes).ok_or(Value::Bulk(bytes)),
        other => Err(other),
    }
}

fn to_optional_int(value: Value) -> Result<Option<i64>, Value> {
    match value {
        Value::Nil => Ok(None),
        other => to_int(other).map(Some),
    }
}

fn to_double(value: Value) -> Result<f64, Value> {
    match value {
        Value::Double(d) => Ok(d),
        Value::Int(i) => {
            #[allow(clippy::cast_precision_loss)]
            let d = i as f64;
            Ok(d)
        }
        Value::Bulk(bytes) => parse_float(&bytes).ok_or(Value::Bulk(bytes)),
        Value::Status(s) => parse_float(s.as_bytes()).ok_or(Value::Status(s)),
        other => Err(other),
    }
}

fn to_optional_double(value: Value) -> Result<Option<f64>, Value> {
    match value {
        Value::Nil => Ok(None),
        other => to_double(other).map(Some),
    }
}

fn to_bytes(value: Value) -> Result<Vec<u8>, Value> {
    match value {
        Value::Bulk(bytes) => Ok(bytes),
        Value::Status(s) => Ok(s.into_bytes()),
        other => Err(other),
    }
}

fn to_optional_bytes(value: Value) -> Result<Option<Vec<u8>>, Value> {
    match value {
        Value::Nil => Ok(None),
        other => to_bytes(other).map(Some),
    }
}

fn to_status(value: Value) -> Result<String, Value> {
    match value {
        Value::Status(s) => Ok(s),
        Value::Bulk(bytes) => String::from_utf8(bytes)
            .map_err(|e| Value::Bulk(e.into_bytes())),
        other => Err(other),
    }
}

fn to_bytes_list(value: Value) -> Result<Vec<Vec<u8>>, Value> {
    match value {
        Value::Array(items) => items.into_iter().map(to_bytes).collect(),
        Value::Nil => Ok(Vec::new()),
        other => Err(other),
    }
}

fn to_optional_bytes_list(value: Value) -> Result<Vec<Option<Vec<u8>>>, Value> {
    match value {
        Value::Array(items) => items.into_iter().map(to_optional_bytes).collect(),
        other => Err(other),
    }
}

fn to_bytes_set(value: Value) -> Result<HashSet<Vec<u8>>, Value> {
    to_bytes_list(value).map(|items| items.into_iter().collect())
}

fn to_bool_list(value: Value) -> Result<Vec<bool>, Value> {
    match value {
        Value::Array(items) => items.into_iter().map(to_bool).collect(),
        other => Err(other),
    }
}

fn to_pairs(value: Value) -> Result<Vec<(Vec<u8>, Vec<u8>)>, Value> {
    match value {
        Value::Map(pairs) => pairs
            .into_iter()
            .map(|(k, v)| Ok((to_bytes(k)?, to_bytes(v)?)))
            .collect(),
        Value::Array(items) => {
            if items.len() % 2 != 0 {
                return Err(Value::Array(items));
            }
            let mut out = Vec::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(k), Some(v)) = (iter.next(), iter.next()) {
                out.push((to_bytes(k)?, to_bytes(v)?));
            }
            Ok(out)
        }
        other => Err(other),
    }
}

fn to_scored(value: Value) -> Result<Vec<(Vec<u8>, f64)>, Value> {
    match value {
        Value::Map(pairs) => pairs
            .into_iter()
            .map(|(k, v)| Ok((to_bytes(k)?, to_double(v)?)))
            .collect(),
        Value::Array(items) => {
            // RESP3 servers answer WITHSCORES with nested [member, score] pairs
            if items.iter().all(|item| matches!(item, Value::Array(_))) {
                return items
                    .into_iter()
                    .map(|item| match item {
                        Value::Array(mut pair) if pair.len() == 2 => {
                            let score = pair.pop().unwrap_or(Value::Nil);
                            let member = pair.pop().unwrap_or(Value::Nil);
                            Ok((to_bytes(member)?, to_double(score)?))
                        }
                        other => Err(other),
                    })
                    .collect();
            }
            if items.len() % 2 != 0 {
                return Err(Value::Array(items));
            }
            let mut out = Vec::with_capacity(items.len() / 2);
            let mut iter = items.into_iter();
            while let (Some(member), Some(score)) = (iter.next(), iter.next()) {
                out.push((to_bytes(member)?, to_double(score)?));
            }
            Ok(out)
        }
        other => Err(other),
    }
}

fn to_stream_entries(value: Value) -> Result<Vec<StreamEntry>, Value> {
    let items = match value {
        Value::Array(items) => items,
        Value::Nil => return Ok(Vec::new()),
        other => return Err(other),
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::Array(mut parts) if parts.len() == 2 => {
                let fields = parts.pop().unwrap_or(Value::Nil);
                let id = parts.pop().unwrap_or(Value::Nil);
                Ok(StreamEntry {
                    id: to_status(id)?,
                    fields: to_pairs(fields)?,
                })
            }
            other => Err(other),
        })
        .collect()
}

fn to_time(value: Value) -> Result<(i64, i64), Value> {
    match value {
        Value::Array(items) if items.len() == 2 => {
            let mut iter = items.into_iter();
            match (iter.next(), iter.next()) {
                (Some(secs), Some(micros)) => Ok((to_int(secs)?, to_int(micros)?)),
                _ => Err(Value::Nil),
            }
        }
        other => Err(other),
    }
}

fn parse_ascii<T: std::str::FromStr>(bytes: &[u8]) -> Option<T> {
    std::str::from_utf8(bytes).ok()?.parse().ok()
}

pub(crate) fn parse_float(bytes: &[u8]) -> Option<f64> {
    let text = std::str::from_utf8(bytes).ok()?;
    match text.to_ascii_lowercase().as_str() {
        "inf" | "+inf" => Some(f64::INFINITY),
        "-inf" => Some(f64::NEG_INFINITY),
        other => other.parse().ok(),
    }
}
