//! Cursor over the `SCAN` family.

use std::collections::VecDeque;

use crate::command::Command;
use crate::error::{ConversionErrors, ConversionFailure, ValkeyMiddlewareError};
use crate::pool::MiddlewarePoolConnection;
use crate::results::{Converter, Value, convert};
use crate::types::ScanOptions;

/// Lazily walks a `SCAN`, `HSCAN`, `SSCAN` or `ZSCAN` iteration.
///
/// Each server round trip returns a batch plus the next cursor token; the
/// cursor fetches a new batch only once the previous one is used up and
/// stops after the server hands back token `0`. Items can repeat across
/// batches when the keyspace changes mid-iteration, as on the server.
///
/// A closed cursor refuses `next`; [`restart`](Self::restart) begins a new
/// iteration from token `0`.
pub struct ScanCursor<'c, T> {
    conn: &'c mut MiddlewarePoolConnection,
    verb: &'static str,
    key: Option<Vec<u8>>,
    options: ScanOptions,
    items: Converter<Vec<T>>,
    token: u64,
    buffer: VecDeque<T>,
    finished: bool,
    closed: bool,
}

impl<T> std::fmt::Debug for ScanCursor<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScanCursor")
            .field("verb", &self.verb)
            .field("token", &self.token)
            .field("buffered", &self.buffer.len())
            .field("finished", &self.finished)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl<'c, T: 'static> ScanCursor<'c, T> {
    pub(crate) fn new(
        conn: &'c mut MiddlewarePoolConnection,
        verb: &'static str,
        key: Option<Vec<u8>>,
        options: ScanOptions,
        items: Converter<Vec<T>>,
    ) -> Result<Self, ValkeyMiddlewareError> {
        if conn.is_queueing() {
            return Err(ValkeyMiddlewareError::invalid_state(format!(
                "{verb} cursors need immediate mode"
            )));
        }
        if options.count == Some(0) {
            return Err(ValkeyMiddlewareError::invalid_argument(
                "scan COUNT must be positive",
            ));
        }
        Ok(Self {
            conn,
            verb,
            key,
            options,
            items,
            token: 0,
            buffer: VecDeque::new(),
            finished: false,
            closed: false,
        })
    }

    /// Server cursor token the next batch will be requested with.
    #[must_use]
    pub fn token(&self) -> u64 {
        self.token
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// True when another item is available, fetching batches as needed.
    ///
    /// # Errors
    /// `InvalidState` once closed; errors from the underlying command.
    pub async fn has_next(&mut self) -> Result<bool, ValkeyMiddlewareError> {
        self.ensure_open()?;
        while self.buffer.is_empty() && !self.finished {
            self.fetch().await?;
        }
        Ok(!self.buffer.is_empty())
    }

    /// Next item, or `None` when the iteration is complete.
    ///
    /// # Errors
    /// As for [`has_next`](Self::has_next).
    pub async fn next(&mut self) -> Result<Option<T>, ValkeyMiddlewareError> {
        if self.has_next().await? {
            Ok(self.buffer.pop_front())
        } else {
            Ok(None)
        }
    }

    /// Drain the remaining items.
    ///
    /// # Errors
    /// As for [`has_next`](Self::has_next).
    pub async fn collect_remaining(&mut self) -> Result<Vec<T>, ValkeyMiddlewareError> {
        let mut out = Vec::new();
        while let Some(item) = self.next().await? {
            out.push(item);
        }
        Ok(out)
    }

    /// Stop iterating. Buffered items are dropped.
    pub fn close(&mut self) {
        self.closed = true;
        self.buffer.clear();
    }

    /// Start over from token `0`, also after `close`.
    pub fn restart(&mut self) {
        self.token = 0;
        self.buffer.clear();
        self.finished = false;
        self.closed = false;
    }

    fn ensure_open(&self) -> Result<(), ValkeyMiddlewareError> {
        if self.closed {
            return Err(ValkeyMiddlewareError::invalid_state(format!(
                "{} cursor is closed",
                self.verb
            )));
        }
        Ok(())
    }

    async fn fetch(&mut self) -> Result<(), ValkeyMiddlewareError> {
        let mut command = Command::new(self.verb);
        if let Some(key) = &self.key {
            command = command.arg(key);
        }
        command = command.arg(self.token.to_string());
        if let Some(pattern) = &self.options.pattern {
            command = command.arg("MATCH").arg(pattern);
        }
        if let Some(count) = self.options.count {
            command = command.arg("COUNT").arg(count.to_string());
        }

        let display = command.display_name();
        let reply = self.conn.dispatch(command, convert::RAW).await?.into_ready()?;
        let (token, batch) = split_scan_reply(reply)
            .map_err(|actual| scan_shape_error(&display, "[cursor, items]", &actual))?;
        let batch = self
            .items
            .apply(batch)
            .map_err(|actual| scan_shape_error(&display, self.items.expected, &actual))?;

        self.token = token;
        self.finished = token == 0;
        self.buffer.extend(batch);
        Ok(())
    }
}

fn split_scan_reply(reply: Value) -> Result<(u64, Value), Value> {
    match reply {
        Value::Array(parts) if parts.len() == 2 => {
            let mut parts = parts.into_iter();
            match (parts.next(), parts.next()) {
                (Some(Value::Bulk(token)), Some(items)) => {
                    let parsed = std::str::from_utf8(&token)
                        .ok()
                        .and_then(|s| s.parse::<u64>().ok());
                    match parsed {
                        Some(token) => Ok((token, items)),
                        None => Err(Value::Bulk(token)),
                    }
                }
                (Some(Value::Int(token)), Some(items)) if token >= 0 => {
                    Ok((token.unsigned_abs(), items))
                }
                (Some(other), _) => Err(other),
                _ => Err(Value::Nil),
            }
        }
        other => Err(other),
    }
}

fn scan_shape_error(command: &str, expected: &'static str, actual: &Value) -> ValkeyMiddlewareError {
    ValkeyMiddlewareError::Conversion(ConversionErrors {
        failures: vec![ConversionFailure {
            position: 0,
            command: command.to_string(),
            expected,
            actual: actual.describe(),
        }],
    })
}
