use std::collections::BTreeMap;
use std::fmt;

use crate::error::ServerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub(crate) struct EntryId {
    ms: u64,
    seq: u64,
}

impl EntryId {
    const MIN: EntryId = EntryId { ms: 0, seq: 0 };
    const MAX: EntryId = EntryId {
        ms: u64::MAX,
        seq: u64::MAX,
    };

    /// Parse `<ms>-<seq>` or `<ms>`; a bare `<ms>` takes `default_seq`.
    fn parse(raw: &[u8], default_seq: u64) -> Result<Self, ServerError> {
        let invalid = || ServerError::err("Invalid stream ID specified as stream command argument");
        let text = std::str::from_utf8(raw).map_err(|_| invalid())?;
        match text.split_once('-') {
            Some((ms, seq)) => Ok(EntryId {
                ms: ms.parse().map_err(|_| invalid())?,
                seq: seq.parse().map_err(|_| invalid())?,
            }),
            None => Ok(EntryId {
                ms: text.parse().map_err(|_| invalid())?,
                seq: default_seq,
            }),
        }
    }

    fn parse_start(raw: &[u8]) -> Result<Self, ServerError> {
        if raw == b"-" {
            Ok(Self::MIN)
        } else {
            Self::parse(raw, 0)
        }
    }

    fn parse_end(raw: &[u8]) -> Result<Self, ServerError> {
        if raw == b"+" {
            Ok(Self::MAX)
        } else {
            Self::parse(raw, u64::MAX)
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.ms, self.seq)
    }
}

pub(crate) type Fields = Vec<(Vec<u8>, Vec<u8>)>;

/// Append-only log of field/value records ordered by id.
#[derive(Debug, Clone, Default)]
pub(crate) struct Stream {
    entries: BTreeMap<EntryId, Fields>,
    last_id: EntryId,
}

impl Stream {
    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Append a record; `*` asks for an id derived from the wall clock.
    pub(crate) fn add(&mut self, id: &[u8], fields: Fields) -> Result<String, ServerError> {
        let next = if id == b"*" {
            let now = u64::try_from(chrono::Utc::now().timestamp_millis()).unwrap_or(0);
            if now > self.last_id.ms {
                EntryId { ms: now, seq: 0 }
            } else {
                EntryId {
                    ms: self.last_id.ms,
                    seq: self.last_id.seq + 1,
                }
            }
        } else if let Some(ms) = id.strip_suffix(b"-*") {
            let ms = EntryId::parse(ms, 0)?.ms;
            let seq = if ms == self.last_id.ms {
                self.last_id.seq + 1
            } else {
                0
            };
            EntryId { ms, seq }
        } else {
            EntryId::parse(id, 0)?
        };

        if next == EntryId::MIN {
            return Err(ServerError::err(
                "The ID specified in XADD must be greater than 0-0",
            ));
        }
        if next <= self.last_id {
            return Err(ServerError::err(
                "The ID specified in XADD is equal or smaller than the target stream top item",
            ));
        }
        self.last_id = next;
        self.entries.insert(next, fields);
        Ok(next.to_string())
    }

    pub(crate) fn range(
        &self,
        start: &[u8],
        end: &[u8],
        count: Option<usize>,
        reverse: bool,
    ) -> Result<Vec<(String, Fields)>, ServerError> {
        let (low, high) = if reverse {
            (EntryId::parse_start(end)?, EntryId::parse_end(start)?)
        } else {
            (EntryId::parse_start(start)?, EntryId::parse_end(end)?)
        };
        if low > high {
            return Ok(Vec::new());
        }
        let limit = count.unwrap_or(usize::MAX);
        let iter = self.entries.range(low..=high);
        let picked: Vec<(String, Fields)> = if reverse {
            iter.rev()
                .take(limit)
                .map(|(id, f)| (id.to_string(), f.clone()))
                .collect()
        } else {
            iter.take(limit)
                .map(|(id, f)| (id.to_string(), f.clone()))
                .collect()
        };
        Ok(picked)
    }

    pub(crate) fn delete(&mut self, ids: &[Vec<u8>]) -> Result<i64, ServerError> {
        let mut removed = 0;
        for raw in ids {
            let id = EntryId::parse(raw, 0)?;
            if self.entries.remove(&id).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    /// Keep only the newest `max_len` records.
    pub(crate) fn trim(&mut self, max_len: usize) -> i64 {
        let mut removed = 0;
        while self.entries.len() > max_len {
            if self.entries.pop_first().is_none() {
                break;
            }
            removed += 1;
        }
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fields(v: &str) -> Fields {
        vec![(b"f".to_vec(), v.as_bytes().to_vec())]
    }

    #[test]
    fn explicit_ids_must_increase() {
        let mut stream = Stream::default();
        assert_eq!(stream.add(b"5-1", fields("a")).ok(), Some("5-1".to_string()));
        assert!(stream.add(b"5-1", fields("b")).is_err());
        assert_eq!(stream.add(b"5-*", fields("c")).ok(), Some("5-2".to_string()));
        assert!(stream.add(b"0-0", fields("d")).is_err());
    }

    #[test]
    fn ranges_respect_direction_and_count() {
        let mut stream = Stream::default();
        for i in 1..=4 {
            stream.add(format!("{i}-0").as_bytes(), fields("x")).expect("add");
        }
        let fwd = stream.range(b"-", b"+", Some(2), false).expect("range");
        assert_eq!(fwd.iter().map(|(id, _)| id.as_str()).collect::<Vec<_>>(), ["1-0", "2-0"]);
        let rev = stream.range(b"+", b"-", None, true).expect("range");
        assert_eq!(rev.first().map(|(id, _)| id.as_str()), Some("4-0"));
        assert_eq!(stream.trim(1), 3);
        assert_eq!(stream.len(), 1);
    }
}
