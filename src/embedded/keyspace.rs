use std::collections::{HashMap, HashSet, VecDeque};
use std::time::{Duration, Instant};

use crate::error::ServerError;

use super::stream::Stream;

/// Value stored under a key.
#[derive(Debug, Clone)]
pub(crate) enum Data {
    Str(Vec<u8>),
    Hash(HashMap<Vec<u8>, Vec<u8>>),
    List(VecDeque<Vec<u8>>),
    Set(HashSet<Vec<u8>>),
    ZSet(HashMap<Vec<u8>, f64>),
    Stream(Stream),
}

impl Data {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Data::Str(_) => "string",
            Data::Hash(_) => "hash",
            Data::List(_) => "list",
            Data::Set(_) => "set",
            Data::ZSet(_) => "zset",
            Data::Stream(_) => "stream",
        }
    }

    fn is_empty_container(&self) -> bool {
        match self {
            Data::Str(_) | Data::Stream(_) => false,
            Data::Hash(h) => h.is_empty(),
            Data::List(l) => l.is_empty(),
            Data::Set(s) => s.is_empty(),
            Data::ZSet(z) => z.is_empty(),
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct Entry {
    pub(crate) data: Data,
    pub(crate) expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}

/// The single logical database of the embedded engine.
///
/// Every write bumps the key's version; `WATCH` snapshots versions and
/// `EXEC` compares them. Expired keys are removed lazily on access.
#[derive(Debug, Default)]
pub(crate) struct Keyspace {
    entries: HashMap<Vec<u8>, Entry>,
    versions: HashMap<Vec<u8>, u64>,
    clock: u64,
}

impl Keyspace {
    fn purge_expired(&mut self, key: &[u8]) {
        let now = Instant::now();
        if self.entries.get(key).is_some_and(|e| e.is_expired(now)) {
            self.entries.remove(key);
            self.touch(key);
        }
    }

    pub(crate) fn touch(&mut self, key: &[u8]) {
        self.clock += 1;
        self.versions.insert(key.to_vec(), self.clock);
    }

    pub(crate) fn version(&mut self, key: &[u8]) -> u64 {
        self.purge_expired(key);
        self.versions.get(key).copied().unwrap_or(0)
    }

    pub(crate) fn get(&mut self, key: &[u8]) -> Option<&Entry> {
        self.purge_expired(key);
        self.entries.get(key)
    }

    /// Mutable access for a write; bumps the key's version.
    pub(crate) fn get_mut(&mut self, key: &[u8]) -> Option<&mut Entry> {
        self.purge_expired(key);
        if self.entries.contains_key(key) {
            self.touch(key);
        }
        self.entries.get_mut(key)
    }

    pub(crate) fn contains(&mut self, key: &[u8]) -> bool {
        self.get(key).is_some()
    }

    /// Store `data`, dropping any previous TTL.
    pub(crate) fn insert(&mut self, key: &[u8], data: Data) {
        self.touch(key);
        self.entries.insert(
            key.to_vec(),
            Entry {
                data,
                expires_at: None,
            },
        );
    }

    pub(crate) fn insert_entry(&mut self, key: &[u8], entry: Entry) {
        self.touch(key);
        self.entries.insert(key.to_vec(), entry);
    }

    pub(crate) fn remove(&mut self, key: &[u8]) -> Option<Entry> {
        self.purge_expired(key);
        let removed = self.entries.remove(key);
        if removed.is_some() {
            self.touch(key);
        }
        removed
    }

    /// Drop a container key that a write left empty.
    pub(crate) fn remove_if_empty(&mut self, key: &[u8]) {
        if self
            .entries
            .get(key)
            .is_some_and(|e| e.data.is_empty_container())
        {
            self.entries.remove(key);
            self.touch(key);
        }
    }

    pub(crate) fn set_expiry(&mut self, key: &[u8], ttl: Option<Duration>) -> bool {
        let deadline = ttl.map(|ttl| Instant::now() + ttl);
        match self.get_mut(key) {
            Some(entry) => {
                entry.expires_at = deadline;
                true
            }
            None => false,
        }
    }

    /// Remaining TTL: `None` when the key is missing, `Some(None)` when it
    /// never expires.
    pub(crate) fn ttl(&mut self, key: &[u8]) -> Option<Option<Duration>> {
        let now = Instant::now();
        self.get(key)
            .map(|entry| entry.expires_at.map(|at| at.saturating_duration_since(now)))
    }

    /// Live keys in byte order.
    pub(crate) fn keys(&mut self) -> Vec<Vec<u8>> {
        let now = Instant::now();
        let expired: Vec<Vec<u8>> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, _)| k.clone())
            .collect();
        for key in expired {
            self.entries.remove(&key);
            self.touch(&key);
        }
        let mut keys: Vec<Vec<u8>> = self.entries.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub(crate) fn len(&mut self) -> usize {
        self.keys().len()
    }

    pub(crate) fn flush(&mut self) {
        let keys: Vec<Vec<u8>> = self.entries.keys().cloned().collect();
        for key in keys {
            self.touch(&key);
        }
        self.entries.clear();
    }
}

/// Typed views over a key, failing with `WRONGTYPE` on a mismatch.
macro_rules! typed_access {
    ($read:ident, $write:ident, $variant:ident, $ty:ty) => {
        impl Keyspace {
            pub(crate) fn $read(&mut self, key: &[u8]) -> Result<Option<&$ty>, ServerError> {
                match self.get(key) {
                    None => Ok(None),
                    Some(Entry {
                        data: Data::$variant(inner),
                        ..
                    }) => Ok(Some(inner)),
                    Some(_) => Err(ServerError::wrong_type()),
                }
            }

            /// Mutable view, creating an empty value when the key is missing.
            pub(crate) fn $write(&mut self, key: &[u8]) -> Result<&mut $ty, ServerError> {
                if !self.contains(key) {
                    self.insert(key, Data::$variant(Default::default()));
                }
                match self.get_mut(key) {
                    Some(Entry {
                        data: Data::$variant(inner),
                        ..
                    }) => Ok(inner),
                    _ => Err(ServerError::wrong_type()),
                }
            }
        }
    };
}

typed_access!(read_hash, write_hash, Hash, HashMap<Vec<u8>, Vec<u8>>);
typed_access!(read_list, write_list, List, VecDeque<Vec<u8>>);
typed_access!(read_set, write_set, Set, HashSet<Vec<u8>>);
typed_access!(read_zset, write_zset, ZSet, HashMap<Vec<u8>, f64>);
typed_access!(read_stream, write_stream, Stream, Stream);

impl Keyspace {
    pub(crate) fn read_string(&mut self, key: &[u8]) -> Result<Option<&Vec<u8>>, ServerError> {
        match self.get(key) {
            None => Ok(None),
            Some(Entry {
                data: Data::Str(bytes),
                ..
            }) => Ok(Some(bytes)),
            Some(_) => Err(ServerError::wrong_type()),
        }
    }

    /// Replace the string at `key`, keeping its TTL.
    pub(crate) fn update_string(&mut self, key: &[u8], value: Vec<u8>) -> Result<(), ServerError> {
        match self.get_mut(key) {
            Some(Entry {
                data: Data::Str(bytes),
                ..
            }) => {
                *bytes = value;
                Ok(())
            }
            Some(_) => Err(ServerError::wrong_type()),
            None => {
                self.insert(key, Data::Str(value));
                Ok(())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_bump_versions_reads_do_not() {
        let mut ks = Keyspace::default();
        let before = ks.version(b"k");
        ks.insert(b"k", Data::Str(b"v".to_vec()));
        let after_write = ks.version(b"k");
        assert!(after_write > before);
        let _ = ks.get(b"k");
        assert_eq!(ks.version(b"k"), after_write);
        ks.remove(b"k");
        assert!(ks.version(b"k") > after_write);
    }

    #[test]
    fn wrong_type_is_reported() {
        let mut ks = Keyspace::default();
        ks.insert(b"k", Data::Str(b"v".to_vec()));
        assert!(ks.read_set(b"k").is_err());
        assert!(ks.write_hash(b"k").is_err());
    }

    #[test]
    fn expired_keys_disappear() {
        let mut ks = Keyspace::default();
        ks.insert(b"k", Data::Str(b"v".to_vec()));
        ks.set_expiry(b"k", Some(Duration::from_millis(0)));
        assert!(!ks.contains(b"k"));
        assert!(ks.keys().is_empty());
    }

    #[test]
    fn empty_containers_are_removed() {
        let mut ks = Keyspace::default();
        ks.write_set(b"s").expect("set").insert(b"m".to_vec());
        ks.write_set(b"s").expect("set").clear();
        ks.remove_if_empty(b"s");
        assert!(!ks.contains(b"s"));
    }
}
