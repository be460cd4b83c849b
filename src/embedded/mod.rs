//! In-process engine that speaks the same command surface as a Valkey server.
//!
//! One [`EmbeddedStore`] is shared by every connection of a pool: the
//! keyspace sits behind a single mutex so each command, and each
//! transaction as a whole, is atomic with respect to the others.

mod broker;
mod commands;
mod config;
mod connection;
mod keyspace;
mod stream;

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::command::Command;
use crate::results::Value;

use broker::Broker;
pub(crate) use connection::EmbeddedConnection;
use keyspace::Keyspace;

struct StoreInner {
    keyspace: Mutex<Keyspace>,
    broker: Broker,
    /// Loaded scripts by lower-case SHA1 hex digest.
    scripts: Mutex<HashMap<String, Vec<u8>>>,
    next_subscriber: AtomicU64,
}

/// Shared state of the embedded engine.
#[derive(Clone)]
pub struct EmbeddedStore {
    inner: Arc<StoreInner>,
}

impl Default for EmbeddedStore {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EmbeddedStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddedStore")
            .field("keys", &self.inner.keyspace.lock().len())
            .finish_non_exhaustive()
    }
}

impl EmbeddedStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(StoreInner {
                keyspace: Mutex::new(Keyspace::default()),
                broker: Broker::default(),
                scripts: Mutex::new(HashMap::new()),
                next_subscriber: AtomicU64::new(1),
            }),
        }
    }

    /// Run one command outside of any pooled connection.
    ///
    /// Connection-scoped verbs (`WATCH`, `MULTI`, subscriptions) are not
    /// available here and answer an error reply.
    #[must_use]
    pub fn execute(&self, command: &Command) -> Value {
        connection::run_shared(self, command).unwrap_or_else(|| {
            let mut keyspace = self.inner.keyspace.lock();
            commands::execute(&mut keyspace, command.name(), command.arguments())
        })
    }

    /// Number of live keys.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.keyspace.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub(crate) fn connect(&self) -> EmbeddedConnection {
        let id = self.inner.next_subscriber.fetch_add(1, Ordering::Relaxed);
        EmbeddedConnection::new(self.clone(), id)
    }
}
