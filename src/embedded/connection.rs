use std::collections::HashMap;

use async_trait::async_trait;
use tracing::debug;

use super::EmbeddedStore;
use super::broker::SubscriberId;
use super::commands::{self, eq_ignore_case, wrong_arity};
use super::keyspace::Keyspace;
use crate::command::Command;
use crate::driver::{DriverAdapter, MessageSink, TransactionReply};
use crate::error::{ServerError, ValkeyMiddlewareError};
use crate::results::Value;
use crate::script::sha1_hex;
use crate::types::DriverType;

/// Verbs that only make sense on a pooled connection.
const CONNECTION_VERBS: &[&str] = &[
    "WATCH",
    "UNWATCH",
    "MULTI",
    "EXEC",
    "DISCARD",
    "SUBSCRIBE",
    "PSUBSCRIBE",
    "UNSUBSCRIBE",
    "PUNSUBSCRIBE",
];

/// Commands served from the store rather than from a single key. Answers
/// `None` for verbs the keyspace handlers own.
pub(super) fn run_shared(store: &EmbeddedStore, command: &Command) -> Option<Value> {
    let args = command.arguments();
    let name = command.name();
    let reply = match name {
        "PING" => match args {
            [] => Ok(Value::Status("PONG".into())),
            [message] => Ok(Value::Bulk(message.clone())),
            _ => Err(wrong_arity("ping")),
        },
        "ECHO" => match args {
            [message] => Ok(Value::Bulk(message.clone())),
            _ => Err(wrong_arity("echo")),
        },
        "SELECT" => match args {
            [db] if db.as_slice() == b"0" => Ok(Value::ok()),
            [_] => Err(ServerError::err("DB index is out of range")),
            _ => Err(wrong_arity("select")),
        },
        "TIME" => {
            let now = chrono::Utc::now();
            Ok(Value::Array(vec![
                Value::Bulk(now.timestamp().to_string().into_bytes()),
                Value::Bulk(now.timestamp_subsec_micros().to_string().into_bytes()),
            ]))
        }
        "PUBLISH" => match args {
            [channel, payload] => Ok(Value::Int(store.inner.broker.publish(channel, payload))),
            _ => Err(wrong_arity("publish")),
        },
        "SCRIPT" => script(store, args),
        "EVAL" => Err(ServerError::err(
            "scripting is not available in the embedded engine",
        )),
        "EVALSHA" => match args.first() {
            Some(sha) => {
                let sha = String::from_utf8_lossy(sha).to_ascii_lowercase();
                if store.inner.scripts.lock().contains_key(&sha) {
                    Err(ServerError::err(
                        "scripting is not available in the embedded engine",
                    ))
                } else {
                    Err(ServerError::no_script())
                }
            }
            None => Err(wrong_arity("evalsha")),
        },
        verb if CONNECTION_VERBS.contains(&verb) => Err(ServerError::err(format!(
            "{} is only available through a pooled connection",
            verb.to_ascii_lowercase()
        ))),
        _ => return None,
    };
    Some(reply.unwrap_or_else(Value::Error))
}

fn script(store: &EmbeddedStore, args: &[Vec<u8>]) -> Result<Value, ServerError> {
    let Some((sub, rest)) = args.split_first() else {
        return Err(wrong_arity("script"));
    };
    if eq_ignore_case(sub, "LOAD") {
        let [body] = rest else {
            return Err(wrong_arity("script|load"));
        };
        let sha = sha1_hex(body);
        store.inner.scripts.lock().insert(sha.clone(), body.clone());
        Ok(Value::Bulk(sha.into_bytes()))
    } else if eq_ignore_case(sub, "EXISTS") {
        if rest.is_empty() {
            return Err(wrong_arity("script|exists"));
        }
        let scripts = store.inner.scripts.lock();
        Ok(Value::Array(
            rest.iter()
                .map(|sha| {
                    let sha = String::from_utf8_lossy(sha).to_ascii_lowercase();
                    Value::from(scripts.contains_key(&sha))
                })
                .collect(),
        ))
    } else if eq_ignore_case(sub, "FLUSH") {
        store.inner.scripts.lock().clear();
        Ok(Value::ok())
    } else {
        Err(ServerError::err(format!(
            "unknown subcommand '{}'",
            String::from_utf8_lossy(sub)
        )))
    }
}

/// One client of the embedded engine. Holds the connection-scoped state:
/// watched key versions and the subscriber identity used by the broker.
pub(crate) struct EmbeddedConnection {
    store: EmbeddedStore,
    id: SubscriberId,
    watched: HashMap<Vec<u8>, u64>,
}

impl EmbeddedConnection {
    pub(super) fn new(store: EmbeddedStore, id: SubscriberId) -> Self {
        Self {
            store,
            id,
            watched: HashMap::new(),
        }
    }

    pub(crate) fn store(&self) -> &EmbeddedStore {
        &self.store
    }

    fn run(&mut self, ks: &mut Keyspace, command: &Command, in_multi: bool) -> Value {
        let args = command.arguments();
        match command.name() {
            "WATCH" if in_multi => Value::Error(ServerError::err("WATCH inside MULTI is not allowed")),
            "WATCH" if args.is_empty() => Value::Error(wrong_arity("watch")),
            "WATCH" => {
                for key in args {
                    let version = ks.version(key);
                    self.watched.entry(key.clone()).or_insert(version);
                }
                Value::ok()
            }
            "UNWATCH" => {
                self.watched.clear();
                Value::ok()
            }
            name => run_shared(&self.store, command)
                .unwrap_or_else(|| commands::execute(ks, name, args)),
        }
    }

    fn run_one(&mut self, command: &Command) -> Value {
        let store = self.store.clone();
        let mut ks = store.inner.keyspace.lock();
        self.run(&mut ks, command, false)
    }

    fn run_transaction(&mut self, commands: &[Command]) -> Result<TransactionReply, ValkeyMiddlewareError> {
        let store = self.store.clone();
        let mut ks = store.inner.keyspace.lock();
        // EXEC always drops the watch list, committed or not
        let watched = std::mem::take(&mut self.watched);
        if let Some(key) = watched
            .iter()
            .find_map(|(key, version)| (ks.version(key) != *version).then_some(key))
        {
            debug!(key = %String::from_utf8_lossy(key), "watched key changed, transaction aborted");
            return Ok(TransactionReply::Aborted);
        }
        if let Some((bad, err)) = commands.iter().find_map(|c| {
            commands::check_queued(c.name(), c.arguments())
                .err()
                .map(|err| (c, err))
        }) {
            debug!(command = %bad.display_name(), error = %err, "command rejected while queued, transaction discarded");
            return Err(ValkeyMiddlewareError::Backend(ServerError::new(
                "EXECABORT",
                "Transaction discarded because of previous errors.",
            )));
        }
        let replies = commands
            .iter()
            .map(|command| self.run(&mut ks, command, true))
            .collect();
        Ok(TransactionReply::Committed(replies))
    }
}

impl Drop for EmbeddedConnection {
    fn drop(&mut self) {
        self.store.inner.broker.drop_subscriber(self.id);
    }
}

#[async_trait]
impl DriverAdapter for EmbeddedConnection {
    fn driver_type(&self) -> DriverType {
        DriverType::Embedded
    }

    async fn execute(&mut self, command: &Command) -> Result<Value, ValkeyMiddlewareError> {
        Ok(self.run_one(command))
    }

    async fn execute_pipeline(
        &mut self,
        commands: &[Command],
    ) -> Result<Vec<Value>, ValkeyMiddlewareError> {
        Ok(commands.iter().map(|command| self.run_one(command)).collect())
    }

    async fn execute_transaction(
        &mut self,
        commands: &[Command],
    ) -> Result<TransactionReply, ValkeyMiddlewareError> {
        self.run_transaction(commands)
    }

    async fn subscribe(
        &mut self,
        channels: &[Vec<u8>],
        sink: &MessageSink,
    ) -> Result<(), ValkeyMiddlewareError> {
        for channel in channels {
            self.store.inner.broker.subscribe(self.id, channel, sink);
        }
        Ok(())
    }

    async fn psubscribe(
        &mut self,
        patterns: &[Vec<u8>],
        sink: &MessageSink,
    ) -> Result<(), ValkeyMiddlewareError> {
        for pattern in patterns {
            self.store.inner.broker.psubscribe(self.id, pattern, sink);
        }
        Ok(())
    }

    async fn unsubscribe(&mut self, channels: &[Vec<u8>]) -> Result<(), ValkeyMiddlewareError> {
        for channel in channels {
            self.store.inner.broker.unsubscribe(self.id, channel);
        }
        Ok(())
    }

    async fn punsubscribe(&mut self, patterns: &[Vec<u8>]) -> Result<(), ValkeyMiddlewareError> {
        for pattern in patterns {
            self.store.inner.broker.punsubscribe(self.id, pattern);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmd(name: &str, args: &[&str]) -> Command {
        Command::new(name).args(args.iter().map(|a| a.as_bytes()))
    }

    #[tokio::test]
    async fn watched_key_change_aborts_exec() {
        let store = EmbeddedStore::new();
        let mut watcher = store.connect();
        let mut writer = store.connect();

        watcher.execute(&cmd("WATCH", &["balance"])).await.expect("watch");
        writer.execute(&cmd("SET", &["balance", "10"])).await.expect("set");

        let reply = watcher
            .execute_transaction(&[cmd("SET", &["balance", "20"])])
            .await
            .expect("exec");
        assert_eq!(reply, TransactionReply::Aborted);
        assert_eq!(store.execute(&cmd("GET", &["balance"])), Value::bulk("10"));

        // the watch list is gone after EXEC
        let reply = watcher
            .execute_transaction(&[cmd("SET", &["balance", "20"])])
            .await
            .expect("exec");
        assert_eq!(reply, TransactionReply::Committed(vec![Value::ok()]));
    }

    #[tokio::test]
    async fn unknown_command_discards_the_transaction() {
        let store = EmbeddedStore::new();
        let mut conn = store.connect();
        let err = conn
            .execute_transaction(&[cmd("SET", &["k", "v"]), cmd("NOPE", &[])])
            .await
            .unwrap_err();
        assert_eq!(err.server_error().map(|e| e.code.as_str()), Some("EXECABORT"));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn script_cache_answers_noscript_for_unknown_digests() {
        let store = EmbeddedStore::new();
        let mut conn = store.connect();
        let sha = conn
            .execute(&cmd("SCRIPT", &["LOAD", "return 1"]))
            .await
            .expect("load");
        let sha = sha.as_bytes().map(<[u8]>::to_vec).expect("digest");
        assert_eq!(sha.len(), 40);

        let exists = conn
            .execute(&Command::new("SCRIPT").arg("EXISTS").arg(&sha).arg("ffff"))
            .await
            .expect("exists");
        assert_eq!(exists, Value::Array(vec![Value::Int(1), Value::Int(0)]));

        let missing = conn
            .execute(&cmd("EVALSHA", &["0000000000000000000000000000000000000000", "0"]))
            .await
            .expect("evalsha");
        assert!(missing.as_error().is_some_and(ServerError::is_no_script));
    }

    #[tokio::test]
    async fn publish_counts_subscribers() {
        let store = EmbeddedStore::new();
        let mut subscriber = store.connect();
        let (sink, mut rx) = MessageSink::channel();
        subscriber
            .subscribe(&[b"news".to_vec()], &sink)
            .await
            .expect("subscribe");

        let count = store.execute(&cmd("PUBLISH", &["news", "hi"]));
        assert_eq!(count, Value::Int(1));
        assert_eq!(rx.recv().await.map(|(_, m)| m.payload), Some(b"hi".to_vec()));

        drop(subscriber);
        assert_eq!(store.execute(&cmd("PUBLISH", &["news", "hi"])), Value::Int(0));
    }
}
