//! Driver over one redis-rs `MultiplexedConnection`.
//!
//! Commands are written to the shared socket as soon as they are issued and
//! replies are matched in order, so a pipeline is just every command of the
//! batch in flight at once.

mod config;
mod pubsub;

use async_trait::async_trait;
use futures_util::future::join_all;
use redis::aio::MultiplexedConnection;

use crate::command::Command;
use crate::driver::{DriverAdapter, MessageSink, SubscribeVerb, TransactionReply, exec_reply};
use crate::error::ValkeyMiddlewareError;
use crate::results::{Value, from_redis_result};
use crate::types::DriverType;

use pubsub::PubSubLink;

pub(crate) struct MultiplexedDriver {
    client: redis::Client,
    conn: MultiplexedConnection,
    /// Opened by the first subscribe and kept until the slot is dropped.
    pubsub: Option<PubSubLink>,
}

impl MultiplexedDriver {
    pub(crate) async fn connect(client: redis::Client) -> Result<Self, ValkeyMiddlewareError> {
        let conn = client.get_multiplexed_async_connection().await?;
        Ok(Self {
            client,
            conn,
            pubsub: None,
        })
    }

    pub(crate) fn connection_mut(&mut self) -> &mut MultiplexedConnection {
        &mut self.conn
    }

    async fn send(&mut self, command: &Command) -> Result<Value, ValkeyMiddlewareError> {
        let reply: redis::RedisResult<redis::Value> =
            command.to_redis().query_async(&mut self.conn).await;
        from_redis_result(reply)
    }

    /// Issue every command at once and collect the replies positionally.
    async fn send_all(&self, commands: &[Command]) -> Result<Vec<Value>, ValkeyMiddlewareError> {
        let in_flight = commands.iter().map(|command| {
            let mut conn = self.conn.clone();
            let cmd = command.to_redis();
            async move {
                let reply: redis::RedisResult<redis::Value> = cmd.query_async(&mut conn).await;
                reply
            }
        });
        join_all(in_flight)
            .await
            .into_iter()
            .map(from_redis_result)
            .collect()
    }

    async fn link(&mut self, sink: &MessageSink) -> Result<&mut PubSubLink, ValkeyMiddlewareError> {
        if self.pubsub.is_none() {
            self.pubsub = Some(PubSubLink::open(&self.client, sink.clone()).await?);
        }
        self.pubsub.as_mut().ok_or_else(|| {
            ValkeyMiddlewareError::ConnectionError("pub/sub link unavailable".into())
        })
    }
}

#[async_trait]
impl DriverAdapter for MultiplexedDriver {
    fn driver_type(&self) -> DriverType {
        DriverType::Multiplexed
    }

    async fn execute(&mut self, command: &Command) -> Result<Value, ValkeyMiddlewareError> {
        self.send(command).await
    }

    async fn execute_pipeline(
        &mut self,
        commands: &[Command],
    ) -> Result<Vec<Value>, ValkeyMiddlewareError> {
        self.send_all(commands).await
    }

    async fn execute_transaction(
        &mut self,
        commands: &[Command],
    ) -> Result<TransactionReply, ValkeyMiddlewareError> {
        if let Value::Error(err) = self.send(&Command::new("MULTI")).await? {
            return Err(ValkeyMiddlewareError::Backend(err));
        }
        // A command rejected while queueing makes EXEC answer EXECABORT
        self.send_all(commands).await?;
        exec_reply(self.send(&Command::new("EXEC")).await?)
    }

    async fn subscribe(
        &mut self,
        channels: &[Vec<u8>],
        sink: &MessageSink,
    ) -> Result<(), ValkeyMiddlewareError> {
        self.link(sink)
            .await?
            .send(SubscribeVerb::Subscribe, channels)
            .await
    }

    async fn psubscribe(
        &mut self,
        patterns: &[Vec<u8>],
        sink: &MessageSink,
    ) -> Result<(), ValkeyMiddlewareError> {
        self.link(sink)
            .await?
            .send(SubscribeVerb::PSubscribe, patterns)
            .await
    }

    async fn unsubscribe(&mut self, channels: &[Vec<u8>]) -> Result<(), ValkeyMiddlewareError> {
        match self.pubsub.as_mut() {
            Some(link) => link.send(SubscribeVerb::Unsubscribe, channels).await,
            None => Ok(()),
        }
    }

    async fn punsubscribe(&mut self, patterns: &[Vec<u8>]) -> Result<(), ValkeyMiddlewareError> {
        match self.pubsub.as_mut() {
            Some(link) => link.send(SubscribeVerb::PUnsubscribe, patterns).await,
            None => Ok(()),
        }
    }
}
