//! Driver over a synchronous redis-rs connection owned by a worker thread.
//!
//! Every request is handed to the thread over a channel and answered on a
//! oneshot, so the async side never blocks. A batch runs its commands one
//! after the other on the worker.

mod config;
mod pubsub;
mod worker;

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;

use crate::command::Command;
use crate::driver::{DriverAdapter, MessageSink, SubscribeVerb, TransactionReply, exec_reply};
use crate::error::ValkeyMiddlewareError;
use crate::results::Value;
use crate::types::DriverType;

use pubsub::PubSubThread;
use worker::BlockingWorker;

static NEXT_WORKER: AtomicU64 = AtomicU64::new(1);

pub(crate) struct BlockingDriver {
    client: redis::Client,
    worker: BlockingWorker,
    number: u64,
    pubsub: Option<PubSubThread>,
}

impl BlockingDriver {
    pub(crate) async fn connect(client: redis::Client) -> Result<Self, ValkeyMiddlewareError> {
        let number = NEXT_WORKER.fetch_add(1, Ordering::Relaxed);
        let worker =
            BlockingWorker::spawn(client.clone(), format!("valkey-blocking-{number}")).await?;
        Ok(Self {
            client,
            worker,
            number,
            pubsub: None,
        })
    }

    /// Run synchronous redis-rs code against the worker-owned connection.
    pub(crate) async fn with_connection<F, R>(&self, func: F) -> Result<R, ValkeyMiddlewareError>
    where
        F: FnOnce(&mut redis::Connection) -> Result<R, ValkeyMiddlewareError> + Send + 'static,
        R: Send + 'static,
    {
        self.worker.with_connection(func).await
    }

    async fn link(&mut self, sink: &MessageSink) -> Result<&PubSubThread, ValkeyMiddlewareError> {
        if self.pubsub.is_none() {
            let thread = PubSubThread::spawn(
                self.client.clone(),
                format!("valkey-pubsub-{}", self.number),
                sink.clone(),
            )
            .await?;
            self.pubsub = Some(thread);
        }
        self.pubsub.as_ref().ok_or_else(|| {
            ValkeyMiddlewareError::ConnectionError("pub/sub thread unavailable".into())
        })
    }

    async fn release(
        &self,
        verb: SubscribeVerb,
        targets: &[Vec<u8>],
    ) -> Result<(), ValkeyMiddlewareError> {
        match &self.pubsub {
            Some(thread) => thread.send(verb, targets).await,
            None => Ok(()),
        }
    }
}

#[async_trait]
impl DriverAdapter for BlockingDriver {
    fn driver_type(&self) -> DriverType {
        DriverType::Blocking
    }

    async fn execute(&mut self, command: &Command) -> Result<Value, ValkeyMiddlewareError> {
        self.worker.execute(command).await
    }

    async fn execute_pipeline(
        &mut self,
        commands: &[Command],
    ) -> Result<Vec<Value>, ValkeyMiddlewareError> {
        self.worker.batch(commands).await
    }

    async fn execute_transaction(
        &mut self,
        commands: &[Command],
    ) -> Result<TransactionReply, ValkeyMiddlewareError> {
        exec_reply(self.worker.transaction(commands).await?)
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
        self.release(SubscribeVerb::Unsubscribe, channels).await
    }

    async fn punsubscribe(&mut self, patterns: &[Vec<u8>]) -> Result<(), ValkeyMiddlewareError> {
        self.release(SubscribeVerb::PUnsubscribe, patterns).await
    }
}
