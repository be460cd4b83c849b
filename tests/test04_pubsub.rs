mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use valkey_middleware::prelude::*;

const WAIT: Duration = Duration::from_secs(2);

#[derive(Default)]
struct Counting {
    messages: AtomicUsize,
    subscribed: AtomicUsize,
    unsubscribed: AtomicUsize,
}

impl MessageListener for Counting {
    fn on_message(&self, _message: &Message) {
        self.messages.fetch_add(1, Ordering::SeqCst);
    }

    fn on_subscribed(&self, _target: &[u8], _kind: SubscriptionKind, _count: usize) {
        self.subscribed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_unsubscribed(&self, _target: &[u8], _kind: SubscriptionKind, _count: usize) {
        self.unsubscribed.fetch_add(1, Ordering::SeqCst);
    }
}

#[tokio::test]
async fn published_messages_reach_the_listener() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let channel = common::key(&pool, "deliver", "news");
        let mut subscriber = pool.get_connection().await?;
        let mut publisher = pool.get_connection().await?;

        let (listener, mut inbox) = message_channel();
        subscriber.subscribe(listener, &[channel.as_str()]).await?;
        assert!(subscriber.is_subscribed());

        let receivers = publisher.publish(&channel, "hello").await?.into_ready()?;
        assert_eq!(receivers, 1, "driver {}", pool.driver_type);

        let message = inbox
            .recv_timeout(WAIT)
            .await
            .ok_or_else(|| ValkeyMiddlewareError::Timeout("no message delivered".into()))?;
        assert_eq!(message.channel, channel.as_bytes());
        assert_eq!(message.payload, b"hello");
        assert_eq!(message.pattern, None);

        subscriber.close().await;
        publisher.close().await;
        assert_eq!(pool.pool_status().subscribed, 0);
    }
    Ok(())
}

#[tokio::test]
async fn pattern_messages_carry_the_pattern() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let prefix = common::key(&pool, "pattern", "events");
        let pattern = format!("{prefix}.*");
        let channel = format!("{prefix}.login");
        let mut subscriber = pool.get_connection().await?;
        let mut publisher = pool.get_connection().await?;

        let (listener, mut inbox) = message_channel();
        subscriber.psubscribe(listener, &[pattern.as_str()]).await?;
        publisher.publish(&channel, "bob").await?;

        let message = inbox
            .recv_timeout(WAIT)
            .await
            .ok_or_else(|| ValkeyMiddlewareError::Timeout("no message delivered".into()))?;
        assert_eq!(message.channel, channel.as_bytes());
        assert_eq!(message.pattern.as_deref(), Some(pattern.as_bytes()));
        assert_eq!(message.payload_str(), "bob");

        subscriber.close().await;
        publisher.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn subscribed_connection_refuses_regular_commands() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(2).await?;
    let mut conn = pool.get_connection().await?;
    let (listener, _inbox) = message_channel();
    conn.subscribe(listener, &["alerts"]).await?;

    let err = conn.get("anything").await.unwrap_err();
    assert!(matches!(err, ValkeyMiddlewareError::Subscribed(_)));
    assert_eq!(err.kind(), ErrorKind::State);
    assert!(matches!(
        conn.publish("alerts", "x").await,
        Err(ValkeyMiddlewareError::Subscribed(_))
    ));
    assert!(matches!(
        conn.open_pipeline(),
        Err(ValkeyMiddlewareError::Subscribed(_))
    ));
    assert!(matches!(
        conn.multi(),
        Err(ValkeyMiddlewareError::Subscribed(_))
    ));

    let nothing: [&str; 0] = [];
    conn.unsubscribe(&nothing).await?;
    assert!(!conn.is_subscribed());
    conn.set("anything", "ok").await?;

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn listener_sees_subscription_lifecycle() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(2).await?;
    let mut subscriber = pool.get_connection().await?;
    let mut publisher = pool.get_connection().await?;
    let listener = Arc::new(Counting::default());

    subscriber
        .subscribe(listener.clone(), &["a", "b"])
        .await?;
    subscriber.psubscribe(listener.clone(), &["c*"]).await?;
    assert_eq!(listener.subscribed.load(Ordering::SeqCst), 3);
    let info = subscriber.subscription_info().unwrap_or_default();
    assert_eq!(info.channels, vec![b"a".to_vec(), b"b".to_vec()]);
    assert_eq!(info.patterns, vec![b"c*".to_vec()]);
    assert_eq!(info.count(), 3);

    publisher.publish("a", "1").await?;
    publisher.publish("cat", "2").await?;
    publisher.publish("zebra", "3").await?;
    tokio::time::timeout(WAIT, async {
        while listener.messages.load(Ordering::SeqCst) < 2 {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .map_err(|_| ValkeyMiddlewareError::Timeout("messages not delivered".into()))?;

    subscriber.unsubscribe(&["a"]).await?;
    assert_eq!(listener.unsubscribed.load(Ordering::SeqCst), 1);
    assert!(subscriber.is_subscribed());

    // close removes the remaining channel and pattern
    subscriber.close().await;
    assert_eq!(listener.unsubscribed.load(Ordering::SeqCst), 3);
    assert_eq!(listener.messages.load(Ordering::SeqCst), 2);

    publisher.close().await;
    Ok(())
}

#[tokio::test]
async fn unsubscribed_channel_stops_delivering() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(2).await?;
    let mut subscriber = pool.get_connection().await?;
    let mut publisher = pool.get_connection().await?;
    let (listener, mut inbox) = message_channel();

    subscriber.subscribe(listener, &["ticks", "tocks"]).await?;
    subscriber.unsubscribe(&["ticks"]).await?;
    assert_eq!(publisher.publish("ticks", "lost").await?.into_ready()?, 0);
    publisher.publish("tocks", "kept").await?;

    let message = inbox
        .recv_timeout(WAIT)
        .await
        .ok_or_else(|| ValkeyMiddlewareError::Timeout("no message delivered".into()))?;
    assert_eq!(message.payload_str(), "kept");
    assert!(inbox.try_recv().is_none());

    subscriber.close().await;
    publisher.close().await;
    Ok(())
}
