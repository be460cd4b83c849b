mod common;

use valkey_middleware::prelude::*;

fn is_state_error(result: Result<(), ValkeyMiddlewareError>) -> bool {
    matches!(result, Err(ValkeyMiddlewareError::InvalidState(_)))
}

#[tokio::test]
async fn only_one_batch_mode_at_a_time() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;

    conn.open_pipeline()?;
    assert!(is_state_error(conn.open_pipeline()));
    assert!(is_state_error(conn.multi()));
    assert!(matches!(
        conn.exec().await,
        Err(ValkeyMiddlewareError::InvalidState(_))
    ));
    assert!(is_state_error(conn.discard().await));
    // the pipeline survived the rejected calls
    assert_eq!(conn.mode(), ExecutionMode::Pipelined);
    conn.close_pipeline().await?;

    conn.multi()?;
    assert_eq!(conn.mode(), ExecutionMode::Transactional);
    assert!(is_state_error(conn.multi()));
    assert!(is_state_error(conn.open_pipeline()));
    assert!(matches!(
        conn.close_pipeline().await,
        Err(ValkeyMiddlewareError::InvalidState(_))
    ));
    conn.discard().await?;
    assert_eq!(conn.mode(), ExecutionMode::Immediate);

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn closing_without_opening_is_a_state_error() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;
    assert!(matches!(
        conn.close_pipeline().await,
        Err(ValkeyMiddlewareError::InvalidState(_))
    ));
    assert!(matches!(
        conn.exec().await,
        Err(ValkeyMiddlewareError::InvalidState(_))
    ));
    assert!(is_state_error(conn.discard().await));
    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn connection_scoped_calls_need_immediate_mode() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;

    conn.multi()?;
    assert!(is_state_error(conn.watch(&["k"]).await));
    assert!(is_state_error(conn.unwatch().await));
    assert!(matches!(
        conn.scan(ScanOptions::new()).map(|_| ()),
        Err(ValkeyMiddlewareError::InvalidState(_))
    ));
    let (listener, _inbox) = message_channel();
    assert!(is_state_error(conn.subscribe(listener, &["news"]).await));
    conn.discard().await?;

    conn.open_pipeline()?;
    assert!(matches!(
        conn.interact_sync(|_| Ok(())).await,
        Err(ValkeyMiddlewareError::InvalidState(_))
    ));
    conn.close_pipeline().await?;

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn queued_positions_count_from_zero() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;

    conn.multi()?;
    let first = conn.set("pos", "a").await?;
    let second = conn.append("pos", "b").await?;
    let third = conn.get("pos").await?;
    assert_eq!(first.position(), Some(0));
    assert_eq!(second.position(), Some(1));
    assert_eq!(third.position(), Some(2));
    assert!(third.into_ready().is_err());

    let outcome = conn.exec().await?;
    let replies = outcome.into_replies().unwrap_or_default();
    assert_eq!(replies[2], Reply::Bytes(b"ab".to_vec()));

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn argument_errors_are_raised_before_queueing() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;
    let nothing: [&str; 0] = [];

    conn.open_pipeline()?;
    assert!(matches!(
        conn.del(&nothing).await,
        Err(ValkeyMiddlewareError::InvalidArgument(_))
    ));
    assert!(matches!(
        conn.execute("MULTI", &nothing).await,
        Err(ValkeyMiddlewareError::InvalidArgument(_))
    ));
    assert!(matches!(
        conn.zadd("z", &[(f64::NAN, "m")]).await,
        Err(ValkeyMiddlewareError::InvalidArgument(_))
    ));
    assert_eq!(conn.queued(), 0);
    assert!(conn.close_pipeline().await?.is_empty());

    conn.close().await;
    Ok(())
}
