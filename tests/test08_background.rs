mod common;

use std::time::Duration;

use valkey_middleware::prelude::*;
use valkey_middleware::{Command, HandleState};

#[tokio::test]
async fn submitted_command_is_waited_on() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let k = common::key(&pool, "submit", "k");
        let mut handle = pool.submit(Command::new("INCRBY").arg(&k).arg("41"));
        let reply = handle.wait(Duration::from_secs(5)).await?;
        assert_eq!(reply, Some(Reply::Raw(Value::Int(41))));
        assert_eq!(handle.state(), HandleState::Ready);

        let err = handle.wait(Duration::from_secs(1)).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::State);

        let mut conn = pool.get_connection().await?;
        assert_eq!(conn.get(&k).await?.into_ready()?, Some(b"41".to_vec()));
        common::clear_keys(&mut conn, &[k.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn submitted_failure_comes_back_as_error() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(2).await?;
    let mut handle = pool.submit(Command::new("NOSUCHCOMMAND"));
    let err = handle.wait(Duration::from_secs(5)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);
    assert_eq!(handle.state(), HandleState::Failed);
    Ok(())
}

#[tokio::test]
async fn submissions_queue_behind_a_busy_pool() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let held = pool.get_connection().await?;

    let mut handle = pool.submit(Command::new("PING"));
    assert_eq!(handle.wait(Duration::from_millis(20)).await?, None);
    assert_eq!(handle.state(), HandleState::Pending);

    held.close().await;
    let reply = handle.wait(Duration::from_secs(5)).await?;
    assert_eq!(reply, Some(Reply::Raw(Value::Status("PONG".into()))));

    // the background connection was handed back
    assert_eq!(pool.pool_status().idle, 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_submission_cannot_be_waited_on() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let held = pool.get_connection().await?;

    let mut handle = pool.submit(Command::new("PING"));
    assert!(handle.cancel());
    assert_eq!(handle.state(), HandleState::Cancelled);
    assert!(!handle.cancel());
    let err = handle.wait(Duration::from_millis(20)).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    held.close().await;
    Ok(())
}

#[tokio::test]
async fn interact_reaches_the_embedded_store() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;
    conn.mset(&[("a", "1"), ("b", "2")]).await?;

    let size = conn
        .interact_async(|wrapper| {
            Box::pin(async move {
                match wrapper {
                    AnyConnWrapper::Embedded(store) => Ok(store.len()),
                    #[allow(unreachable_patterns)]
                    _ => Err(ValkeyMiddlewareError::Unimplemented("not embedded".into())),
                }
            })
        })
        .await?;
    assert_eq!(size, 2);

    let reply = conn
        .interact_sync(|wrapper| match wrapper {
            AnyConnWrapper::Embedded(store) => Ok(store.execute(&Command::new("GET").arg("b"))),
            #[allow(unreachable_patterns)]
            _ => Err(ValkeyMiddlewareError::Unimplemented("not embedded".into())),
        })
        .await?;
    assert_eq!(reply, Value::bulk("2"));

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn interact_needs_an_idle_connection() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;

    conn.open_pipeline()?;
    let err = conn
        .interact_sync(|_wrapper| Ok::<_, ValkeyMiddlewareError>(()))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    conn.close_pipeline().await?;

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn interact_hands_out_the_native_connection() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::network_pools().await? {
        let mut conn = pool.get_connection().await?;
        let pong: String = match pool.driver_type {
            DriverType::Multiplexed => {
                conn.interact_async(|wrapper| {
                    Box::pin(async move {
                        match wrapper {
                            AnyConnWrapper::Multiplexed(native) => redis::cmd("PING")
                                .query_async(native)
                                .await
                                .map_err(|e| ValkeyMiddlewareError::ConnectionError(e.to_string())),
                            _ => Err(ValkeyMiddlewareError::Unimplemented("wrong driver".into())),
                        }
                    })
                })
                .await?
            }
            _ => {
                conn.interact_sync(|wrapper| match wrapper {
                    AnyConnWrapper::Blocking(native) => redis::cmd("PING")
                        .query(native)
                        .map_err(|e| ValkeyMiddlewareError::ConnectionError(e.to_string())),
                    _ => Err(ValkeyMiddlewareError::Unimplemented("wrong driver".into())),
                })
                .await?
            }
        };
        assert_eq!(pong, "PONG");
        conn.close().await;
    }
    Ok(())
}
