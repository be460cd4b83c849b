mod common;

use valkey_middleware::prelude::*;

#[tokio::test]
async fn exec_commits_every_queued_command() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let k = common::key(&pool, "commit", "k");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[k.as_str()]).await?;

        conn.multi()?;
        conn.set(&k, "5").await?;
        conn.incr_by(&k, 3).await?;
        conn.get(&k).await?;
        let outcome = conn.exec().await?;

        assert!(!outcome.is_aborted());
        assert_eq!(
            outcome.replies(),
            Some(&[Reply::Unit, Reply::Int(8), Reply::Bytes(b"8".to_vec())][..]),
            "driver {}",
            pool.driver_type
        );

        common::clear_keys(&mut conn, &[k.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn changed_watched_key_aborts() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let k = common::key(&pool, "watch", "balance");
        let mut first = pool.get_connection().await?;
        let mut second = pool.get_connection().await?;
        first.set(&k, "100").await?;

        first.watch(&[k.as_str()]).await?;
        second.set(&k, "50").await?;

        first.multi()?;
        first.set(&k, "0").await?;
        let outcome = first.exec().await?;
        assert_eq!(outcome, ExecOutcome::Aborted, "driver {}", pool.driver_type);
        assert_eq!(
            first.get(&k).await?.into_ready()?,
            Some(b"50".to_vec())
        );

        // the watch ended with EXEC, so a retry commits
        first.watch(&[k.as_str()]).await?;
        first.multi()?;
        first.set(&k, "0").await?;
        assert!(!first.exec().await?.is_aborted());

        common::clear_keys(&mut first, &[k.as_str()]).await?;
        first.close().await;
        second.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn empty_exec_is_committed_not_aborted() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;
    conn.multi()?;
    let outcome = conn.exec().await?;
    assert_eq!(outcome, ExecOutcome::Committed(Vec::new()));
    assert!(!outcome.is_aborted());
    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn empty_exec_still_honours_watch() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(2).await?;
    let mut first = pool.get_connection().await?;
    let mut second = pool.get_connection().await?;

    first.watch(&["guarded"]).await?;
    second.set("guarded", "x").await?;
    first.multi()?;
    assert!(first.exec().await?.is_aborted());

    first.close().await;
    second.close().await;
    Ok(())
}

#[tokio::test]
async fn discard_drops_queued_writes() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let k = common::key(&pool, "discard", "k");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[k.as_str()]).await?;

        conn.watch(&[k.as_str()]).await?;
        conn.multi()?;
        conn.set(&k, "never").await?;
        conn.discard().await?;

        assert_eq!(conn.mode(), ExecutionMode::Immediate);
        assert_eq!(conn.get(&k).await?.into_ready()?, None);
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn unknown_command_fails_the_whole_transaction() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let k = common::key(&pool, "execabort", "k");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[k.as_str()]).await?;
        let nothing: [&str; 0] = [];

        conn.multi()?;
        conn.set(&k, "1").await?;
        conn.execute("NOSUCHCOMMAND", &nothing).await?;
        let err = conn.exec().await.unwrap_err();
        assert_eq!(
            err.server_error().map(|e| e.code.as_str()),
            Some("EXECABORT"),
            "driver {}: {err}",
            pool.driver_type
        );
        assert_eq!(conn.mode(), ExecutionMode::Immediate);
        assert_eq!(conn.get(&k).await?.into_ready()?, None);

        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn wrong_arity_fails_the_whole_transaction() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let k = common::key(&pool, "execabort_arity", "k");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[k.as_str()]).await?;
        let nothing: [&str; 0] = [];

        conn.multi()?;
        conn.set(&k, "1").await?;
        conn.execute("GET", &nothing).await?;
        let err = conn.exec().await.unwrap_err();
        assert_eq!(
            err.server_error().map(|e| e.code.as_str()),
            Some("EXECABORT"),
            "driver {}: {err}",
            pool.driver_type
        );
        assert_eq!(conn.get(&k).await?.into_ready()?, None, "driver {}", pool.driver_type);

        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn runtime_errors_inside_exec_keep_their_slot() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;
    conn.set("word", "hello").await?;

    conn.multi()?;
    conn.incr("word").await?;
    conn.append("word", "!").await?;
    let replies = conn.exec().await?.into_replies().unwrap_or_default();

    assert_eq!(replies.len(), 2);
    assert!(replies[0].is_error());
    assert_eq!(replies[1], Reply::Int(6));
    conn.close().await;
    Ok(())
}
