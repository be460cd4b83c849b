mod common;

use std::collections::HashSet;

use valkey_middleware::prelude::*;

#[tokio::test]
async fn scan_visits_every_matching_key() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let keys: Vec<String> = (0..25)
            .map(|i| common::key(&pool, "scan", &format!("k{i}")))
            .collect();
        let other = common::key(&pool, "scan_other", "k");
        let mut conn = pool.get_connection().await?;
        for k in &keys {
            conn.set(k, "v").await?;
        }
        conn.set(&other, "v").await?;

        let pattern = common::key(&pool, "scan", "*");
        let mut cursor = conn.scan(ScanOptions::new().pattern(&pattern).count(4))?;
        let seen: HashSet<Vec<u8>> = cursor.collect_remaining().await?.into_iter().collect();
        assert_eq!(cursor.token(), 0);
        assert!(!cursor.has_next().await?);
        drop(cursor);

        let expected: HashSet<Vec<u8>> = keys.iter().map(|k| k.as_bytes().to_vec()).collect();
        assert_eq!(seen, expected, "driver {}", pool.driver_type);

        let mut all: Vec<&str> = keys.iter().map(String::as_str).collect();
        all.push(other.as_str());
        common::clear_keys(&mut conn, &all).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn container_scans_return_their_items() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let h = common::key(&pool, "cscan", "h");
        let s = common::key(&pool, "cscan", "s");
        let z = common::key(&pool, "cscan", "z");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[h.as_str(), s.as_str(), z.as_str()]).await?;

        conn.hset_multiple(&h, &[("f1", "a"), ("f2", "b"), ("g1", "c")]).await?;
        conn.sadd(&s, &["m1", "m2", "m3"]).await?;
        conn.zadd(&z, &[(1.0, "low"), (2.0, "high")]).await?;

        let mut fields = conn
            .hscan(&h, ScanOptions::new().pattern("f*"))?
            .collect_remaining()
            .await?;
        fields.sort();
        assert_eq!(
            fields,
            vec![
                (b"f1".to_vec(), b"a".to_vec()),
                (b"f2".to_vec(), b"b".to_vec()),
            ]
        );

        let members: HashSet<Vec<u8>> = conn
            .sscan(&s, ScanOptions::new().count(1))?
            .collect_remaining()
            .await?
            .into_iter()
            .collect();
        assert_eq!(members.len(), 3);

        let mut scored = conn.zscan(&z, ScanOptions::new())?.collect_remaining().await?;
        scored.sort_by(|a, b| a.1.total_cmp(&b.1));
        assert_eq!(scored, vec![(b"low".to_vec(), 1.0), (b"high".to_vec(), 2.0)]);

        let missing = common::key(&pool, "cscan", "missing");
        assert!(conn.sscan(&missing, ScanOptions::new())?.next().await?.is_none());

        common::clear_keys(&mut conn, &[h.as_str(), s.as_str(), z.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn closed_cursor_refuses_until_restarted() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;
    conn.sadd("members", &["a", "b", "c", "d"]).await?;

    let mut cursor = conn.sscan("members", ScanOptions::new().count(2))?;
    assert!(cursor.next().await?.is_some());
    cursor.close();
    assert!(cursor.is_closed());
    let err = cursor.next().await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    cursor.restart();
    assert!(!cursor.is_closed());
    assert_eq!(cursor.token(), 0);
    assert_eq!(cursor.collect_remaining().await?.len(), 4);
    assert!(cursor.next().await?.is_none());
    drop(cursor);

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn scan_options_are_checked() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;

    let err = conn.scan(ScanOptions::new().count(0)).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);

    conn.open_pipeline()?;
    let err = conn.hscan("h", ScanOptions::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    conn.close_pipeline().await?;

    conn.multi()?;
    let err = conn.zscan("z", ScanOptions::new()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
    conn.discard().await?;

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn wrong_type_surfaces_from_the_cursor() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;
    conn.set("plain", "v").await?;

    let err = conn
        .hscan("plain", ScanOptions::new())?
        .collect_remaining()
        .await
        .unwrap_err();
    assert!(err.server_error().is_some_and(|e| e.is_wrong_type()));

    conn.close().await;
    Ok(())
}
