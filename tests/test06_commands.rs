mod common;

use std::collections::HashSet;
use std::time::Duration;

use valkey_middleware::prelude::*;
use valkey_middleware::types::{Expiration, StreamEntry};

fn set_of(items: &[&str]) -> HashSet<Vec<u8>> {
    items.iter().map(|s| s.as_bytes().to_vec()).collect()
}

#[tokio::test]
async fn string_family() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let a = common::key(&pool, "strings", "a");
        let b = common::key(&pool, "strings", "b");
        let n = common::key(&pool, "strings", "n");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[a.as_str(), b.as_str(), n.as_str()]).await?;

        assert_eq!(conn.get(&a).await?.into_ready()?, None);
        conn.set(&a, "hello").await?;
        assert_eq!(conn.append(&a, " world").await?.into_ready()?, 11);
        assert_eq!(conn.strlen(&a).await?.into_ready()?, 11);
        assert_eq!(conn.get_range(&a, 0, 4).await?.into_ready()?, b"hello".to_vec());
        assert_eq!(conn.get_range(&a, -5, -1).await?.into_ready()?, b"world".to_vec());

        assert!(!conn.set_nx(&a, "again").await?.into_ready()?);
        assert_eq!(
            conn.get_set(&a, "replaced").await?.into_ready()?,
            Some(b"hello world".to_vec())
        );

        conn.mset(&[(b.as_str(), "2"), (n.as_str(), "10")]).await?;
        assert_eq!(
            conn.mget(&[a.as_str(), b.as_str(), "vm-test:missing"]).await?.into_ready()?,
            vec![Some(b"replaced".to_vec()), Some(b"2".to_vec()), None]
        );

        assert_eq!(conn.incr(&n).await?.into_ready()?, 11);
        assert_eq!(conn.decr(&n).await?.into_ready()?, 10);
        assert_eq!(conn.incr_by(&n, 5).await?.into_ready()?, 15);
        assert_eq!(conn.decr_by(&n, 20).await?.into_ready()?, -5);
        let float = conn.incr_by_float(&n, 0.5).await?.into_ready()?;
        assert!((float - -4.5).abs() < f64::EPSILON);

        assert_eq!(conn.get_del(&b).await?.into_ready()?, Some(b"2".to_vec()));
        assert_eq!(conn.exists(&[b.as_str()]).await?.into_ready()?, 0);

        common::clear_keys(&mut conn, &[a.as_str(), b.as_str(), n.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn set_with_conditions_and_expiry() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let k = common::key(&pool, "set_with", "k");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[k.as_str()]).await?;

        assert!(!conn.set_with(&k, "v", SetOptions::new().if_present()).await?.into_ready()?);
        assert!(conn.set_with(&k, "v", SetOptions::new().if_absent()).await?.into_ready()?);
        assert!(!conn.set_with(&k, "w", SetOptions::new().if_absent()).await?.into_ready()?);
        assert_eq!(conn.get(&k).await?.into_ready()?, Some(b"v".to_vec()));

        let options = SetOptions::new()
            .if_present()
            .expire(Expiration::from_duration(Duration::from_secs(100)));
        assert!(conn.set_with(&k, "w", options).await?.into_ready()?);
        let ttl = conn.ttl(&k).await?.into_ready()?;
        assert!((1..=100).contains(&ttl), "ttl {ttl}");

        let zero = SetOptions::new().expire(Expiration::Seconds(0));
        let err = conn.set_with(&k, "x", zero).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        common::clear_keys(&mut conn, &[k.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn key_family() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let k = common::key(&pool, "keys", "k");
        let moved = common::key(&pool, "keys", "moved");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[k.as_str(), moved.as_str()]).await?;

        assert_eq!(conn.key_type(&k).await?.into_ready()?, "none");
        assert_eq!(conn.ttl(&k).await?.into_ready()?, -2);

        conn.rpush(&k, &["a"]).await?;
        assert_eq!(conn.key_type(&k).await?.into_ready()?, "list");
        assert_eq!(conn.ttl(&k).await?.into_ready()?, -1);
        assert!(conn.expire(&k, 50).await?.into_ready()?);
        assert!(conn.pttl(&k).await?.into_ready()? > 0);
        assert!(conn.persist(&k).await?.into_ready()?);
        assert_eq!(conn.ttl(&k).await?.into_ready()?, -1);
        assert!(conn.pexpire(&k, 60_000).await?.into_ready()?);

        conn.rename(&k, &moved).await?;
        assert_eq!(conn.exists(&[k.as_str(), moved.as_str()]).await?.into_ready()?, 1);
        let pattern = common::key(&pool, "keys", "mov*");
        assert_eq!(
            conn.keys(&pattern).await?.into_ready()?,
            vec![moved.as_bytes().to_vec()]
        );

        let err = conn.rename(&k, &moved).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);

        assert_eq!(conn.del(&[k.as_str(), moved.as_str()]).await?.into_ready()?, 1);
        let err = conn.del::<&str>(&[]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn hash_family() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let h = common::key(&pool, "hashes", "h");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[h.as_str()]).await?;

        assert!(conn.hset(&h, "name", "alice").await?.into_ready()?);
        assert!(!conn.hset(&h, "name", "bob").await?.into_ready()?);
        assert_eq!(
            conn.hset_multiple(&h, &[("age", "30"), ("city", "paris")]).await?.into_ready()?,
            2
        );
        assert!(!conn.hset_nx(&h, "age", "31").await?.into_ready()?);
        assert_eq!(conn.hget(&h, "name").await?.into_ready()?, Some(b"bob".to_vec()));
        assert_eq!(
            conn.hmget(&h, &["age", "zip"]).await?.into_ready()?,
            vec![Some(b"30".to_vec()), None]
        );
        assert_eq!(conn.hincr_by(&h, "age", 2).await?.into_ready()?, 32);
        assert!(conn.hexists(&h, "city").await?.into_ready()?);
        assert_eq!(conn.hlen(&h).await?.into_ready()?, 3);

        let mut all = conn.hgetall(&h).await?.into_ready()?;
        all.sort();
        assert_eq!(
            all,
            vec![
                (b"age".to_vec(), b"32".to_vec()),
                (b"city".to_vec(), b"paris".to_vec()),
                (b"name".to_vec(), b"bob".to_vec()),
            ]
        );
        let mut fields = conn.hkeys(&h).await?.into_ready()?;
        fields.sort();
        assert_eq!(fields, vec![b"age".to_vec(), b"city".to_vec(), b"name".to_vec()]);
        assert_eq!(conn.hvals(&h).await?.into_ready()?.len(), 3);

        assert_eq!(conn.hdel(&h, &["city", "zip"]).await?.into_ready()?, 1);

        common::clear_keys(&mut conn, &[h.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn list_family() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let l = common::key(&pool, "lists", "l");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[l.as_str()]).await?;

        assert_eq!(conn.rpush(&l, &["b", "c"]).await?.into_ready()?, 2);
        assert_eq!(conn.lpush(&l, &["a"]).await?.into_ready()?, 3);
        assert_eq!(
            conn.lrange(&l, 0, -1).await?.into_ready()?,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        assert_eq!(conn.llen(&l).await?.into_ready()?, 3);
        assert_eq!(conn.lindex(&l, -1).await?.into_ready()?, Some(b"c".to_vec()));
        assert_eq!(conn.lindex(&l, 10).await?.into_ready()?, None);

        conn.lset(&l, 1, "B").await?;
        let err = conn.lset(&l, 10, "x").await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);

        conn.rpush(&l, &["a", "a"]).await?;
        assert_eq!(conn.lrem(&l, 0, "a").await?.into_ready()?, 3);
        conn.ltrim(&l, 0, 0).await?;
        assert_eq!(conn.lrange(&l, 0, -1).await?.into_ready()?, vec![b"B".to_vec()]);
        assert_eq!(conn.lpop(&l).await?.into_ready()?, Some(b"B".to_vec()));
        assert_eq!(conn.rpop(&l).await?.into_ready()?, None);
        assert_eq!(conn.exists(&[l.as_str()]).await?.into_ready()?, 0);

        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn set_family() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let x = common::key(&pool, "sets", "x");
        let y = common::key(&pool, "sets", "y");
        let dest = common::key(&pool, "sets", "dest");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[x.as_str(), y.as_str(), dest.as_str()]).await?;

        assert_eq!(conn.sadd(&x, &["a", "b", "c", "a"]).await?.into_ready()?, 3);
        conn.sadd(&y, &["b", "c", "d"]).await?;

        assert!(conn.sismember(&x, "a").await?.into_ready()?);
        assert_eq!(
            conn.smismember(&x, &["a", "z"]).await?.into_ready()?,
            vec![true, false]
        );
        assert_eq!(conn.sdiff(&[x.as_str(), y.as_str()]).await?.into_ready()?, set_of(&["a"]));
        assert_eq!(
            conn.sinter(&[x.as_str(), y.as_str()]).await?.into_ready()?,
            set_of(&["b", "c"])
        );
        assert_eq!(
            conn.sunion(&[x.as_str(), y.as_str()]).await?.into_ready()?,
            set_of(&["a", "b", "c", "d"])
        );
        assert_eq!(
            conn.sinter_store(&dest, &[x.as_str(), y.as_str()]).await?.into_ready()?,
            2
        );
        assert_eq!(conn.smembers(&dest).await?.into_ready()?, set_of(&["b", "c"]));
        assert_eq!(conn.sunion_store(&dest, &[x.as_str(), y.as_str()]).await?.into_ready()?, 4);
        assert_eq!(conn.sdiff_store(&dest, &[x.as_str(), y.as_str()]).await?.into_ready()?, 1);

        assert!(conn.smove(&x, &dest, "b").await?.into_ready()?);
        assert!(!conn.smove(&x, &dest, "zzz").await?.into_ready()?);
        assert_eq!(conn.srem(&x, &["c", "zzz"]).await?.into_ready()?, 1);
        assert_eq!(conn.scard(&x).await?.into_ready()?, 1);

        common::clear_keys(&mut conn, &[x.as_str(), y.as_str(), dest.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn random_members_and_pops() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let s = common::key(&pool, "random", "s");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[s.as_str()]).await?;

        assert_eq!(conn.srandmember(&s).await?.into_ready()?, None);
        conn.sadd(&s, &["only"]).await?;

        let repeated = conn.srandmember_count(&s, -5).await?.into_ready()?;
        assert_eq!(repeated.len(), 5);
        assert!(repeated.iter().all(|m| m == b"only"));
        assert_eq!(conn.srandmember_count(&s, 5).await?.into_ready()?.len(), 1);

        conn.sadd(&s, &["two", "three"]).await?;
        assert_eq!(conn.spop_count(&s, 2).await?.into_ready()?.len(), 2);
        assert!(conn.spop(&s).await?.into_ready()?.is_some());
        assert_eq!(conn.scard(&s).await?.into_ready()?, 0);

        let err = conn.spop_count(&s, -1).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn sorted_set_family() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let z = common::key(&pool, "zsets", "z");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[z.as_str()]).await?;

        assert_eq!(
            conn.zadd(&z, &[(1.0, "a"), (2.0, "b"), (3.0, "c")]).await?.into_ready()?,
            3
        );
        assert_eq!(conn.zadd(&z, &[(4.0, "c")]).await?.into_ready()?, 0);
        assert_eq!(conn.zincr_by(&z, 0.5, "a").await?.into_ready()?, 1.5);
        assert_eq!(conn.zscore(&z, "c").await?.into_ready()?, Some(4.0));
        assert_eq!(conn.zscore(&z, "nope").await?.into_ready()?, None);
        assert_eq!(conn.zcard(&z).await?.into_ready()?, 3);
        assert_eq!(conn.zcount(&z, 1.5, 2.0).await?.into_ready()?, 2);
        assert_eq!(
            conn.zcount(&z, ScoreBound::Exclusive(1.5), f64::INFINITY).await?.into_ready()?,
            2
        );
        assert_eq!(conn.zrank(&z, "b").await?.into_ready()?, Some(1));
        assert_eq!(conn.zrevrank(&z, "b").await?.into_ready()?, Some(1));
        assert_eq!(conn.zrank(&z, "nope").await?.into_ready()?, None);

        assert_eq!(
            conn.zrange(&z, 0, -1).await?.into_ready()?,
            vec![b"a".to_vec(), b"b".to_vec(), b"c".to_vec()]
        );
        assert_eq!(
            conn.zrevrange(&z, 0, 0).await?.into_ready()?,
            vec![b"c".to_vec()]
        );
        assert_eq!(
            conn.zrange_with_scores(&z, 0, 1).await?.into_ready()?,
            vec![(b"a".to_vec(), 1.5), (b"b".to_vec(), 2.0)]
        );
        assert_eq!(
            conn.zrange_by_score(&z, 2.0, f64::INFINITY).await?.into_ready()?,
            vec![b"b".to_vec(), b"c".to_vec()]
        );
        assert_eq!(
            conn.zrange_by_score_limit(&z, f64::NEG_INFINITY, f64::INFINITY, 1, 1)
                .await?
                .into_ready()?,
            vec![b"b".to_vec()]
        );
        assert_eq!(conn.zrem(&z, &["a", "nope"]).await?.into_ready()?, 1);

        let err = conn.zadd(&z, &[(f64::NAN, "x")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        common::clear_keys(&mut conn, &[z.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn stream_family() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::all_pools().await? {
        let s = common::key(&pool, "streams", "s");
        let mut conn = pool.get_connection().await?;
        common::clear_keys(&mut conn, &[s.as_str()]).await?;

        let first = StreamId::Explicit("1-1".into());
        assert_eq!(
            conn.xadd(&s, &first, &[("temp", "20")]).await?.into_ready()?,
            "1-1"
        );
        let second = conn
            .xadd(&s, &StreamId::Auto, &[("temp", "21"), ("unit", "c")])
            .await?
            .into_ready()?;
        assert_ne!(second, "1-1");

        let err = conn.xadd(&s, &first, &[("temp", "0")]).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Backend);

        assert_eq!(conn.xlen(&s).await?.into_ready()?, 2);
        let entries = conn.xrange(&s, "-", "+", None).await?.into_ready()?;
        assert_eq!(
            entries[0],
            StreamEntry {
                id: "1-1".into(),
                fields: vec![(b"temp".to_vec(), b"20".to_vec())],
            }
        );
        assert_eq!(entries[1].id, second);
        assert_eq!(entries[1].fields.len(), 2);

        let newest = conn.xrevrange(&s, "+", "-", Some(1)).await?.into_ready()?;
        assert_eq!(newest.len(), 1);
        assert_eq!(newest[0].id, second);

        conn.xadd_maxlen(&s, 2, &StreamId::Auto, &[("temp", "22")]).await?;
        assert_eq!(conn.xlen(&s).await?.into_ready()?, 2);
        assert_eq!(conn.xdel(&s, &[second.as_str()]).await?.into_ready()?, 1);
        assert_eq!(conn.xtrim(&s, 0).await?.into_ready()?, 1);
        assert_eq!(conn.xlen(&s).await?.into_ready()?, 0);

        let err = conn
            .xadd::<&str, &str>(&s, &StreamId::Auto, &[])
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Argument);

        common::clear_keys(&mut conn, &[s.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}

#[tokio::test]
async fn server_commands() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;

    assert_eq!(conn.ping().await?.into_ready()?, "PONG");
    assert_eq!(conn.echo("hi").await?.into_ready()?, b"hi".to_vec());
    conn.mset(&[("a", "1"), ("b", "2")]).await?;
    assert_eq!(conn.dbsize().await?.into_ready()?, 2);
    let (secs, micros) = conn.time().await?.into_ready()?;
    assert!(secs > 1_600_000_000);
    assert!((0..1_000_000).contains(&micros));
    conn.flush_db().await?;
    assert_eq!(conn.dbsize().await?.into_ready()?, 0);

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn execute_passes_raw_replies_through() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;

    conn.execute("set", &["raw", "1"]).await?;
    assert_eq!(
        conn.execute("GET", &["raw"]).await?.into_ready()?,
        Value::bulk("1")
    );

    let err = conn.execute::<&str>("  ", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    let err = conn.execute::<&str>("multi", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    let err = conn.execute("subscribe", &["news"]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Argument);
    assert!(!conn.is_queueing());

    let err = conn.execute::<&str>("NOSUCHCOMMAND", &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn script_cache_on_embedded() -> Result<(), ValkeyMiddlewareError> {
    let pool = common::embedded_pool(1).await?;
    let mut conn = pool.get_connection().await?;
    let script = Script::new("return 1");

    let err = conn.evalsha::<&str, &str>(script.sha1(), &[], &[]).await.unwrap_err();
    assert!(err.server_error().is_some_and(|e| e.is_no_script()));

    assert_eq!(conn.script_load(script.source()).await?.into_ready()?, script.sha1());
    assert_eq!(
        conn.script_exists(&[script.sha1(), "0000000000000000000000000000000000000000"])
            .await?
            .into_ready()?,
        vec![true, false]
    );
    conn.script_flush().await?;
    assert_eq!(
        conn.script_exists(&[script.sha1()]).await?.into_ready()?,
        vec![false]
    );

    let err = conn.eval::<&str, &str>("return 1", &[], &[]).await.unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Backend);

    conn.close().await;
    Ok(())
}

#[tokio::test]
async fn eval_script_falls_back_to_source() -> Result<(), ValkeyMiddlewareError> {
    for pool in common::network_pools().await? {
        let k = common::key(&pool, "scripts", "k");
        let mut conn = pool.get_connection().await?;
        conn.script_flush().await?;

        let script = Script::new("return redis.call('INCRBY', KEYS[1], ARGV[1])");
        let first = conn.eval_script(&script, &[k.as_str()], &["5"]).await?.into_ready()?;
        assert_eq!(first, Value::Int(5));
        // the source run cached the script, so this goes by digest
        let second = conn.eval_script(&script, &[k.as_str()], &["5"]).await?.into_ready()?;
        assert_eq!(second, Value::Int(10));

        common::clear_keys(&mut conn, &[k.as_str()]).await?;
        conn.close().await;
    }
    Ok(())
}
