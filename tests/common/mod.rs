#![allow(dead_code)]

use std::time::Duration;

use tracing_subscriber::EnvFilter;
use valkey_middleware::prelude::*;

/// Route library logs to the test harness; `RUST_LOG=valkey_middleware=debug`
/// shows them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub async fn embedded_pool(max_size: u32) -> Result<ConfigAndPool, ValkeyMiddlewareError> {
    init_tracing();
    ConfigAndPool::builder("embedded://")
        .driver(DriverType::Embedded)
        .max_size(max_size)
        .max_wait(Duration::from_millis(200))
        .build()
        .await
}

/// Pools against a real server, one per network driver, when
/// `VALKEY_TEST_URL` is set (e.g. `redis://127.0.0.1:6379/15`). Empty
/// otherwise.
pub async fn network_pools() -> Result<Vec<ConfigAndPool>, ValkeyMiddlewareError> {
    init_tracing();
    let Ok(url) = std::env::var("VALKEY_TEST_URL") else {
        eprintln!("VALKEY_TEST_URL not set; skipping network drivers");
        return Ok(Vec::new());
    };
    let mut pools = Vec::new();
    for driver in [DriverType::Multiplexed, DriverType::Blocking] {
        let pool = ConfigAndPool::builder(url.clone())
            .driver(driver)
            .max_size(4)
            .max_wait(Duration::from_secs(2))
            .command_timeout(Some(Duration::from_secs(5)))
            .build()
            .await?;
        pools.push(pool);
    }
    Ok(pools)
}

/// The embedded pool plus any configured network pools.
pub async fn all_pools() -> Result<Vec<ConfigAndPool>, ValkeyMiddlewareError> {
    let mut pools = vec![embedded_pool(4).await?];
    pools.extend(network_pools().await?);
    Ok(pools)
}

/// Key unique to one test and driver, so suites can share a server.
pub fn key(pool: &ConfigAndPool, test: &str, name: &str) -> String {
    format!("vm-test:{}:{test}:{name}", pool.driver_type)
}

pub async fn clear_keys(
    conn: &mut MiddlewarePoolConnection,
    keys: &[&str],
) -> Result<(), ValkeyMiddlewareError> {
    conn.del(keys).await?;
    Ok(())
}
