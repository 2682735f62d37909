use std::collections::BTreeMap;
use std::time::Duration;

use tether_exec::executor::concurrency::ConcurrencyLimits;
use tokio::time::timeout;

const BLOCKED: Duration = Duration::from_millis(50);

#[tokio::test]
async fn concurrency_limits_enforce_global_limit() {
    let limits = ConcurrencyLimits::new(Some(2), &BTreeMap::new());

    let permit1 = limits.acquire().await.unwrap();
    let permit2 = limits.acquire().await.unwrap();

    assert!(timeout(BLOCKED, limits.acquire()).await.is_err());
    drop(permit1);
    let permit3 = timeout(BLOCKED, limits.acquire()).await;
    assert!(permit3.is_ok());
    drop(permit2);
}

#[tokio::test]
async fn concurrency_limits_enforce_per_host_limit() {
    let mut per_host = BTreeMap::new();
    per_host.insert("10.0.0.1".to_string(), 1);
    let limits = ConcurrencyLimits::new(None, &per_host);

    let permit1 = limits.acquire_host(Some("10.0.0.1")).await.unwrap();
    assert!(timeout(BLOCKED, limits.acquire_host(Some("10.0.0.1")))
        .await
        .is_err());
    drop(permit1);
    assert!(timeout(BLOCKED, limits.acquire_host(Some("10.0.0.1")))
        .await
        .is_ok());
}

#[tokio::test]
async fn concurrency_limits_allow_unlimited_for_unknown_host_and_local() {
    let mut per_host = BTreeMap::new();
    per_host.insert("10.0.0.1".to_string(), 1);
    let limits = ConcurrencyLimits::new(None, &per_host);

    let _held = limits.acquire_host(Some("10.0.0.1")).await.unwrap();
    let mut permits = Vec::new();
    for _ in 0..16 {
        permits.push(limits.acquire_host(Some("10.0.0.2")).await.unwrap());
        permits.push(limits.acquire_host(None).await.unwrap());
    }
    assert_eq!(permits.len(), 32);
}

#[tokio::test]
async fn unbounded_limits_never_block() {
    let limits = ConcurrencyLimits::unbounded();
    let mut permits = Vec::new();
    for _ in 0..64 {
        permits.push(timeout(BLOCKED, limits.acquire()).await.unwrap().unwrap());
    }
    assert_eq!(permits.len(), 64);
}
