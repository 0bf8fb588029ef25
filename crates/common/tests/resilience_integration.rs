//! Integration tests for the permit pool
//!
//! Drives the pool through the public API with a paused clock so the
//! refill schedule is deterministic.

#![cfg(feature = "runtime")]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::Instant;
use vkrelay_common::resilience::{PermitError, PermitPool, PermitPoolConfig};

/// Validates the N-per-period contract under concurrent load.
///
/// # Test Steps
/// 1. Start a pool of 3 permits per second
/// 2. Spawn 7 tasks that each acquire one permit and record when
/// 3. Verify the first 3 complete at t=0, the next 3 after one period and
///    the last one after two periods
#[tokio::test(start_paused = true)]
async fn test_concurrent_callers_are_paced_per_period() {
    let pool = Arc::new(PermitPool::start(PermitPoolConfig::new(3, Duration::from_secs(1))).unwrap());
    let start = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..7 {
        let pool = Arc::clone(&pool);
        handles.push(tokio::spawn(async move {
            pool.acquire().await.unwrap();
            start.elapsed()
        }));
    }

    let mut elapsed = Vec::new();
    for handle in handles {
        elapsed.push(handle.await.unwrap());
    }
    elapsed.sort();

    assert!(elapsed[..3].iter().all(|d| *d < Duration::from_millis(10)));
    assert!(elapsed[3..6].iter().all(|d| *d >= Duration::from_secs(1) && *d < Duration::from_secs(2)));
    assert!(elapsed[6] >= Duration::from_secs(2));

    pool.shutdown().await;
}

/// Validates that no more than capacity operations complete inside any one
/// period window.
#[tokio::test(start_paused = true)]
async fn test_window_never_exceeds_capacity() {
    let pool = Arc::new(PermitPool::start(PermitPoolConfig::new(2, Duration::from_millis(500))).unwrap());
    let completed = Arc::new(AtomicUsize::new(0));

    for _ in 0..10 {
        let pool = Arc::clone(&pool);
        let completed = Arc::clone(&completed);
        tokio::spawn(async move {
            if pool.acquire().await.is_ok() {
                completed.fetch_add(1, Ordering::SeqCst);
            }
        });
    }

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 2);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 4);

    tokio::time::sleep(Duration::from_millis(500)).await;
    assert_eq!(completed.load(Ordering::SeqCst), 6);

    pool.shutdown().await;
}

/// Validates that every suspended caller is released with `Closed` when
/// the pool shuts down, and that later callers fail immediately.
#[tokio::test(start_paused = true)]
async fn test_shutdown_wakes_all_waiters() {
    let pool = Arc::new(PermitPool::start(PermitPoolConfig::new(1, Duration::from_secs(30))).unwrap());
    pool.acquire().await.unwrap();

    let waiters: Vec<_> = (0..3)
        .map(|_| {
            let pool = Arc::clone(&pool);
            tokio::spawn(async move { pool.acquire().await })
        })
        .collect();
    tokio::task::yield_now().await;

    pool.shutdown().await;

    for waiter in waiters {
        assert_eq!(waiter.await.unwrap(), Err(PermitError::Closed));
    }
    assert_eq!(pool.acquire().await, Err(PermitError::Closed));
    assert!(!pool.try_acquire());
}

#[tokio::test]
async fn test_invalid_configuration_is_rejected() {
    let err = PermitPool::start(PermitPoolConfig::new(0, Duration::from_secs(1))).unwrap_err();
    assert!(matches!(err, PermitError::InvalidConfiguration(_)));
}
