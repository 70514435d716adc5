//! Behavioural contract of the pool, exercised against the in-memory backend.
//!
//! Time is paused, so the timing assertions are deterministic.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use postscope_db::{
    AcquireOptions, ConnectionPool, ConnectionSource, DbError, MemoryConnection, MemorySource, PoolConfig,
};
use tokio::time::Instant;

#[derive(Debug, PartialEq)]
enum BlockError {
    Pool(String),
    Boom(u32),
}

impl From<DbError> for BlockError {
    fn from(e: DbError) -> Self {
        Self::Pool(e.to_string())
    }
}

fn pool_with(max: u32) -> (ConnectionPool<MemorySource>, MemorySource) {
    let source = MemorySource::with_connections(u64::from(max));
    let config = PoolConfig::new("memory://posts").with_bounds(max, max);
    let pool = ConnectionPool::new(source.clone(), config).expect("valid config");
    (pool, source)
}

/// Paused time can still land a tick past a deadline.
fn assert_waited(waited: Duration, expected: Duration) {
    assert!(
        waited >= expected && waited < expected + Duration::from_millis(20),
        "waited {waited:?}, expected about {expected:?}"
    );
}

fn options(timeout_ms: u64, retry_ms: u64) -> AcquireOptions {
    AcquireOptions::default()
        .with_timeout(Duration::from_millis(timeout_ms))
        .with_retry_delay(Duration::from_millis(retry_ms))
}

// === Exclusivity ===

#[tokio::test(start_paused = true)]
async fn up_to_max_acquisitions_succeed_immediately_with_distinct_connections() {
    let (pool, _source) = pool_with(4);
    let started = Instant::now();

    let mut handles = Vec::new();
    for _ in 0..4 {
        handles.push(pool.acquire(options(1_000, 100)).await.expect("capacity available"));
    }

    assert_eq!(started.elapsed(), Duration::ZERO);
    let ids: HashSet<u64> = handles.iter_mut().map(|h| h.connection().id()).collect();
    assert_eq!(ids.len(), 4);
    assert_eq!(pool.status().in_use, 4);

    for handle in handles {
        handle.finish(false).await.expect("rollback");
    }
    assert_eq!(pool.status().in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_tasks_never_share_a_connection() {
    let (pool, _source) = pool_with(3);

    let tasks: Vec<_> = (0..12)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                pool.with_handle(options(30_000, 50), |handle| {
                    Box::pin(async move {
                        let id = handle.connection().id();
                        let key = format!("holder:{id}");
                        // Another holder of the same connection would see this marker.
                        assert_eq!(handle.connection().get(&key), None);
                        handle.connection().put(key.clone(), "busy");
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        assert_eq!(handle.connection().get(&key).as_deref(), Some("busy"));
                        Ok::<_, DbError>(id)
                    })
                })
                .await
            })
        })
        .collect();

    for task in tasks {
        task.await.expect("task panicked").expect("acquisition failed");
    }
    assert_eq!(pool.status().in_use, 0);
}

// === Saturation and timeout ===

#[tokio::test(start_paused = true)]
async fn saturated_pool_waits_then_succeeds_after_release() {
    let (pool, _source) = pool_with(2);
    let a = pool.acquire(options(1_000, 100)).await.unwrap();
    let b = pool.acquire(options(1_000, 100)).await.unwrap();

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1_500)).await;
        a.finish(false).await.expect("rollback");
    });

    let started = Instant::now();
    let c = pool
        .acquire(options(5_000, 1_000))
        .await
        .expect("released connection should be picked up");
    let waited = started.elapsed();

    assert!(waited >= Duration::from_millis(1_500), "succeeded before release: {waited:?}");
    assert!(waited <= Duration::from_millis(2_500), "not prompt after release: {waited:?}");

    drop(b);
    drop(c);
    assert_eq!(pool.status().in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn timeout_fires_at_the_deadline_with_diagnostics() {
    let (pool, _source) = pool_with(1);
    let _held = pool.acquire(options(1_000, 100)).await.unwrap();

    let started = Instant::now();
    let err = pool.acquire(options(3_000, 1_000)).await.unwrap_err();
    let waited = started.elapsed();

    assert_waited(waited, Duration::from_secs(3));
    match err {
        DbError::PoolExhausted {
            timeout,
            attempts,
            status,
        } => {
            assert_eq!(timeout, Duration::from_secs(3));
            assert_eq!(attempts, 4);
            assert_eq!(status.in_use, 1);
            assert_eq!(status.max, 1);
        }
        other => panic!("expected exhaustion, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn last_sleep_is_trimmed_to_the_deadline() {
    let (pool, _source) = pool_with(1);
    let _held = pool.acquire(options(1_000, 100)).await.unwrap();

    let started = Instant::now();
    let err = pool.acquire(options(2_500, 1_000)).await.unwrap_err();

    assert!(err.is_exhausted());
    assert_waited(started.elapsed(), Duration::from_millis(2_500));
}

#[tokio::test(start_paused = true)]
async fn zero_timeout_fails_after_one_attempt() {
    let (pool, _source) = pool_with(1);
    let _held = pool.acquire(options(1_000, 100)).await.unwrap();

    let started = Instant::now();
    let err = pool.acquire(options(0, 1_000)).await.unwrap_err();

    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(matches!(err, DbError::PoolExhausted { attempts: 1, .. }));
}

#[tokio::test(start_paused = true)]
async fn exhaustion_reaches_the_caller_error_type() {
    let (pool, _source) = pool_with(1);
    let _held = pool.acquire(options(1_000, 100)).await.unwrap();

    let result: Result<(), BlockError> = pool
        .with_handle(options(500, 100), |_handle| Box::pin(async move { Ok(()) }))
        .await;

    match result {
        Err(BlockError::Pool(msg)) => assert!(msg.contains("no database connection available")),
        other => panic!("expected pool error, got {other:?}"),
    }
}

// === Misbehaving backends ===

/// Backend whose checkout never completes, or fails the way a timed-out
/// sqlx pool does.
enum FaultySource {
    Stalled,
    TimedOut,
    Refused,
}

#[async_trait]
impl ConnectionSource for FaultySource {
    type Connection = MemoryConnection;

    async fn checkout(&self) -> postscope_db::Result<MemoryConnection> {
        match self {
            Self::Stalled => std::future::pending().await,
            Self::TimedOut => Err(DbError::Query(sqlx::Error::PoolTimedOut)),
            Self::Refused => Err(DbError::backend("connection refused")),
        }
    }

    fn idle(&self) -> usize {
        0
    }
}

fn faulty_pool(source: FaultySource) -> ConnectionPool<FaultySource> {
    let config = PoolConfig::new("memory://posts").with_bounds(2, 2);
    ConnectionPool::new(source, config).expect("valid config")
}

#[tokio::test(start_paused = true)]
async fn stalled_checkout_is_bounded_by_the_same_deadline() {
    let pool = faulty_pool(FaultySource::Stalled);

    let started = Instant::now();
    let err = pool.acquire(options(500, 100)).await.unwrap_err();

    assert!(err.is_exhausted(), "expected exhaustion, got {err:?}");
    assert_waited(started.elapsed(), Duration::from_millis(500));
    assert_eq!(pool.status().in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn backend_pool_timeout_surfaces_as_exhaustion() {
    let pool = faulty_pool(FaultySource::TimedOut);

    let err = pool.acquire(options(500, 100)).await.unwrap_err();

    assert!(matches!(err, DbError::PoolExhausted { attempts: 0, .. }), "got {err:?}");
    assert_eq!(pool.status().in_use, 0);
}

#[tokio::test(start_paused = true)]
async fn other_checkout_failures_pass_through() {
    let pool = faulty_pool(FaultySource::Refused);

    let err = pool.acquire(options(500, 100)).await.unwrap_err();

    assert!(matches!(err, DbError::Backend { .. }), "got {err:?}");
    assert_eq!(pool.status().in_use, 0);
}

// === Commit / rollback ===

#[tokio::test(start_paused = true)]
async fn auto_commit_makes_writes_durable() {
    let (pool, source) = pool_with(2);

    let result: Result<(), BlockError> = pool
        .with_handle(options(1_000, 100).with_auto_commit(true), |handle| {
            Box::pin(async move {
                handle.connection().put("post:1", "committed");
                Ok(())
            })
        })
        .await;

    assert_eq!(result, Ok(()));
    assert_eq!(source.committed("post:1").as_deref(), Some("committed"));
    assert_eq!(source.commit_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn success_without_auto_commit_is_not_persisted() {
    let (pool, source) = pool_with(2);

    let result: Result<(), BlockError> = pool
        .with_handle(options(1_000, 100), |handle| {
            Box::pin(async move {
                handle.connection().put("post:1", "scratch");
                Ok(())
            })
        })
        .await;

    assert_eq!(result, Ok(()));
    assert_eq!(source.committed("post:1"), None);
    assert_eq!(source.commit_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn failure_rolls_back_and_propagates_unchanged() {
    let (pool, source) = pool_with(2);

    let result: Result<(), BlockError> = pool
        .with_handle(options(1_000, 100).with_auto_commit(true), |handle| {
            Box::pin(async move {
                handle.connection().put("post:1", "half-applied");
                Err(BlockError::Boom(42))
            })
        })
        .await;

    assert_eq!(result, Err(BlockError::Boom(42)));
    assert_eq!(source.committed("post:1"), None);
    assert_eq!(source.rollback_count(), 1);
    assert_eq!(pool.status().in_use, 0);
}

// === Release guarantees ===

#[tokio::test(start_paused = true)]
async fn no_connection_leaks_across_many_failing_scopes() {
    let (pool, source) = pool_with(4);

    for i in 0..1_000u32 {
        let result: Result<u32, BlockError> = pool
            .with_handle(options(1_000, 100).with_auto_commit(true), move |handle| {
                Box::pin(async move {
                    handle.connection().put(format!("row:{i}"), "x");
                    if i % 2 == 0 {
                        Err(BlockError::Boom(i))
                    } else {
                        Ok(i)
                    }
                })
            })
            .await;

        if i % 2 == 0 {
            assert_eq!(result, Err(BlockError::Boom(i)));
        } else {
            assert_eq!(result, Ok(i));
        }
    }

    let status = pool.status();
    assert_eq!(status.in_use, 0);
    assert_eq!(status.idle, 4);
    assert_eq!(source.len(), 500);
    assert_eq!(source.committed("row:0"), None);
    assert_eq!(source.committed("row:1").as_deref(), Some("x"));
}

#[tokio::test(start_paused = true)]
async fn dropping_an_unfinished_handle_abandons_and_releases() {
    let (pool, source) = pool_with(1);

    let mut handle = pool.acquire(options(1_000, 100).with_auto_commit(true)).await.unwrap();
    handle.connection().put("post:1", "never");
    drop(handle);

    assert_eq!(source.committed("post:1"), None);
    assert_eq!(source.abandon_count(), 1);
    assert_eq!(pool.status().in_use, 0);

    let mut again = pool.acquire(options(1_000, 100)).await.unwrap();
    assert!(again.connection().in_transaction());
    assert_eq!(again.connection().get("post:1"), None);
}

#[tokio::test(start_paused = true)]
async fn cancelled_scope_still_releases() {
    let (pool, source) = pool_with(1);

    let slow = pool.with_handle(options(1_000, 100).with_auto_commit(true), |handle| {
        Box::pin(async move {
            handle.connection().put("post:1", "interrupted");
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok::<_, DbError>(())
        })
    });
    let outcome = tokio::time::timeout(Duration::from_secs(1), slow).await;

    assert!(outcome.is_err(), "scope should have been cancelled");
    assert_eq!(source.committed("post:1"), None);
    assert_eq!(pool.status().in_use, 0);
    assert!(pool.acquire(options(0, 100)).await.is_ok());
}

// === Scenario: min=2, max=2 ===

#[tokio::test(start_paused = true)]
async fn single_slot_scenario() {
    let (pool, _source) = pool_with(2);
    let mut held = Vec::new();

    // Fill the pool; A is the second checkout.
    held.push(pool.acquire(options(2_000, 1_000)).await.expect("first"));
    let started = Instant::now();
    let a = pool.acquire(options(2_000, 1_000)).await.expect("A acquires immediately");
    assert_eq!(started.elapsed(), Duration::ZERO);

    let started = Instant::now();
    let err = pool.acquire(options(1_000, 1_000)).await.unwrap_err();
    assert!(err.is_exhausted());
    assert_waited(started.elapsed(), Duration::from_secs(1));

    a.finish(false).await.expect("release A");

    let started = Instant::now();
    let b = pool.acquire(options(2_000, 1_000)).await.expect("B acquires after release");
    assert_eq!(started.elapsed(), Duration::ZERO);

    drop(b);
    drop(held);
    assert_eq!(pool.status().in_use, 0);
}
