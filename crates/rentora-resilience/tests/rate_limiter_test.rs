use async_trait::async_trait;
use chrono::TimeDelta;
use rentora_core::{Clock, ManualClock};
use rentora_resilience::{
    InMemoryRateLimitStore, RateLimitError, RateLimitPolicy, RateLimitResult, RateLimitStore,
    RateLimiter, WindowHit,
};
use std::sync::Arc;

fn limiter(policy: RateLimitPolicy) -> (RateLimiter, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::starting_now());
    let limiter = RateLimiter::new(
        Arc::new(InMemoryRateLimitStore::new()),
        policy,
        clock.clone(),
    );
    (limiter, clock)
}

#[tokio::test]
async fn test_sixth_request_in_window_is_denied() {
    let (limiter, clock) = limiter(RateLimitPolicy::new(5, TimeDelta::minutes(1)));

    for expected_remaining in (0..5).rev() {
        let decision = limiter.check("user-1", "/bookings").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, expected_remaining);
    }

    clock.advance(TimeDelta::seconds(30));
    let denied = limiter.check("user-1", "/bookings").await;
    assert!(!denied.allowed);
    assert_eq!(denied.remaining, 0);
    assert_eq!(denied.retry_after(clock.now()), std::time::Duration::from_secs(30));

    clock.advance(TimeDelta::seconds(30));
    assert!(limiter.check("user-1", "/bookings").await.allowed);
}

#[tokio::test]
async fn test_windows_are_per_subject_and_endpoint() {
    let (limiter, _clock) = limiter(RateLimitPolicy::new(1, TimeDelta::minutes(1)));

    assert!(limiter.check("user-1", "/bookings").await.allowed);
    assert!(!limiter.check("user-1", "/bookings").await.allowed);
    assert!(limiter.check("user-1", "/listings").await.allowed);
    assert!(limiter.check("user-2", "/bookings").await.allowed);

    limiter.reset("user-1", "/bookings").await.unwrap();
    assert!(limiter.check("user-1", "/bookings").await.allowed);
}

#[tokio::test]
async fn test_exceeding_limit_blocks_subject_everywhere() {
    let policy = RateLimitPolicy::new(2, TimeDelta::seconds(10))
        .with_block_duration(TimeDelta::minutes(5));
    let (limiter, clock) = limiter(policy);

    limiter.check("10.0.0.1", "/a").await;
    limiter.check("10.0.0.1", "/a").await;
    let denied = limiter.check("10.0.0.1", "/a").await;
    assert!(!denied.allowed);
    assert_eq!(denied.reset_time, clock.now() + TimeDelta::minutes(5));

    // The window has long cleared, the block has not.
    clock.advance(TimeDelta::minutes(1));
    assert!(!limiter.check("10.0.0.1", "/b").await.allowed);

    clock.advance(TimeDelta::minutes(4));
    assert!(limiter.check("10.0.0.1", "/a").await.allowed);
}

#[tokio::test]
async fn test_manual_block_and_unblock() {
    let (limiter, _clock) = limiter(RateLimitPolicy::new(100, TimeDelta::minutes(1)));

    limiter.block("abuser", TimeDelta::hours(1)).await.unwrap();
    assert!(!limiter.check("abuser", "/").await.allowed);

    limiter.unblock("abuser").await.unwrap();
    assert!(limiter.check("abuser", "/").await.allowed);
}

struct UnreachableStore;

#[async_trait]
impl RateLimitStore for UnreachableStore {
    async fn hit(&self, _: &str, _: i64, _: i64, _: u64) -> RateLimitResult<WindowHit> {
        Err(RateLimitError::Reply("connection refused".into()))
    }

    async fn reset(&self, _: &str) -> RateLimitResult<()> {
        Err(RateLimitError::Reply("connection refused".into()))
    }

    async fn block(&self, _: &str, _: i64, _: i64) -> RateLimitResult<()> {
        Err(RateLimitError::Reply("connection refused".into()))
    }

    async fn blocked_until(&self, _: &str, _: i64) -> RateLimitResult<Option<i64>> {
        Err(RateLimitError::Reply("connection refused".into()))
    }

    async fn unblock(&self, _: &str) -> RateLimitResult<()> {
        Err(RateLimitError::Reply("connection refused".into()))
    }
}

#[tokio::test]
async fn test_store_failure_fails_open() {
    let limiter = RateLimiter::new(
        Arc::new(UnreachableStore),
        RateLimitPolicy::new(1, TimeDelta::minutes(1)),
        Arc::new(ManualClock::starting_now()),
    );

    for _ in 0..3 {
        let decision = limiter.check("user-1", "/bookings").await;
        assert!(decision.allowed);
        assert_eq!(decision.remaining, 1);
    }
    assert!(limiter.try_check("user-1", "/bookings").await.is_err());
}
