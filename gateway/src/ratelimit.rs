//! Per-source-IP token buckets (spec §4.1 "Rate limits": 10 uploads/minute,
//! 60 reads/minute). Built in the same `RwLock<HashMap<..>>` shape as the
//! teacher's `cache.rs` `CacheStore` — a named bucket store, lazily
//! populated per key, refilled on a fixed schedule rather than continuously
//! to keep the arithmetic simple and auditable.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;

struct Bucket {
    tokens: f64,
    capacity: f64,
    refill_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(capacity: u32) -> Self {
        Self {
            tokens: capacity as f64,
            capacity: capacity as f64,
            refill_per_sec: capacity as f64 / 60.0,
            last_refill: Instant::now(),
        }
    }

    fn try_take(&mut self) -> bool {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.refill_per_sec).min(self.capacity);
        self.last_refill = now;

        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// One named rate limit (e.g. "uploads", "reads") keyed by source IP.
pub struct RateLimiter {
    capacity_per_minute: u32,
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn new(capacity_per_minute: u32) -> Self {
        Self {
            capacity_per_minute,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Returns `true` if `key` (typically a source IP) has a token
    /// available and consumes it; `false` if the bucket is exhausted.
    pub async fn check(&self, key: &str) -> bool {
        let mut buckets = self.buckets.write().await;
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| Bucket::new(self.capacity_per_minute));
        bucket.try_take()
    }

    /// Drop buckets that have been idle long enough to be fully refilled,
    /// bounding memory use for a long-running process. Not called on the
    /// hot path; an operator-driven or periodic background task would run
    /// this (no such scheduler is wired up in this workspace).
    pub async fn sweep_idle(&self, idle_for: Duration) {
        let mut buckets = self.buckets.write().await;
        buckets.retain(|_, b| b.last_refill.elapsed() < idle_for);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn exhausts_after_capacity_requests() {
        let limiter = RateLimiter::new(3);
        assert!(limiter.check("1.2.3.4").await);
        assert!(limiter.check("1.2.3.4").await);
        assert!(limiter.check("1.2.3.4").await);
        assert!(!limiter.check("1.2.3.4").await);
    }

    #[tokio::test]
    async fn buckets_are_independent_per_key() {
        let limiter = RateLimiter::new(1);
        assert!(limiter.check("a").await);
        assert!(limiter.check("b").await);
        assert!(!limiter.check("a").await);
    }
}
