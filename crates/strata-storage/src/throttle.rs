//! Token-bucket bandwidth throttling and simultaneous-transfer limits for
//! object storage backends, so a restore or scrub job doesn't starve other
//! traffic sharing the same storage endpoint.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::{Mutex, Semaphore};

struct Bucket {
    capacity: f64,
    tokens: f64,
    rate_per_sec: f64,
    last_refill: Instant,
}

impl Bucket {
    fn new(rate_per_sec: f64) -> Self {
        Self { capacity: rate_per_sec, tokens: rate_per_sec, rate_per_sec, last_refill: Instant::now() }
    }

    fn refill(&mut self) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * self.rate_per_sec).min(self.capacity);
        self.last_refill = now;
    }
}

/// Limits aggregate throughput to `rate_per_sec` bytes/second and caps the
/// number of concurrent transfers via a semaphore.
pub struct Throttle {
    bucket: Mutex<Bucket>,
    concurrency: Arc<Semaphore>,
}

impl Throttle {
    pub fn new(rate_bytes_per_sec: u64, max_concurrent: usize) -> Self {
        Self {
            bucket: Mutex::new(Bucket::new(rate_bytes_per_sec as f64)),
            concurrency: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    pub fn unbounded(max_concurrent: usize) -> Self {
        Self::new(u64::MAX, max_concurrent)
    }

    /// Acquire a concurrency slot. Doesn't rate-limit by itself — pair with
    /// repeated [`Self::consume`] calls to also respect the token bucket.
    pub async fn permit(&self) -> tokio::sync::SemaphorePermit<'_> {
        self.concurrency.acquire().await.expect("semaphore never closed")
    }

    /// The sleep duration needed before `bytes` may be sent. Deducts the
    /// tokens once enough have accumulated and returns `Duration::ZERO`;
    /// otherwise returns the wait and deducts nothing, so the caller must
    /// sleep and call again. Never sleeps itself.
    pub async fn consume(&self, bytes: usize) -> Duration {
        let needed = bytes as f64;
        let mut bucket = self.bucket.lock().await;
        bucket.refill();
        if bucket.tokens >= needed {
            bucket.tokens -= needed;
            return Duration::ZERO;
        }
        let deficit = needed - bucket.tokens;
        Duration::from_secs_f64(deficit / bucket.rate_per_sec)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unbounded_throttle_never_blocks() {
        let throttle = Throttle::unbounded(4);
        let _permit = throttle.permit().await;
        assert_eq!(throttle.consume(10_000_000).await, Duration::ZERO);
    }

    #[tokio::test]
    async fn concurrency_cap_limits_permits() {
        let throttle = Throttle::new(1_000_000, 1);
        let _first = throttle.permit().await;
        let second = tokio::time::timeout(Duration::from_millis(50), throttle.permit()).await;
        assert!(second.is_err());
    }

    #[tokio::test]
    async fn consume_reports_wait_without_blocking_or_deducting_when_insufficient() {
        let throttle = Throttle::new(10, 1);
        // Drains the initial 10-token capacity.
        assert_eq!(throttle.consume(10).await, Duration::ZERO);
        // Not enough tokens left: consume must return promptly with a
        // nonzero wait rather than sleeping, and must not deduct, so asking
        // again immediately reports about the same wait.
        let wait = throttle.consume(10).await;
        assert!(wait > Duration::from_millis(500) && wait <= Duration::from_secs(1));
        let wait_again = throttle.consume(10).await;
        assert!(wait_again > Duration::from_millis(500) && wait_again <= Duration::from_secs(1));
    }
}
