//! Minimum-interval rate limiting shared by concurrent pipeline units.
//!
//! Each provider backend gets its own [`RateLimiter`] instance. Acquisitions from any number
//! of concurrent tasks serialize through a single mutex, so the global call rate against the
//! backend never exceeds the configured requests per minute even though callers run
//! concurrently. The lock guards only the scheduling decision; it is released before the
//! caller performs its backend call.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Throttles concurrent callers to a maximum call rate against one backend.
pub struct RateLimiter {
    delay: Duration,
    last_acquired: Mutex<Option<Instant>>,
}

impl RateLimiter {
    /// Build a limiter enforcing `max_calls_per_minute`. Zero or negative means unlimited.
    pub fn new(max_calls_per_minute: i64) -> Self {
        let delay = if max_calls_per_minute <= 0 {
            Duration::ZERO
        } else {
            Duration::from_secs_f64(60.0 / max_calls_per_minute as f64)
        };
        Self {
            delay,
            last_acquired: Mutex::new(None),
        }
    }

    /// Wait until the minimum interval since the previous acquisition has elapsed.
    ///
    /// Release is implicit; callers perform their backend call after this returns. First
    /// to reach the lock proceeds first, no further queueing priority is defined.
    pub async fn acquire(&self) {
        if self.delay.is_zero() {
            return;
        }

        let mut last = self.last_acquired.lock().await;
        if let Some(previous) = *last {
            let elapsed = previous.elapsed();
            if elapsed < self.delay {
                tokio::time::sleep(self.delay - elapsed).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn unlimited_limiter_never_delays() {
        let limiter = RateLimiter::new(0);
        let start = Instant::now();
        for _ in 0..100 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn serializes_concurrent_acquisitions_at_configured_rate() {
        let limiter = Arc::new(RateLimiter::new(60));
        let timestamps = Arc::new(Mutex::new(Vec::new()));

        let mut handles = Vec::new();
        for _ in 0..10 {
            let limiter = Arc::clone(&limiter);
            let timestamps = Arc::clone(&timestamps);
            handles.push(tokio::spawn(async move {
                limiter.acquire().await;
                timestamps.lock().await.push(Instant::now());
            }));
        }
        for handle in handles {
            handle.await.expect("acquisition task");
        }

        let mut recorded = timestamps.lock().await.clone();
        recorded.sort();
        assert_eq!(recorded.len(), 10);
        for pair in recorded.windows(2) {
            let gap = pair[1] - pair[0];
            assert!(
                gap >= Duration::from_millis(990),
                "acquisitions {gap:?} apart violate the 1s minimum interval"
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn second_acquisition_waits_for_remaining_interval() {
        let limiter = RateLimiter::new(120);
        limiter.acquire().await;
        let start = Instant::now();
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(490));
        assert!(start.elapsed() <= Duration::from_millis(600));
    }
}
