//! Request spacing enforcement
//!
//! A single [`RateLimiter`] instance is shared by every component that
//! touches the network, so API pagination, page scraping, and image
//! downloads all draw from the same one-request-per-interval budget.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep_until, Instant};

/// Enforces a minimum interval between consecutive outbound requests.
///
/// Built on [`tokio::time::Instant`], which is monotonic: wall-clock
/// adjustments cannot shrink or stretch the enforced spacing.
#[derive(Clone)]
pub struct RateLimiter {
    interval: Duration,
    last_request: Arc<Mutex<Option<Instant>>>,
}

impl RateLimiter {
    /// Create a limiter with the given minimum spacing between requests.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: Arc::new(Mutex::new(None)),
        }
    }

    /// Block until at least the configured interval has elapsed since the
    /// previous `wait` call returned. The first call returns immediately.
    pub async fn wait(&self) {
        let mut last = self.last_request.lock().await;
        if let Some(previous) = *last {
            let ready_at = previous + self.interval;
            if ready_at > Instant::now() {
                sleep_until(ready_at).await;
            }
        }
        *last = Some(Instant::now());
    }

    /// The configured minimum spacing.
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_wait_enforces_minimum_spacing() {
        let limiter = RateLimiter::new(Duration::from_millis(500));
        let start = Instant::now();

        // First call is free, the next three each cost one interval
        for _ in 0..4 {
            limiter.wait().await;
        }

        assert!(start.elapsed() >= Duration::from_millis(1500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_wait_returns_immediately() {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let start = Instant::now();
        limiter.wait().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clones_share_one_budget() {
        let limiter = RateLimiter::new(Duration::from_millis(200));
        let other = limiter.clone();

        let start = Instant::now();
        limiter.wait().await;
        other.wait().await;

        // The clone must see the original's last-request timestamp
        assert!(start.elapsed() >= Duration::from_millis(200));
    }
}
