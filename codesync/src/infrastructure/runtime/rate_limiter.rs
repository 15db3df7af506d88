// /////////////////////////////////////////////////////////////////////////////
// codesync
// /////////////////////////////////////////////////////////////////////////////

//! # Rate Limiter
//!
//! Sliding-window admission control for outbound calls (embedding requests).
//! On each `acquire`, timestamps older than `now - time_window` are expired;
//! if fewer than `rate_limit` remain, the caller is admitted immediately and
//! its timestamp recorded. Otherwise the caller sleeps until the oldest
//! qualifying timestamp ages out, then is admitted. A single mutex around the
//! timestamp deque makes admission order deterministic across waiters.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    pub rate_limit: usize,
    pub time_window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { rate_limit: 60, time_window: Duration::from_secs(60) }
    }
}

pub struct RateLimiter {
    config: RateLimiterConfig,
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Self {
        Self { config, timestamps: Arc::new(Mutex::new(VecDeque::new())) }
    }

    /// Blocks until admission is granted, then records the admission.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut timestamps = self.timestamps.lock();
                let now = Instant::now();
                let cutoff = now - self.config.time_window;
                while matches!(timestamps.front(), Some(&t) if t < cutoff) {
                    timestamps.pop_front();
                }
                if timestamps.len() < self.config.rate_limit {
                    timestamps.push_back(now);
                    return;
                }
                // Oldest surviving timestamp expires at `t + time_window`.
                let oldest = *timestamps.front().expect("non-empty: len >= rate_limit > 0");
                (oldest + self.config.time_window).saturating_duration_since(now)
            };
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn admits_up_to_rate_limit_without_waiting() {
        let limiter = RateLimiter::new(RateLimiterConfig { rate_limit: 3, time_window: Duration::from_secs(60) });
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert!(start.elapsed() < Duration::from_millis(50));
    }

    #[tokio::test]
    async fn fourth_call_waits_for_window_to_slide() {
        let limiter =
            RateLimiter::new(RateLimiterConfig { rate_limit: 2, time_window: Duration::from_millis(200) });
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= Duration::from_millis(180));
    }
}
