//! Sliding-window rate limiter shared by all provider adapters.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// At most `max_requests` per `window`. `acquire` waits for a slot;
/// `try_acquire` refuses without waiting so callers can skip a provider
/// whose budget is exhausted.
#[derive(Clone)]
pub struct RateLimiter {
    timestamps: Arc<Mutex<VecDeque<Instant>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            timestamps: Arc::new(Mutex::new(VecDeque::new())),
            max_requests,
            window,
        }
    }

    /// Convenience constructor for per-second provider budgets.
    pub fn per_second(max_requests: usize) -> Self {
        Self::new(max_requests, Duration::from_secs(1))
    }

    fn evict(&self, ts: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&front) = ts.front() {
            if now.duration_since(front) >= self.window {
                ts.pop_front();
            } else {
                break;
            }
        }
    }

    /// Take a slot immediately if one is free.
    pub async fn try_acquire(&self) -> bool {
        let mut ts = self.timestamps.lock().await;
        let now = Instant::now();
        self.evict(&mut ts, now);
        if ts.len() < self.max_requests {
            ts.push_back(now);
            true
        } else {
            false
        }
    }

    /// Wait until a slot frees up, then take it.
    pub async fn acquire(&self) {
        loop {
            let sleep_dur = {
                let mut ts = self.timestamps.lock().await;
                let now = Instant::now();
                self.evict(&mut ts, now);

                if ts.len() < self.max_requests {
                    ts.push_back(now);
                    return;
                }

                // Wait until the oldest request falls out of the window.
                let front = *ts.front().expect("non-empty when at capacity");
                self.window
                    .saturating_sub(now.duration_since(front))
                    .saturating_add(Duration::from_millis(10))
            };
            tokio::time::sleep(sleep_dur).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn try_acquire_refuses_when_budget_spent() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        assert!(limiter.try_acquire().await);
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn window_expiry_frees_slots() {
        tokio::time::pause();
        let limiter = RateLimiter::new(1, Duration::from_millis(100));
        assert!(limiter.try_acquire().await);
        assert!(!limiter.try_acquire().await);
        tokio::time::advance(Duration::from_millis(150)).await;
        assert!(limiter.try_acquire().await);
    }

    #[tokio::test]
    async fn acquire_waits_for_slot() {
        tokio::time::pause();
        let limiter = RateLimiter::new(1, Duration::from_millis(50));
        limiter.acquire().await;
        // Second acquire must sleep across the window instead of failing.
        limiter.acquire().await;
        assert!(!limiter.try_acquire().await);
    }
}
