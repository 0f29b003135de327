//! Client-side request pacing.
//!
//! Jikan allows a few requests per second and a bounded number per minute.
//! The limiter enforces both, and is shared by concurrent callers through
//! `&self`: waiting callers queue on the internal lock.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, Instant};

const WINDOW: Duration = Duration::from_secs(60);

/// Rate limiter with per-second and per-minute limits
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    max_per_minute: usize,
    history: Mutex<VecDeque<Instant>>,
}

impl RateLimiter {
    /// Create a new rate limiter
    pub fn new(max_per_second: f64, max_per_minute: u32) -> Self {
        let min_interval = if max_per_second > 0.0 {
            Duration::from_secs_f64(1.0 / max_per_second)
        } else {
            Duration::ZERO
        };

        Self {
            min_interval,
            max_per_minute: max_per_minute.max(1) as usize,
            history: Mutex::new(VecDeque::new()),
        }
    }

    /// Wait until a request may be sent, then record it
    pub async fn acquire(&self) {
        let mut history = self.history.lock().await;

        let now = Instant::now();
        while history
            .front()
            .is_some_and(|&sent| now.duration_since(sent) >= WINDOW)
        {
            history.pop_front();
        }

        if history.len() >= self.max_per_minute {
            if let Some(&oldest) = history.front() {
                let wait = WINDOW.saturating_sub(now.duration_since(oldest));
                tracing::debug!(wait_ms = wait.as_millis(), "Rate limit: per-minute window full");
                sleep(wait).await;
                history.pop_front();
            }
        }

        if let Some(&last) = history.back() {
            let wait = self.min_interval.saturating_sub(last.elapsed());
            if !wait.is_zero() {
                tracing::debug!(wait_ms = wait.as_millis(), "Rate limit: per-second spacing");
                sleep(wait).await;
            }
        }

        history.push_back(Instant::now());
    }

    /// Number of requests sent in the last minute
    pub async fn current_minute_count(&self) -> usize {
        let history = self.history.lock().await;
        let now = Instant::now();
        history
            .iter()
            .filter(|&&sent| now.duration_since(sent) < WINDOW)
            .count()
    }
}
