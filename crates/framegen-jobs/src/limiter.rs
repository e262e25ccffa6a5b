//! Sliding-window start limiter
//!
//! Caps how many jobs may start within any window of the configured length,
//! independent of the worker pool size.

use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct StartLimiter {
    max_starts: u32,
    window: Duration,
    starts: Mutex<VecDeque<Instant>>,
}

impl StartLimiter {
    /// `max_starts == 0` disables limiting
    pub fn new(max_starts: u32, window: Duration) -> Self {
        Self {
            max_starts,
            window,
            starts: Mutex::new(VecDeque::with_capacity(max_starts as usize)),
        }
    }

    pub fn unlimited() -> Self {
        Self::new(0, Duration::ZERO)
    }

    pub fn is_enabled(&self) -> bool {
        self.max_starts > 0 && !self.window.is_zero()
    }

    /// Wait until a start is allowed and record it
    pub async fn acquire(&self) {
        if !self.is_enabled() {
            return;
        }
        loop {
            let mut guard = self.starts.lock().await;
            let now = Instant::now();
            while guard
                .front()
                .is_some_and(|t| now.saturating_duration_since(*t) >= self.window)
            {
                guard.pop_front();
            }
            if guard.len() < self.max_starts as usize {
                guard.push_back(now);
                return;
            }
            let wait = match guard.front() {
                Some(oldest) => self.window.saturating_sub(now.saturating_duration_since(*oldest)),
                None => Duration::ZERO,
            };
            drop(guard);
            tracing::debug!(wait_ms = wait.as_millis() as u64, "start limiter saturated");
            tokio::time::sleep(wait.max(Duration::from_millis(1))).await;
        }
    }

    /// Starts recorded within the current window
    pub async fn recent_starts(&self) -> usize {
        let guard = self.starts.lock().await;
        let now = Instant::now();
        guard
            .iter()
            .filter(|t| now.saturating_duration_since(**t) < self.window)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unlimited_never_waits() {
        let limiter = StartLimiter::unlimited();
        let started = std::time::Instant::now();
        for _ in 0..1000 {
            limiter.acquire().await;
        }
        assert!(started.elapsed() < Duration::from_millis(500));
        assert_eq!(limiter.recent_starts().await, 0);
    }

    #[tokio::test]
    async fn test_window_caps_starts() {
        let limiter = StartLimiter::new(2, Duration::from_millis(150));
        let started = std::time::Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(started.elapsed() < Duration::from_millis(100));
        assert_eq!(limiter.recent_starts().await, 2);

        limiter.acquire().await;
        assert!(started.elapsed() >= Duration::from_millis(140));
    }
}
