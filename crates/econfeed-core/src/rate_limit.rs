//! Per-source fixed-window admission control.
//!
//! Admission never rejects: a caller that finds the window full sleeps until
//! the window rolls over and then checks again.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::time::Instant;

#[derive(Debug)]
struct WindowState {
    window_start: Instant,
    count: u32,
}

/// Counter snapshot exposed for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitSnapshot {
    pub count: u32,
    pub limit: Option<u32>,
    pub window: Duration,
}

/// Fixed-window request limiter owned by a single source client.
#[derive(Debug)]
pub struct RateLimiter {
    limit: Option<u32>,
    window: Duration,
    state: Mutex<WindowState>,
}

impl RateLimiter {
    /// Allow at most `limit_per_window` admissions per `window`.
    ///
    /// A limit of zero is treated as one so admission always makes progress.
    pub fn new(limit_per_window: u32, window: Duration) -> Self {
        Self {
            limit: Some(limit_per_window.max(1)),
            window,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }

    /// A limiter that admits every request immediately.
    pub fn unlimited() -> Self {
        Self {
            limit: None,
            window: Duration::ZERO,
            state: Mutex::new(WindowState {
                window_start: Instant::now(),
                count: 0,
            }),
        }
    }

    pub const fn limit(&self) -> Option<u32> {
        self.limit
    }

    pub const fn window(&self) -> Duration {
        self.window
    }

    /// Wait until a slot is free in the current window and take it.
    pub async fn admit(&self) {
        let Some(limit) = self.limit else {
            return;
        };

        loop {
            let wait = match self.try_acquire(limit, Instant::now()) {
                Ok(()) => return,
                Err(wait) => wait,
            };

            tracing::debug!(
                wait_ms = wait.as_millis() as u64,
                limit,
                "rate limit window full; waiting for rollover"
            );
            tokio::time::sleep(wait).await;
        }
    }

    /// Check-and-increment in one critical section. On a full window returns
    /// the time left until it rolls over.
    fn try_acquire(&self, limit: u32, now: Instant) -> Result<(), Duration> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        if now.saturating_duration_since(state.window_start) >= self.window {
            state.window_start = now;
            state.count = 0;
        }

        if state.count < limit {
            state.count += 1;
            return Ok(());
        }

        let remaining = (state.window_start + self.window).saturating_duration_since(now);
        Err(remaining.max(Duration::from_millis(1)))
    }

    pub fn snapshot(&self) -> RateLimitSnapshot {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        RateLimitSnapshot {
            count: state.count,
            limit: self.limit,
            window: self.window,
        }
    }
}
