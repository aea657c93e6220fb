// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Sliding-window admission control for outbound requests.
//!
//! At most `max_requests` admissions are granted within any trailing
//! `window`. A caller over the limit is suspended until the oldest
//! admission leaves the window; nobody is ever rejected.
//!
//! # Example
//!
//! ```
//! use doc_sync::resilience::rate_limiter::{RateLimitConfig, SlidingWindowLimiter};
//! use std::time::Duration;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let limiter = SlidingWindowLimiter::new(RateLimitConfig {
//!     max_requests: 2,
//!     window: Duration::from_millis(50),
//! });
//! limiter.admit().await;
//! limiter.admit().await;
//! limiter.admit().await; // waits ~50ms for the first slot to free up
//! # }
//! ```

use std::collections::VecDeque;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 60,
            window: Duration::from_secs(60),
        }
    }
}

/// Admission times inside the trailing window, oldest first.
#[derive(Debug, Default)]
struct RateWindow {
    admitted: VecDeque<Instant>,
}

impl RateWindow {
    fn prune(&mut self, now: Instant, window: Duration) {
        while let Some(oldest) = self.admitted.front() {
            if now.duration_since(*oldest) >= window {
                self.admitted.pop_front();
            } else {
                break;
            }
        }
    }
}

pub struct SlidingWindowLimiter {
    config: RateLimitConfig,
    window: Mutex<RateWindow>,
}

impl SlidingWindowLimiter {
    #[must_use]
    pub fn new(config: RateLimitConfig) -> Self {
        Self {
            config: RateLimitConfig {
                max_requests: config.max_requests.max(1),
                window: config.window,
            },
            window: Mutex::new(RateWindow::default()),
        }
    }

    /// Wait for a slot, then record the admission.
    ///
    /// Loops rather than recursing; each wait is bounded by the window. The
    /// lock is never held across the sleep.
    pub async fn admit(&self) {
        loop {
            let wake_at = {
                let mut window = self.window.lock();
                let now = Instant::now();
                window.prune(now, self.config.window);

                if window.admitted.len() < self.config.max_requests {
                    window.admitted.push_back(now);
                    return;
                }
                match window.admitted.front() {
                    Some(oldest) => *oldest + self.config.window,
                    None => now,
                }
            };

            debug!(
                wait_ms = wake_at.saturating_duration_since(Instant::now()).as_millis() as u64,
                max_requests = self.config.max_requests,
                "Rate limit reached, waiting for a slot"
            );
            crate::metrics::record_rate_limited();
            sleep_until(wake_at).await;
        }
    }

    /// Admissions currently counted against the window.
    #[must_use]
    pub fn in_flight_window(&self) -> usize {
        let mut window = self.window.lock();
        window.prune(Instant::now(), self.config.window);
        window.admitted.len()
    }

    #[must_use]
    pub fn config(&self) -> RateLimitConfig {
        self.config
    }
}
