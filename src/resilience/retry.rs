// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Retry logic with exponential backoff.
//!
//! One implementation shared by remote reads and writes. An operation is
//! attempted up to `max_retries + 1` times; between attempts the caller
//! sleeps `initial_delay * factor^attempt`, capped at `max_delay`. There is
//! no sleep after the final attempt.
//!
//! # Example
//!
//! ```
//! use doc_sync::resilience::retry::RetryConfig;
//! use std::time::Duration;
//!
//! let config = RetryConfig::default();
//! assert_eq!(config.max_retries, 3);
//! assert_eq!(config.delay_for(0), Duration::from_secs(1));
//! assert_eq!(config.delay_for(2), Duration::from_secs(4));
//! ```

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Backoff schedule for remote operations.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryConfig {
    /// Retries after the first attempt
    pub max_retries: usize,
    pub initial_delay: Duration,
    pub factor: f64,
    pub max_delay: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_secs(1),
            factor: 2.0,
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryConfig {
    /// Single attempt, no backoff.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Fast retry for tests (minimal delays)
    #[cfg(test)]
    pub fn test() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1),
            factor: 2.0,
            max_delay: Duration::from_millis(10),
        }
    }

    /// Sleep before attempt `attempt + 1` (zero-based).
    #[must_use]
    pub fn delay_for(&self, attempt: usize) -> Duration {
        let exponent = i32::try_from(attempt).unwrap_or(i32::MAX);
        let secs = self.initial_delay.as_secs_f64() * self.factor.powi(exponent);
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            return self.max_delay;
        }
        Duration::from_secs_f64(secs.max(0.0))
    }
}

/// Retry every failure.
pub async fn retry<F, Fut, T, E>(
    operation_name: &str,
    config: &RetryConfig,
    operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    retry_if(operation_name, config, |_| true, operation).await
}

/// Retry failures accepted by `should_retry`; anything else is returned at once.
pub async fn retry_if<F, Fut, T, E, P>(
    operation_name: &str,
    config: &RetryConfig,
    should_retry: P,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
    P: Fn(&E) -> bool,
{
    let total_attempts = config.max_retries + 1;
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(val) => {
                if attempt > 0 {
                    info!("Operation '{}' succeeded after {} retries", operation_name, attempt);
                }
                return Ok(val);
            }
            Err(err) => {
                if !should_retry(&err) {
                    return Err(err);
                }
                if attempt + 1 >= total_attempts {
                    warn!(
                        "Operation '{}' failed after {} attempts: {}",
                        operation_name, total_attempts, err
                    );
                    return Err(err);
                }

                let delay = config.delay_for(attempt);
                warn!(
                    "Operation '{}' failed (attempt {}/{}): {}. Retrying in {:?}...",
                    operation_name,
                    attempt + 1,
                    total_attempts,
                    err,
                    delay
                );
                crate::metrics::record_retry(operation_name);

                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}
