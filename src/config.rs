// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Configuration for the document store.
//!
//! One immutable struct, validated once when the store is built. Component
//! configs are derived from it and handed to each component's constructor;
//! nothing reads configuration at runtime.
//!
//! # Example
//!
//! ```
//! use doc_sync::DocStoreConfig;
//!
//! // Minimal config (uses defaults)
//! let config = DocStoreConfig::default();
//! assert_eq!(config.compression_min_bytes, 1024);
//! assert!(config.validate().is_ok());
//!
//! // Full config
//! let config = DocStoreConfig {
//!     remote_url: Some("https://blobs.example.com/api/doc/42".into()),
//!     encryption_enabled: true,
//!     encryption_key: Some("correct horse battery staple".into()),
//!     max_versions: 25,
//!     ..Default::default()
//! };
//! assert!(config.validate().is_ok());
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

use crate::error::StoreError;
use crate::pipeline::compression::{CompressionAlgorithm, CompressionPolicy};
use crate::resilience::rate_limiter::RateLimitConfig;
use crate::resilience::retry::RetryConfig;

/// HTTP verb used to replace the remote document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RemoteMethod {
    #[default]
    Put,
    Post,
}

/// Configuration for a [`crate::DocStore`].
///
/// All fields have sensible defaults. An HTTP-backed store additionally
/// needs `remote_url`.
#[derive(Debug, Clone, Deserialize)]
pub struct DocStoreConfig {
    /// Document endpoint (e.g., "https://jsonblob.com/api/jsonBlob/<id>")
    #[serde(default)]
    pub remote_url: Option<String>,

    #[serde(default)]
    pub remote_method: RemoteMethod,

    /// Static headers attached to every request (auth tokens, API keys)
    #[serde(default)]
    pub remote_headers: BTreeMap<String, String>,

    /// Per-request timeouts
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// How long a read or written value answers reads without the network
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,

    /// Compression settings
    #[serde(default = "default_true")]
    pub compression_enabled: bool,
    /// "gzip" or "brotli"
    #[serde(default = "default_compression_algorithm")]
    pub compression_algorithm: String,
    /// Payloads smaller than this are stored uncompressed
    #[serde(default = "default_compression_min_bytes")]
    pub compression_min_bytes: usize,
    #[serde(default = "default_compression_level")]
    pub compression_level: u32,

    /// Encryption settings
    #[serde(default)]
    pub encryption_enabled: bool,
    /// Passphrase the AES-256 key is derived from
    #[serde(default)]
    pub encryption_key: Option<String>,
    /// scrypt cost (N = 2^log_n)
    #[serde(default = "default_kdf_log_n")]
    pub kdf_log_n: u8,

    /// Retry settings
    #[serde(default = "default_retry_max_retries")]
    pub retry_max_retries: usize,
    #[serde(default = "default_retry_initial_delay_ms")]
    pub retry_initial_delay_ms: u64,
    #[serde(default = "default_retry_backoff_factor")]
    pub retry_backoff_factor: f64,
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,

    /// Rate limit: at most `max_requests` per trailing window
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: usize,
    #[serde(default = "default_rate_limit_window_ms")]
    pub rate_limit_window_ms: u64,

    /// Snapshots kept in version history
    #[serde(default = "default_max_versions")]
    pub max_versions: usize,

    /// Reject documents whose checksum does not match on read
    #[serde(default = "default_true")]
    pub validate_checksum: bool,

    /// Local copy used when the remote is unreachable or corrupt
    #[serde(default = "default_fallback_path")]
    pub fallback_path: PathBuf,

    /// Skip remote writes when the document has not changed
    #[serde(default = "default_true")]
    pub differential_sync: bool,
}

fn default_true() -> bool { true }
fn default_read_timeout_ms() -> u64 { 10_000 }
fn default_write_timeout_ms() -> u64 { 30_000 }
fn default_cache_ttl_ms() -> u64 { 5 * 60 * 1000 } // 5 min
fn default_compression_algorithm() -> String { "gzip".to_string() }
fn default_compression_min_bytes() -> usize { 1024 } // 1 KB
fn default_compression_level() -> u32 { 6 }
fn default_kdf_log_n() -> u8 { 15 }
fn default_retry_max_retries() -> usize { 3 }
fn default_retry_initial_delay_ms() -> u64 { 1000 }
fn default_retry_backoff_factor() -> f64 { 2.0 }
fn default_retry_max_delay_ms() -> u64 { 30_000 }
fn default_rate_limit_max_requests() -> usize { 60 }
fn default_rate_limit_window_ms() -> u64 { 60_000 }
fn default_max_versions() -> usize { 10 }
fn default_fallback_path() -> PathBuf { PathBuf::from("data/doc_sync_fallback.json") }

impl Default for DocStoreConfig {
    fn default() -> Self {
        Self {
            remote_url: None,
            remote_method: RemoteMethod::default(),
            remote_headers: BTreeMap::new(),
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            cache_ttl_ms: default_cache_ttl_ms(),
            compression_enabled: true,
            compression_algorithm: default_compression_algorithm(),
            compression_min_bytes: default_compression_min_bytes(),
            compression_level: default_compression_level(),
            encryption_enabled: false,
            encryption_key: None,
            kdf_log_n: default_kdf_log_n(),
            retry_max_retries: default_retry_max_retries(),
            retry_initial_delay_ms: default_retry_initial_delay_ms(),
            retry_backoff_factor: default_retry_backoff_factor(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
            rate_limit_max_requests: default_rate_limit_max_requests(),
            rate_limit_window_ms: default_rate_limit_window_ms(),
            max_versions: default_max_versions(),
            validate_checksum: true,
            fallback_path: default_fallback_path(),
            differential_sync: true,
        }
    }
}

impl DocStoreConfig {
    /// Reject settings the store cannot run with.
    pub fn validate(&self) -> Result<(), StoreError> {
        let algorithm = self.algorithm()?;

        if self.encryption_enabled
            && self.encryption_key.as_deref().map_or(true, str::is_empty)
        {
            return Err(invalid("encryption_enabled requires a non-empty encryption_key"));
        }
        if !(1..=30).contains(&self.kdf_log_n) {
            return Err(invalid(format!("kdf_log_n must be in 1..=30, got {}", self.kdf_log_n)));
        }

        let max_level = match algorithm {
            CompressionAlgorithm::Gzip => 9,
            CompressionAlgorithm::Brotli => 11,
        };
        if self.compression_level > max_level {
            return Err(invalid(format!(
                "compression_level {} exceeds {max_level} for {}",
                self.compression_level, self.compression_algorithm
            )));
        }

        if self.rate_limit_max_requests == 0 {
            return Err(invalid("rate_limit_max_requests must be at least 1"));
        }
        if self.rate_limit_window_ms == 0 {
            return Err(invalid("rate_limit_window_ms must be positive"));
        }
        if self.max_versions == 0 {
            return Err(invalid("max_versions must be at least 1"));
        }
        if !self.retry_backoff_factor.is_finite() || self.retry_backoff_factor < 1.0 {
            return Err(invalid(format!(
                "retry_backoff_factor must be >= 1.0, got {}",
                self.retry_backoff_factor
            )));
        }
        if self.retry_initial_delay_ms > self.retry_max_delay_ms {
            return Err(invalid("retry_initial_delay_ms exceeds retry_max_delay_ms"));
        }
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(invalid("request timeouts must be positive"));
        }
        if self.remote_url.as_deref().is_some_and(|url| url.trim().is_empty()) {
            return Err(invalid("remote_url is empty"));
        }
        if self.fallback_path.as_os_str().is_empty() {
            return Err(invalid("fallback_path is empty"));
        }
        Ok(())
    }

    fn algorithm(&self) -> Result<CompressionAlgorithm, StoreError> {
        self.compression_algorithm
            .parse()
            .map_err(|e: crate::pipeline::compression::CompressionError| invalid(e.to_string()))
    }

    /// Compression policy, or `None` when compression is disabled.
    pub fn compression(&self) -> Result<Option<CompressionPolicy>, StoreError> {
        if !self.compression_enabled {
            return Ok(None);
        }
        Ok(Some(CompressionPolicy {
            algorithm: self.algorithm()?,
            min_bytes: self.compression_min_bytes,
            level: self.compression_level,
        }))
    }

    #[must_use]
    pub fn retry_config(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.retry_max_retries,
            initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
            factor: self.retry_backoff_factor,
            max_delay: Duration::from_millis(self.retry_max_delay_ms),
        }
    }

    #[must_use]
    pub fn rate_limit(&self) -> RateLimitConfig {
        RateLimitConfig {
            max_requests: self.rate_limit_max_requests,
            window: Duration::from_millis(self.rate_limit_window_ms),
        }
    }

    #[must_use]
    pub fn cache_ttl(&self) -> Duration {
        Duration::from_millis(self.cache_ttl_ms)
    }

    #[must_use]
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    #[must_use]
    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Passphrase to derive a key from, when encryption is on.
    #[must_use]
    pub fn passphrase(&self) -> Option<&str> {
        if self.encryption_enabled {
            self.encryption_key.as_deref().filter(|k| !k.is_empty())
        } else {
            None
        }
    }
}

fn invalid(message: impl Into<String>) -> StoreError {
    StoreError::Configuration(message.into())
}
