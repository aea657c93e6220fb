// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document store coordinator.
//!
//! The [`DocStore`] ties together all components:
//! - Cache with content hashing (freshness and differential writes)
//! - Version history of every write attempt
//! - Transform pipeline (checksum, compression, encryption, envelope)
//! - Rate limiter and retry around every remote request
//! - Local fallback file with a pending-resync marker
//!
//! # Concurrency
//!
//! Cache and history live behind one async mutex held for the whole of a
//! `read()` or `write()`, so concurrent callers on a shared store are
//! serialized and never interleave halfway through an operation.
//!
//! # Example
//!
//! ```rust,no_run
//! use doc_sync::{DocStore, DocStoreConfig};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Clone, Serialize, Deserialize)]
//! struct Save { level: u32, gold: u64 }
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), doc_sync::StoreError> {
//! let config = DocStoreConfig {
//!     remote_url: Some("https://blobs.example.com/api/doc/42".into()),
//!     ..Default::default()
//! };
//! let store = DocStore::<Save>::http(config)?;
//!
//! store.write(&Save { level: 3, gold: 120 }).await?;
//! let loaded = store.read().await;
//! # Ok(())
//! # }
//! ```

mod history_api;
mod read;
mod types;
mod write;

pub use types::{ReadOutcome, ReadSource, WriteOutcome};

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::cache::DocumentCache;
use crate::codec::{DocumentCodec, JsonCodec};
use crate::config::DocStoreConfig;
use crate::error::StoreError;
use crate::history::VersionHistory;
use crate::metrics::{self, MetricsSnapshot, StoreMetrics};
use crate::pipeline::crypto::Keyring;
use crate::pipeline::Pipeline;
use crate::resilience::fallback::{FallbackStats, LocalFallback};
use crate::resilience::rate_limiter::SlidingWindowLimiter;
use crate::resilience::retry::{retry_if, RetryConfig};
use crate::storage::http::HttpRemote;
use crate::storage::traits::RemoteStore;

/// State mutated by reads and writes, guarded as one unit.
pub(super) struct StoreState<T> {
    pub(super) cache: DocumentCache<T>,
    pub(super) history: VersionHistory<T>,
}

/// A resilient store for one remote document.
///
/// `T` is the application's document; `R` the remote it is bound to
/// ([`HttpRemote`] unless stated otherwise).
///
/// # Thread Safety
///
/// `DocStore` is `Send + Sync`; share it through an `Arc`.
pub struct DocStore<T, R = HttpRemote> {
    pub(super) config: DocStoreConfig,
    pub(super) pipeline: Pipeline,
    pub(super) codec: Arc<dyn DocumentCodec<T>>,
    pub(super) remote: R,
    pub(super) limiter: SlidingWindowLimiter,
    pub(super) retry: RetryConfig,
    pub(super) fallback: LocalFallback<T>,
    pub(super) metrics: StoreMetrics,
    pub(super) state: Mutex<StoreState<T>>,
}

impl<T> DocStore<T, HttpRemote>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
{
    /// Store bound to `config.remote_url` over HTTP.
    pub fn http(config: DocStoreConfig) -> Result<Self, StoreError> {
        config.validate()?;
        let remote = HttpRemote::from_config(&config)?;
        Self::new(config, remote)
    }
}

impl<T, R> DocStore<T, R>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    R: RemoteStore,
{
    /// Store using the pretty JSON codec.
    pub fn new(config: DocStoreConfig, remote: R) -> Result<Self, StoreError> {
        Self::with_codec(config, remote, Arc::new(JsonCodec::<T>::pretty()))
    }

    /// Store with a custom document codec.
    ///
    /// Validates `config` and, when encryption is on, derives the key for a
    /// freshly drawn salt. Key derivation is deliberately slow (scrypt).
    pub fn with_codec(
        config: DocStoreConfig,
        remote: R,
        codec: Arc<dyn DocumentCodec<T>>,
    ) -> Result<Self, StoreError> {
        config.validate()?;

        let keyring = match config.passphrase() {
            Some(passphrase) => Some(Arc::new(Keyring::new(passphrase, config.kdf_log_n)?)),
            None => None,
        };
        let pipeline = Pipeline::new(config.compression()?, keyring, config.validate_checksum);
        let fallback = LocalFallback::new(&config.fallback_path, codec.clone());
        metrics::set_pending_resync(fallback.is_pending());

        info!(
            compression = config.compression_enabled,
            algorithm = %config.compression_algorithm,
            encryption = pipeline.encrypts(),
            max_versions = config.max_versions,
            fallback = %config.fallback_path.display(),
            "Document store created"
        );

        Ok(Self {
            pipeline,
            limiter: SlidingWindowLimiter::new(config.rate_limit()),
            retry: config.retry_config(),
            fallback,
            metrics: StoreMetrics::new(),
            state: Mutex::new(StoreState {
                cache: DocumentCache::new(config.cache_ttl()),
                history: VersionHistory::new(config.max_versions),
            }),
            codec,
            remote,
            config,
        })
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Accessors
    // ═══════════════════════════════════════════════════════════════════════════

    #[must_use]
    pub fn config(&self) -> &DocStoreConfig {
        &self.config
    }

    #[must_use]
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Save/load counters of the local fallback file.
    #[must_use]
    pub fn fallback_stats(&self) -> FallbackStats {
        self.fallback.stats()
    }

    /// Whether the local fallback holds a write the remote never acknowledged.
    #[must_use]
    pub fn has_pending_resync(&self) -> bool {
        self.fallback.is_pending()
    }

    /// Drop the cached value so the next read goes to the remote.
    pub async fn clear_cache(&self) {
        self.state.lock().await.cache.clear();
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // Remote access: one rate-limiter admission per attempt, retried on
    // transport failures only
    // ═══════════════════════════════════════════════════════════════════════════

    pub(super) async fn fetch_remote(&self) -> Result<Option<Vec<u8>>, StoreError> {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        retry_if("remote_fetch", &self.retry, StoreError::is_retryable, || async move {
            if attempts.fetch_add(1, Ordering::Relaxed) > 0 {
                self.metrics.retried();
            }
            self.limiter.admit().await;
            self.remote.fetch().await
        })
        .await
    }

    pub(super) async fn store_remote(&self, body: &[u8]) -> Result<(), StoreError> {
        let attempts = AtomicUsize::new(0);
        let attempts = &attempts;
        retry_if("remote_store", &self.retry, StoreError::is_retryable, || async move {
            if attempts.fetch_add(1, Ordering::Relaxed) > 0 {
                self.metrics.retried();
            }
            self.limiter.admit().await;
            self.remote.store(body.to_vec()).await
        })
        .await
    }

    /// Count a failed operation in both metric layers.
    pub(super) fn record_failure(&self, component: &str, operation: &str, err: &StoreError) {
        self.metrics.error(err.is_integrity());
        metrics::record_error(component, operation, err.kind());
        if let Some(stage) = err.integrity_stage() {
            metrics::record_integrity_failure(stage);
            warn!(operation, stage, error = %err, "Integrity check failed");
        }
    }
}
