// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write path.
//!
//! ```text
//! changed? ── no (differential, nothing pending) ────────────► Skipped
//!    │ yes
//! serialize ─ push version ─ seal (checksum, compress, encrypt)
//!    │
//! store (retry, rate-limited)
//!    ├─ ok:   cache, save fallback, clear pending ────────────► Written
//!    └─ fail: save fallback, mark pending ────────────────────► WriteFailed
//! ```

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error, warn};

use super::{DocStore, StoreState, WriteOutcome};
use crate::codec::CodecError;
use crate::error::StoreError;
use crate::metrics::{self, LatencyTimer};
use crate::storage::traits::RemoteStore;
use crate::util::now_millis;

impl<T, R> DocStore<T, R>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    R: RemoteStore,
{
    /// Persist `value` to the remote.
    ///
    /// Unchanged documents are skipped when differential sync is on and no
    /// earlier failed write is waiting in the local fallback. If the
    /// remote stays unreachable the document is kept in the local fallback
    /// and [`StoreError::WriteFailed`] reports whether that save worked.
    pub async fn write(&self, value: &T) -> Result<WriteOutcome, StoreError> {
        let mut state = self.state.lock().await;
        self.write_locked(&mut state, value, self.config.differential_sync, "write")
            .await
    }

    /// Write with the state lock already held. `allow_skip` enables the
    /// unchanged-document shortcut.
    pub(super) async fn write_locked(
        &self,
        state: &mut StoreState<T>,
        value: &T,
        allow_skip: bool,
        operation: &'static str,
    ) -> Result<WriteOutcome, StoreError> {
        let _timer = LatencyTimer::new(operation);
        let started = Instant::now();

        // While a local write is pending the cache holds the last
        // acknowledged value, not the newest one; never skip then.
        if allow_skip && !self.fallback.is_pending() && !state.cache.has_changed(value)? {
            debug!("Document unchanged, skipping remote write");
            self.metrics.write_skipped();
            metrics::record_write("skipped", 0, 0);
            return Ok(WriteOutcome::Skipped);
        }

        let serialized = self.codec.encode(value)?;
        let version_index = state.history.push_serialized(value, &serialized);
        metrics::set_history_depth(state.history.len());

        match self.seal_and_store(&serialized, version_index).await {
            Ok(outcome) => {
                if let Err(e) = state.cache.set(value.clone()) {
                    warn!(error = %e, "Could not cache written document");
                    state.cache.clear();
                }
                self.fallback.save(value).await;
                self.fallback.clear_pending().await;
                metrics::set_pending_resync(false);

                if let WriteOutcome::Written {
                    original_bytes,
                    stored_bytes,
                    ..
                } = outcome
                {
                    self.metrics
                        .write_succeeded(original_bytes, stored_bytes, started.elapsed());
                    metrics::record_write("written", original_bytes, stored_bytes);
                }
                debug!(%outcome, "Write acknowledged");
                Ok(outcome)
            }
            Err(source) => {
                self.record_failure("remote", operation, &source);
                let saved_locally = self.fallback.save(value).await;
                if saved_locally {
                    self.fallback.mark_pending().await;
                    metrics::set_pending_resync(true);
                }
                metrics::record_fallback(operation, saved_locally);
                self.metrics.write_failed();
                metrics::record_write("failed", 0, 0);
                error!(
                    version_index,
                    saved_locally,
                    error = %source,
                    "Remote write failed"
                );
                Err(StoreError::WriteFailed {
                    saved_locally,
                    source: Box::new(source),
                })
            }
        }
    }

    async fn seal_and_store(
        &self,
        serialized: &[u8],
        version_index: u64,
    ) -> Result<WriteOutcome, StoreError> {
        let sealed = self.pipeline.seal(serialized, now_millis(), version_index)?;
        let body = sealed
            .envelope
            .to_bytes()
            .map_err(|e| CodecError::Serialize(e.to_string()))?;

        self.store_remote(&body).await?;

        Ok(WriteOutcome::Written {
            version_index,
            original_bytes: sealed.stats.original_bytes,
            stored_bytes: sealed.stats.compressed_bytes,
            compressed: sealed.envelope.metadata.compressed,
            encrypted: sealed.envelope.metadata.encrypted,
        })
    }
}
