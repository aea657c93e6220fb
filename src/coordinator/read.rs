// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Read path: cache → remote → fallback.
//!
//! ```text
//! cache fresh? ── yes ──────────────────────────────────────────► value
//!      │ no
//! fetch (retry, rate-limited) ─ classify body ─ open envelope ─ decode
//!      │ ok: cache + save fallback ─────────────────────────────► value
//!      │ empty / any failure
//! fallback file ── present ─────────────────────────────────────► value
//!      │ missing or corrupt
//!      ▼
//!    None
//! ```

use std::time::Instant;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{DocStore, ReadOutcome, ReadSource};
use crate::envelope::RemoteBody;
use crate::error::StoreError;
use crate::metrics::{self, LatencyTimer};
use crate::storage::traits::RemoteStore;

impl<T, R> DocStore<T, R>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    R: RemoteStore,
{
    /// Current document, or `None` if neither the remote nor the local
    /// fallback has one.
    ///
    /// Never fails: remote and integrity problems are logged, counted and
    /// answered from the fallback. Use [`read_detailed`](Self::read_detailed)
    /// to see what went wrong.
    pub async fn read(&self) -> Option<T> {
        self.read_detailed().await.value
    }

    /// Like [`read`](Self::read), reporting where the value came from and
    /// the remote error that forced a fallback, if any.
    pub async fn read_detailed(&self) -> ReadOutcome<T> {
        let _timer = LatencyTimer::new("read");
        let started = Instant::now();
        let mut state = self.state.lock().await;

        if let Some(value) = state.cache.get() {
            debug!("Read answered from cache");
            self.metrics.read_from_cache();
            metrics::record_read(ReadSource::Cache.as_str());
            return ReadOutcome::hit(value, ReadSource::Cache);
        }

        let remote_error = match self.read_remote().await {
            Ok(Some(value)) => {
                if let Err(e) = state.cache.set(value.clone()) {
                    warn!(error = %e, "Could not cache remote document");
                }
                if self.fallback.is_pending() {
                    // The local copy holds a newer, unsynced write.
                    warn!("Keeping pending local write; not overwriting fallback with remote copy");
                } else {
                    self.fallback.save(&value).await;
                }
                self.metrics.read_from_remote(started.elapsed());
                metrics::record_read(ReadSource::Remote.as_str());
                return ReadOutcome::hit(value, ReadSource::Remote);
            }
            Ok(None) => {
                debug!("Remote holds no document");
                None
            }
            Err(e) => {
                self.record_failure("remote", "read", &e);
                warn!(error = %e, "Remote read failed, trying local fallback");
                Some(e)
            }
        };

        match self.fallback.load().await {
            Some(value) => {
                info!(path = %self.fallback.path().display(), "Read answered from local fallback");
                self.metrics.read_from_fallback(started.elapsed());
                metrics::record_fallback("read", true);
                metrics::record_read(ReadSource::Fallback.as_str());
                ReadOutcome {
                    value: Some(value),
                    source: ReadSource::Fallback,
                    remote_error,
                }
            }
            None => {
                self.metrics.read_empty(started.elapsed());
                metrics::record_fallback("read", false);
                metrics::record_read(ReadSource::Empty.as_str());
                ReadOutcome {
                    value: None,
                    source: ReadSource::Empty,
                    remote_error,
                }
            }
        }
    }

    /// Fetch and fully verify the remote document.
    async fn read_remote(&self) -> Result<Option<T>, StoreError> {
        let Some(body) = self.fetch_remote().await? else {
            return Ok(None);
        };

        let serialized = match RemoteBody::parse(&body)? {
            RemoteBody::Enveloped(envelope) => {
                debug!(
                    version_index = envelope.metadata.version_index,
                    compressed = envelope.metadata.compressed,
                    encrypted = envelope.metadata.encrypted,
                    "Opening remote envelope"
                );
                self.pipeline.open(&envelope)?
            }
            RemoteBody::Bare(bytes) => {
                debug!(bytes = bytes.len(), "Remote body is a bare document");
                bytes
            }
        };

        Ok(Some(self.codec.decode(&serialized)?))
    }
}
