// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Local file fallback for when the remote cannot serve a request.
//!
//! Holds the last document the store successfully wrote or read, in the
//! codec's own format, so an operator can inspect it by hand. Saving is best
//! effort: failures are logged and counted, never returned, because the
//! fallback must not become a new reason for an operation to fail.
//!
//! A sidecar `<path>.pending` marker records that the local copy holds a
//! write the remote never acknowledged. It survives restarts so a later
//! [`crate::DocStore::resync`] can push it.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::codec::DocumentCodec;
use crate::error::StoreError;

/// Fallback state for observability
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FallbackStats {
    pub saves: u64,
    pub save_failures: u64,
    pub loads: u64,
    pub corrupt_loads: u64,
    /// Whether the local copy is ahead of the remote
    pub pending: bool,
}

pub struct LocalFallback<T> {
    path: PathBuf,
    marker: PathBuf,
    codec: Arc<dyn DocumentCodec<T>>,
    saves: AtomicU64,
    save_failures: AtomicU64,
    loads: AtomicU64,
    corrupt_loads: AtomicU64,
    pending: AtomicBool,
}

impl<T> LocalFallback<T> {
    /// Create a fallback at `path`. Picks up a pending marker left by a
    /// previous run.
    pub fn new(path: impl AsRef<Path>, codec: Arc<dyn DocumentCodec<T>>) -> Self {
        let path = path.as_ref().to_path_buf();
        let marker = sibling(&path, "pending");
        let pending = marker.exists();
        if pending {
            warn!(path = %path.display(), "Fallback has a write from a previous run that never reached the remote");
        }
        Self {
            path,
            marker,
            codec,
            saves: AtomicU64::new(0),
            save_failures: AtomicU64::new(0),
            loads: AtomicU64::new(0),
            corrupt_loads: AtomicU64::new(0),
            pending: AtomicBool::new(pending),
        }
    }

    /// Persist `value`. Returns whether the file was written.
    ///
    /// Writes a sibling temp file and renames it over the target, so a crash
    /// leaves either the old or the new document, never a torn one.
    pub async fn save(&self, value: &T) -> bool {
        match self.try_save(value).await {
            Ok(bytes) => {
                self.saves.fetch_add(1, Ordering::Relaxed);
                debug!(path = %self.path.display(), bytes, "Fallback saved");
                true
            }
            Err(e) => {
                self.save_failures.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_fallback_save_failure();
                error!(path = %self.path.display(), error = %e, "Failed to save local fallback");
                false
            }
        }
    }

    async fn try_save(&self, value: &T) -> Result<usize, String> {
        let bytes = self.codec.encode(value).map_err(|e| e.to_string())?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| format!("create {}: {e}", parent.display()))?;
        }
        let tmp = sibling(&self.path, "tmp");
        tokio::fs::write(&tmp, &bytes)
            .await
            .map_err(|e| format!("write {}: {e}", tmp.display()))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| format!("rename into {}: {e}", self.path.display()))?;
        Ok(bytes.len())
    }

    /// The stored document, or `None` if missing or unreadable.
    pub async fn load(&self) -> Option<T> {
        match self.try_load().await {
            Ok(value) => value,
            Err(e) => {
                warn!(error = %e, "Ignoring unreadable local fallback");
                None
            }
        }
    }

    /// Like [`load`](Self::load) but reports a corrupt file.
    pub async fn try_load(&self) -> Result<Option<T>, StoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                self.corrupt_loads.fetch_add(1, Ordering::Relaxed);
                return Err(StoreError::CorruptLocalState {
                    path: self.path.clone(),
                    reason: e.to_string(),
                });
            }
        };

        match self.codec.decode(&bytes) {
            Ok(value) => {
                self.loads.fetch_add(1, Ordering::Relaxed);
                Ok(Some(value))
            }
            Err(e) => {
                self.corrupt_loads.fetch_add(1, Ordering::Relaxed);
                crate::metrics::record_error("fallback", "load", "corrupt_local_state");
                Err(StoreError::CorruptLocalState {
                    path: self.path.clone(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// Record that the local copy is ahead of the remote.
    pub async fn mark_pending(&self) {
        self.pending.store(true, Ordering::Release);
        if let Err(e) = tokio::fs::write(&self.marker, b"").await {
            warn!(marker = %self.marker.display(), error = %e, "Failed to persist pending marker");
        }
    }

    pub async fn clear_pending(&self) {
        if !self.pending.swap(false, Ordering::AcqRel) {
            return;
        }
        match tokio::fs::remove_file(&self.marker).await {
            Ok(()) => info!(path = %self.path.display(), "Fallback caught up with remote"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(marker = %self.marker.display(), error = %e, "Failed to remove pending marker"),
        }
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn stats(&self) -> FallbackStats {
        FallbackStats {
            saves: self.saves.load(Ordering::Relaxed),
            save_failures: self.save_failures.load(Ordering::Relaxed),
            loads: self.loads.load(Ordering::Relaxed),
            corrupt_loads: self.corrupt_loads.load(Ordering::Relaxed),
            pending: self.is_pending(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// `state.json` → `state.json.<suffix>`
fn sibling(path: &Path, suffix: &str) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".");
    name.push(suffix);
    path.with_file_name(name)
}
