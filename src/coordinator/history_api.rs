// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! History and recovery operations:
//! - `version()` / `versions()` - audit past write attempts
//! - `restore_version()` - roll the remote back to a past snapshot
//! - `resync()` - push a write that only reached the local fallback

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{info, warn};

use super::{DocStore, WriteOutcome};
use crate::error::StoreError;
use crate::history::VersionEntry;
use crate::metrics;
use crate::storage::traits::RemoteStore;

impl<T, R> DocStore<T, R>
where
    T: Serialize + DeserializeOwned + Clone + Send + Sync + 'static,
    R: RemoteStore,
{
    /// History entry at `index`; negative indices count from the newest
    /// (`-1` is the last write attempt).
    pub async fn version(&self, index: isize) -> Option<VersionEntry<T>> {
        self.state.lock().await.history.get(index).cloned()
    }

    /// All retained history entries, oldest first.
    pub async fn versions(&self) -> Vec<VersionEntry<T>> {
        self.state.lock().await.history.iter().cloned().collect()
    }

    /// Write the snapshot at `index` back to the remote.
    ///
    /// Goes through the normal pipeline but never skips, even when the
    /// snapshot equals the cached value, and is itself recorded in history.
    pub async fn restore_version(&self, index: isize) -> Result<WriteOutcome, StoreError> {
        let mut state = self.state.lock().await;
        let entry = state
            .history
            .get(index)
            .cloned()
            .ok_or(StoreError::VersionNotFound(index))?;

        info!(index, sequence = entry.sequence, "Restoring version");
        self.write_locked(&mut state, &entry.snapshot, false, "restore")
            .await
    }

    /// Push the local fallback to the remote if an earlier write never
    /// reached it.
    ///
    /// Returns `Ok(true)` when a pending document was pushed, `Ok(false)`
    /// when there was nothing to do.
    pub async fn resync(&self) -> Result<bool, StoreError> {
        let mut state = self.state.lock().await;
        if !self.fallback.is_pending() {
            return Ok(false);
        }

        let value = match self.fallback.try_load().await {
            Ok(Some(value)) => value,
            Ok(None) => {
                warn!("Pending marker without a fallback document, clearing it");
                self.fallback.clear_pending().await;
                metrics::set_pending_resync(false);
                return Ok(false);
            }
            Err(e) => {
                self.record_failure("fallback", "resync", &e);
                return Err(e);
            }
        };

        info!(path = %self.fallback.path().display(), "Resyncing pending local write");
        self.write_locked(&mut state, &value, false, "resync").await?;
        Ok(true)
    }
}
