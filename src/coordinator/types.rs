// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Public types for the document store coordinator.

use crate::error::StoreError;

/// Where a read was answered from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadSource {
    /// Fresh in-memory value, no network
    Cache,
    /// Fetched and verified from the remote
    Remote,
    /// Remote unusable; local file copy
    Fallback,
    /// Nothing anywhere
    Empty,
}

impl ReadSource {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Remote => "remote",
            Self::Fallback => "fallback",
            Self::Empty => "empty",
        }
    }
}

impl std::fmt::Display for ReadSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A read, with enough detail to see which stage failed.
///
/// Used by [`super::DocStore::read_detailed()`]. `remote_error` is set when
/// the remote was tried and failed, whether or not the fallback then
/// supplied a value.
#[derive(Debug)]
pub struct ReadOutcome<T> {
    pub value: Option<T>,
    pub source: ReadSource,
    pub remote_error: Option<StoreError>,
}

impl<T> ReadOutcome<T> {
    pub(super) fn hit(value: T, source: ReadSource) -> Self {
        Self {
            value: Some(value),
            source,
            remote_error: None,
        }
    }
}

/// Result of a successful write call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Unchanged since the last acknowledged value; nothing was sent.
    Skipped,
    /// The remote acknowledged the document.
    Written {
        /// Sequence number recorded in the envelope's `versionIndex`
        version_index: u64,
        /// Serialized size before any transform
        original_bytes: usize,
        /// Payload size after compression and encryption
        stored_bytes: usize,
        compressed: bool,
        encrypted: bool,
    },
}

impl WriteOutcome {
    #[must_use]
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped)
    }

    #[must_use]
    pub fn version_index(&self) -> Option<u64> {
        match self {
            Self::Written { version_index, .. } => Some(*version_index),
            Self::Skipped => None,
        }
    }
}

impl std::fmt::Display for WriteOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Skipped => write!(f, "Skipped"),
            Self::Written {
                version_index,
                original_bytes,
                stored_bytes,
                ..
            } => write!(
                f,
                "Written(v{}, {} → {} bytes)",
                version_index, original_bytes, stored_bytes
            ),
        }
    }
}
