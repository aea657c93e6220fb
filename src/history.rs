// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Bounded version history.
//!
//! Every write attempt appends a snapshot before the network call, so the
//! history also records writes the remote never acknowledged. Oldest
//! entries are evicted first once `max_versions` is reached.

use std::collections::VecDeque;

use crate::codec::{CodecError, DocumentCodec};
use crate::pipeline::checksum::checksum;
use crate::util::now_millis;

#[derive(Debug, Clone, PartialEq)]
pub struct VersionEntry<T> {
    pub snapshot: T,
    pub timestamp_millis: i64,
    /// SHA-256 of the snapshot as serialized by the store's codec
    pub checksum: String,
    /// Monotonic write counter; survives eviction of older entries
    pub sequence: u64,
}

#[derive(Debug)]
pub struct VersionHistory<T> {
    entries: VecDeque<VersionEntry<T>>,
    max_versions: usize,
    next_sequence: u64,
}

impl<T: Clone> VersionHistory<T> {
    #[must_use]
    pub fn new(max_versions: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(max_versions.min(64)),
            max_versions: max_versions.max(1),
            next_sequence: 0,
        }
    }

    /// Append a copy of `snapshot`. Returns its sequence number.
    pub fn push(&mut self, snapshot: &T, codec: &dyn DocumentCodec<T>) -> Result<u64, CodecError> {
        let serialized = codec.encode(snapshot)?;
        Ok(self.push_serialized(snapshot, &serialized))
    }

    /// Append when the caller already holds the serialized form.
    pub fn push_serialized(&mut self, snapshot: &T, serialized: &[u8]) -> u64 {
        let sequence = self.next_sequence;
        self.next_sequence += 1;

        self.entries.push_back(VersionEntry {
            snapshot: snapshot.clone(),
            timestamp_millis: now_millis(),
            checksum: checksum(serialized),
            sequence,
        });
        while self.entries.len() > self.max_versions {
            self.entries.pop_front();
        }
        sequence
    }

    /// Entry at `index`; negative indices count from the end (`-1` = newest).
    #[must_use]
    pub fn get(&self, index: isize) -> Option<&VersionEntry<T>> {
        let len = self.entries.len() as isize;
        let resolved = if index < 0 { len + index } else { index };
        if resolved < 0 || resolved >= len {
            return None;
        }
        self.entries.get(resolved as usize)
    }

    #[must_use]
    pub fn latest(&self) -> Option<&VersionEntry<T>> {
        self.entries.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &VersionEntry<T>> {
        self.entries.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Writes recorded since creation, including evicted ones.
    #[must_use]
    pub fn total_pushed(&self) -> u64 {
        self.next_sequence
    }

    #[must_use]
    pub fn max_versions(&self) -> usize {
        self.max_versions
    }
}
