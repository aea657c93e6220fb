// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Last-known-value cache with content hashing.
//!
//! Holds at most one document. Answers two questions for the store:
//! - *Is it fresh?* An entry older than the TTL counts as absent, so reads
//!   go back to the remote.
//! - *Has it changed?* Writes whose content hash matches the cached hash are
//!   skipped entirely (differential sync).
//!
//! Hashing uses [`crate::codec::content_hash`], which is independent of map
//! iteration order.

use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;
use tracing::debug;

use crate::codec::{content_hash, CodecError};
use crate::util::now_millis;

#[derive(Debug, Clone)]
pub struct CacheEntry<T> {
    pub value: T,
    /// Wall-clock store time (epoch millis), for reporting
    pub timestamp_millis: i64,
    /// Hash of `value` at the time it was stored
    pub content_hash: String,
    stored_at: Instant,
}

#[derive(Debug)]
pub struct DocumentCache<T> {
    entry: Option<CacheEntry<T>>,
    ttl: Duration,
}

impl<T: Serialize + Clone> DocumentCache<T> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { entry: None, ttl }
    }

    /// Store `value`, replacing whatever was cached.
    pub fn set(&mut self, value: T) -> Result<(), CodecError> {
        let content_hash = content_hash(&value)?;
        self.entry = Some(CacheEntry {
            value,
            timestamp_millis: now_millis(),
            content_hash,
            stored_at: Instant::now(),
        });
        Ok(())
    }

    /// The cached value if still fresh. An expired entry is dropped.
    pub fn get(&mut self) -> Option<T> {
        if self.is_valid() {
            return self.entry.as_ref().map(|e| e.value.clone());
        }
        if self.entry.take().is_some() {
            debug!(ttl_ms = self.ttl.as_millis() as u64, "Cache entry expired");
        }
        None
    }

    /// Freshness check without side effects.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.entry
            .as_ref()
            .is_some_and(|e| e.stored_at.elapsed() <= self.ttl)
    }

    /// True if nothing is cached or `candidate` hashes differently.
    ///
    /// Freshness is not considered: a stale entry still describes what the
    /// remote last acknowledged.
    pub fn has_changed(&self, candidate: &T) -> Result<bool, CodecError> {
        match &self.entry {
            None => Ok(true),
            Some(entry) => Ok(content_hash(candidate)? != entry.content_hash),
        }
    }

    #[must_use]
    pub fn entry(&self) -> Option<&CacheEntry<T>> {
        self.entry.as_ref()
    }

    pub fn clear(&mut self) {
        self.entry = None;
    }

    #[must_use]
    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
