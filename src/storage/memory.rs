// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;

use super::traits::RemoteStore;
use crate::error::StoreError;

/// In-process remote holding one body. Counts calls so tests can assert
/// how many requests an operation made.
#[derive(Debug, Default)]
pub struct InMemoryRemote {
    body: Mutex<Option<Vec<u8>>>,
    fetches: AtomicU64,
    stores: AtomicU64,
}

impl InMemoryRemote {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with `body` already stored, as if another writer put it there.
    #[must_use]
    pub fn with_body(body: impl Into<Vec<u8>>) -> Self {
        let remote = Self::new();
        remote.set_body(body);
        remote
    }

    /// Current body
    #[must_use]
    pub fn body(&self) -> Option<Vec<u8>> {
        self.body.lock().clone()
    }

    /// Overwrite the body without counting a store call
    pub fn set_body(&self, body: impl Into<Vec<u8>>) {
        *self.body.lock() = Some(body.into());
    }

    pub fn clear(&self) {
        *self.body.lock() = None;
    }

    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetches.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn store_count(&self) -> u64 {
        self.stores.load(Ordering::SeqCst)
    }

    /// Fetches plus stores
    #[must_use]
    pub fn request_count(&self) -> u64 {
        self.fetch_count() + self.store_count()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn fetch(&self) -> Result<Option<Vec<u8>>, StoreError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        Ok(self.body.lock().clone().filter(|b| !b.is_empty()))
    }

    async fn store(&self, body: Vec<u8>) -> Result<(), StoreError> {
        self.stores.fetch_add(1, Ordering::SeqCst);
        *self.body.lock() = Some(body);
        Ok(())
    }
}
