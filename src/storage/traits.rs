// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::StoreError;

/// The one remote document a store is bound to.
///
/// Implementations move raw bodies only; enveloping, retries and rate
/// limiting live in [`crate::DocStore`]. A single call is a single attempt.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Current body, or `None` when the remote holds no document
    /// (404 or empty body).
    async fn fetch(&self) -> Result<Option<Vec<u8>>, StoreError>;

    /// Replace the document with `body`.
    async fn store(&self, body: Vec<u8>) -> Result<(), StoreError>;
}

#[async_trait]
impl<R: RemoteStore + ?Sized> RemoteStore for Arc<R> {
    async fn fetch(&self) -> Result<Option<Vec<u8>>, StoreError> {
        (**self).fetch().await
    }

    async fn store(&self, body: Vec<u8>) -> Result<(), StoreError> {
        (**self).store(body).await
    }
}
