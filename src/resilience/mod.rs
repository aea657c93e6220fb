// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Keeping the store usable when the remote is slow, flaky or gone.
//!
//! - [`rate_limiter`]: sliding-window admission for outbound requests
//! - [`retry`]: exponential backoff shared by reads and writes
//! - [`fallback`]: the local file copy and its pending-resync marker

pub mod fallback;
pub mod rate_limiter;
pub mod retry;
