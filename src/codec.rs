// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Document serialization hooks.
//!
//! A [`DocumentCodec`] turns the application's document into bytes and back.
//! The bytes it produces are what the checksum covers, what the compression
//! and encryption stages transform, and what the local fallback file holds.
//!
//! The default [`JsonCodec`] writes pretty JSON. Binary fields inside a
//! document round-trip through [`base64_bytes`]:
//!
//! ```
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Serialize, Deserialize)]
//! struct Avatar {
//!     name: String,
//!     #[serde(with = "doc_sync::codec::base64_bytes")]
//!     png: Vec<u8>,
//! }
//! ```

use std::marker::PhantomData;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("serialize failed: {0}")]
    Serialize(String),

    #[error("deserialize failed: {0}")]
    Deserialize(String),
}

/// Pluggable Document ↔ bytes conversion.
pub trait DocumentCodec<T>: Send + Sync {
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError>;
    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError>;
}

/// JSON codec, pretty-printed by default.
#[derive(Debug, Clone, Copy)]
pub struct JsonCodec<T> {
    pretty: bool,
    _doc: PhantomData<fn() -> T>,
}

impl<T> JsonCodec<T> {
    #[must_use]
    pub fn pretty() -> Self {
        Self { pretty: true, _doc: PhantomData }
    }

    #[must_use]
    pub fn compact() -> Self {
        Self { pretty: false, _doc: PhantomData }
    }
}

impl<T> Default for JsonCodec<T> {
    fn default() -> Self {
        Self::pretty()
    }
}

impl<T> DocumentCodec<T> for JsonCodec<T>
where
    T: Serialize + DeserializeOwned,
{
    fn encode(&self, value: &T) -> Result<Vec<u8>, CodecError> {
        let result = if self.pretty {
            serde_json::to_vec_pretty(value)
        } else {
            serde_json::to_vec(value)
        };
        result.map_err(|e| CodecError::Serialize(e.to_string()))
    }

    fn decode(&self, bytes: &[u8]) -> Result<T, CodecError> {
        serde_json::from_slice(bytes).map_err(|e| CodecError::Deserialize(e.to_string()))
    }
}

/// Canonical bytes for hashing: the value is lowered to `serde_json::Value`,
/// whose object map is ordered, so equal documents hash equally no matter
/// what map type the application used.
pub fn canonical_bytes<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let lowered = serde_json::to_value(value).map_err(|e| CodecError::Serialize(e.to_string()))?;
    serde_json::to_vec(&lowered).map_err(|e| CodecError::Serialize(e.to_string()))
}

/// SHA-256 of [`canonical_bytes`], hex encoded.
pub fn content_hash<T: Serialize>(value: &T) -> Result<String, CodecError> {
    let bytes = canonical_bytes(value)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Serde helper storing `Vec<u8>` fields as standard base64 strings.
pub mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(serde::de::Error::custom)
    }
}
