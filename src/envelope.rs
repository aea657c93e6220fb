// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Wire format for the remote document.
//!
//! ```text
//! {
//!   "data": "<base64 payload>",
//!   "metadata": {
//!     "timestamp": 1735689600000,
//!     "checksum": "<sha256 hex of the serialized document>",
//!     "compressed": true,
//!     "compressionType": "gzip",
//!     "originalSize": 48213,
//!     "encrypted": true,
//!     "iv": "<base64>",
//!     "authTag": "<base64>",
//!     "salt": "<base64>",
//!     "versionIndex": 12
//!   }
//! }
//! ```
//!
//! Older deployments stored the document as a bare JSON body. Reads model
//! both shapes with [`RemoteBody`] instead of probing for fields ad hoc.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::IntegrityError;
use crate::pipeline::compression::CompressionKind;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnvelopeMetadata {
    /// Write time (epoch millis)
    pub timestamp: i64,
    /// SHA-256 hex of the serialized document, before compression/encryption
    pub checksum: String,
    pub compressed: bool,
    #[serde(default)]
    pub compression_type: CompressionKind,
    /// Serialized size before compression
    pub original_size: usize,
    #[serde(default)]
    pub encrypted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iv: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_tag: Option<String>,
    /// Key-derivation salt; absent on envelopes from the fixed-salt era
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub salt: Option<String>,
    /// Sequence number of the version this envelope was written from
    #[serde(default)]
    pub version_index: u64,
}

impl EnvelopeMetadata {
    /// Enforce the flag/field pairing rules.
    pub fn validate(&self) -> Result<(), IntegrityError> {
        match (self.compressed, self.compression_type) {
            (true, CompressionKind::None) => {
                return Err(IntegrityError::MalformedEnvelope(
                    "compressed=true without a compressionType".into(),
                ));
            }
            (false, kind) if kind != CompressionKind::None => {
                return Err(IntegrityError::MalformedEnvelope(format!(
                    "compressed=false but compressionType={kind}"
                )));
            }
            _ => {}
        }
        if self.encrypted && (self.iv.is_none() || self.auth_tag.is_none()) {
            return Err(IntegrityError::MalformedEnvelope(
                "encrypted=true requires both iv and authTag".into(),
            ));
        }
        if self.checksum.is_empty() {
            return Err(IntegrityError::MalformedEnvelope("missing checksum".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub data: String,
    pub metadata: EnvelopeMetadata,
}

impl Envelope {
    #[must_use]
    pub fn new(payload: &[u8], metadata: EnvelopeMetadata) -> Self {
        Self {
            data: STANDARD.encode(payload),
            metadata,
        }
    }

    /// Decoded payload bytes.
    pub fn payload(&self) -> Result<Vec<u8>, IntegrityError> {
        STANDARD
            .decode(self.data.as_bytes())
            .map_err(|e| IntegrityError::MalformedEnvelope(format!("payload is not base64: {e}")))
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec(self)
    }
}

/// A body fetched from the remote, classified by shape.
#[derive(Debug, Clone, PartialEq)]
pub enum RemoteBody {
    Enveloped(Envelope),
    /// Legacy body: the serialized document itself.
    Bare(Vec<u8>),
}

impl RemoteBody {
    /// Classify a response body.
    ///
    /// A JSON object carrying both a string `data` and an object `metadata`
    /// is an envelope and must parse and validate as one; any other JSON is
    /// a bare document. Non-JSON is rejected.
    pub fn parse(bytes: &[u8]) -> Result<Self, IntegrityError> {
        let value: Value = serde_json::from_slice(bytes)
            .map_err(|e| IntegrityError::MalformedEnvelope(format!("body is not JSON: {e}")))?;

        let looks_enveloped = value
            .as_object()
            .map(|obj| {
                obj.get("data").is_some_and(Value::is_string)
                    && obj.get("metadata").is_some_and(Value::is_object)
            })
            .unwrap_or(false);

        if !looks_enveloped {
            return Ok(Self::Bare(bytes.to_vec()));
        }

        let envelope: Envelope = serde_json::from_value(value)
            .map_err(|e| IntegrityError::MalformedEnvelope(e.to_string()))?;
        envelope.metadata.validate()?;
        Ok(Self::Enveloped(envelope))
    }
}
