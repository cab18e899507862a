//! MessagePack payload encoding
//!
//! Wire record: `{raw, metadataPacked, sourceHash, commitSha, uploadedAt}`.
//! Per-key metadata is packed separately into `metadataPacked` (a binary
//! field) and only decoded when a caller asks for it.

use crate::error::CacheError;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use glossa_core::{KeyMetadata, SourceHash};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Most keys one file may hold
pub const MAX_KEYS_PER_FILE: usize = 10_000;

/// Largest encoded payload, in bytes
pub const MAX_BYTES_PER_FILE: usize = 5 * 1024 * 1024;

/// Upload limits for one payload
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadLimits {
    pub max_keys: usize,
    pub max_bytes: usize,
}

impl Default for PayloadLimits {
    fn default() -> Self {
        Self {
            max_keys: MAX_KEYS_PER_FILE,
            max_bytes: MAX_BYTES_PER_FILE,
        }
    }
}

/// Decoded payload of one file
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedFilePayload {
    pub key_values: BTreeMap<String, String>,
    pub metadata: BTreeMap<String, KeyMetadata>,
    pub source_hash: SourceHash,
    pub revision_id: String,
    pub stored_at: DateTime<Utc>,
}

impl PackedFilePayload {
    /// Payload from per-key metadata, keyed by each entry's key
    #[must_use]
    pub fn new(
        key_values: BTreeMap<String, String>,
        metadata: impl IntoIterator<Item = KeyMetadata>,
        source_hash: SourceHash,
        revision_id: impl Into<String>,
        stored_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key_values,
            metadata: metadata.into_iter().map(|m| (m.key.clone(), m)).collect(),
            source_hash,
            revision_id: revision_id.into(),
            stored_at,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.key_values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.key_values.is_empty()
    }
}

/// Stored record with lazily decoded metadata
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackedRecord {
    pub raw: BTreeMap<String, String>,
    pub metadata_packed: Bytes,
    pub source_hash: SourceHash,
    pub commit_sha: String,
    pub uploaded_at: DateTime<Utc>,
}

impl PackedRecord {
    /// Decode the packed per-key metadata
    ///
    /// # Errors
    /// Returns [`CacheError::Decode`] if the inner block is corrupt
    pub fn metadata(&self) -> Result<BTreeMap<String, KeyMetadata>, CacheError> {
        if self.metadata_packed.is_empty() {
            return Ok(BTreeMap::new());
        }
        rmp_serde::from_slice(&self.metadata_packed).map_err(|e| CacheError::decode("metadataPacked", e))
    }

    /// Full payload, decoding metadata
    ///
    /// # Errors
    /// Returns [`CacheError::Decode`] if the inner block is corrupt
    pub fn into_payload(self) -> Result<PackedFilePayload, CacheError> {
        let metadata = self.metadata()?;
        Ok(PackedFilePayload {
            key_values: self.raw,
            metadata,
            source_hash: self.source_hash,
            revision_id: self.commit_sha,
            stored_at: self.uploaded_at,
        })
    }
}

/// Encode a payload, enforcing `limits`
///
/// # Errors
/// [`CacheError::TooManyKeys`] / [`CacheError::TooLarge`] when a limit is
/// exceeded, [`CacheError::Encode`] if serialization fails
pub fn encode(payload: &PackedFilePayload, limits: &PayloadLimits) -> Result<Bytes, CacheError> {
    if payload.key_values.len() > limits.max_keys {
        return Err(CacheError::TooManyKeys {
            keys: payload.key_values.len(),
            max: limits.max_keys,
        });
    }

    let metadata_packed = rmp_serde::to_vec_named(&payload.metadata).map_err(|e| CacheError::Encode(e.to_string()))?;
    let record = PackedRecord {
        raw: payload.key_values.clone(),
        metadata_packed: Bytes::from(metadata_packed),
        source_hash: payload.source_hash,
        commit_sha: payload.revision_id.clone(),
        uploaded_at: payload.stored_at,
    };
    let bytes = rmp_serde::to_vec_named(&record).map_err(|e| CacheError::Encode(e.to_string()))?;

    if bytes.len() > limits.max_bytes {
        return Err(CacheError::TooLarge {
            bytes: bytes.len(),
            max: limits.max_bytes,
        });
    }
    Ok(Bytes::from(bytes))
}

/// Decode a stored record without touching its metadata block
///
/// # Errors
/// Returns [`CacheError::Decode`] if the bytes are not a packed record
pub fn decode(key: &str, bytes: &[u8]) -> Result<PackedRecord, CacheError> {
    rmp_serde::from_slice(bytes).map_err(|e| CacheError::decode(key, e))
}
