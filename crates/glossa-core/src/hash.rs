//! Source hashing primitives
//!
//! Provides [`SourceHash`], the short content digest that decides whether an
//! overlay edit still matches the source text it was written against.

use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

/// Number of digest bytes kept (16 hex characters)
pub const SOURCE_HASH_LEN: usize = 8;

/// Truncated SHA-256 digest of a source value
///
/// Deterministic and cheap to copy. Rendered as 16 lowercase hex characters,
/// which is also its serialized form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SourceHash([u8; SOURCE_HASH_LEN]);

impl SourceHash {
    /// Create from raw bytes
    #[inline]
    #[must_use]
    pub const fn new(bytes: [u8; SOURCE_HASH_LEN]) -> Self {
        Self(bytes)
    }

    /// Hash a source value
    #[must_use]
    pub fn of(value: &str) -> Self {
        Self::compute(value.as_bytes())
    }

    /// Hash arbitrary bytes
    #[must_use]
    pub fn compute(data: &[u8]) -> Self {
        let digest = Sha256::digest(data);
        let mut arr = [0u8; SOURCE_HASH_LEN];
        arr.copy_from_slice(&digest[..SOURCE_HASH_LEN]);
        Self(arr)
    }

    /// Underlying bytes
    #[inline]
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; SOURCE_HASH_LEN] {
        &self.0
    }

    /// Create from a byte slice
    ///
    /// # Errors
    /// Returns error if the slice is not exactly 8 bytes
    pub fn from_slice(bytes: &[u8]) -> Result<Self, HashError> {
        if bytes.len() != SOURCE_HASH_LEN {
            return Err(HashError::InvalidLength {
                expected: SOURCE_HASH_LEN,
                actual: bytes.len(),
            });
        }
        let mut arr = [0u8; SOURCE_HASH_LEN];
        arr.copy_from_slice(bytes);
        Ok(Self(arr))
    }
}

impl Display for SourceHash {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl FromStr for SourceHash {
    type Err = HashError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = hex::decode(s)?;
        Self::from_slice(&bytes)
    }
}

impl serde::Serialize for SourceHash {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> serde::Deserialize<'de> for SourceHash {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Hash every value in order
#[must_use]
pub fn batch_hash<S: AsRef<str>>(values: &[S]) -> Vec<SourceHash> {
    values.iter().map(|v| SourceHash::of(v.as_ref())).collect()
}

/// Hash a whole key/value map
///
/// The map is serialized as key-sorted JSON first, so insertion order never
/// changes the result.
#[must_use]
pub fn file_hash(values: &BTreeMap<String, String>) -> SourceHash {
    // BTreeMap<String, String> always serializes
    let json = serde_json::to_vec(values).unwrap_or_default();
    SourceHash::compute(&json)
}

/// Errors that can occur when working with source hashes
#[derive(Debug, thiserror::Error)]
pub enum HashError {
    /// Invalid hash length
    #[error("invalid hash length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    /// Hex encoding error
    #[error("hex decode error: {0}")]
    HexDecode(#[from] hex::FromHexError),
}
