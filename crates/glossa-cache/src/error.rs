//! Error types for the cache layer

/// Errors from payload storage and encoding
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Object store failure
    #[error("object store error for {key}: {message}")]
    Store { key: String, message: String },

    /// Payload could not be encoded
    #[error("encode error: {0}")]
    Encode(String),

    /// Stored bytes could not be decoded
    #[error("decode error for {key}: {message}")]
    Decode { key: String, message: String },

    /// Payload has more keys than one file may hold
    #[error("too many keys: {keys} (max {max})")]
    TooManyKeys { keys: usize, max: usize },

    /// Encoded payload exceeds the size limit
    #[error("payload too large: {bytes} bytes (max {max})")]
    TooLarge { bytes: usize, max: usize },
}

impl CacheError {
    /// Create store error for key
    pub fn store(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Store {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Create decode error for key
    pub fn decode(key: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            key: key.into(),
            message: message.to_string(),
        }
    }

    /// Check if retrying the same operation may succeed
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Store { .. })
    }

    /// Check if the payload itself was rejected
    #[must_use]
    pub fn is_limit(&self) -> bool {
        matches!(self, Self::TooManyKeys { .. } | Self::TooLarge { .. })
    }
}
