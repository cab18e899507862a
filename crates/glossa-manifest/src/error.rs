//! Error types for manifest and side-file parsing

/// Errors while reading a manifest
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    /// No valid `header` record anywhere in the input
    #[error("manifest has no header record")]
    NoHeader,

    /// A single line could not be decoded
    #[error("malformed record on line {line}: {message}")]
    Malformed { line: usize, message: String },
}

impl ManifestError {
    /// Create malformed-line error
    pub fn malformed(line: usize, message: impl Into<String>) -> Self {
        Self::Malformed {
            line,
            message: message.into(),
        }
    }

    /// Whether parsing can continue past this error
    #[inline]
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Malformed { .. })
    }
}
