//! Error types for the metadata builder

/// Errors decoding a translation file into a key/value map
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// JSON syntax error
    #[error("invalid JSON in {path}: {message}")]
    Json { path: String, message: String },

    /// TOML syntax error
    #[error("invalid TOML in {path}: {message}")]
    Toml { path: String, message: String },

    /// Opening `+++` fence without a closing one
    #[error("unterminated front-matter in {path}")]
    FrontMatter { path: String },

    /// Document root is not a key/value table
    #[error("root of {path} is not an object")]
    NotAnObject { path: String },

    /// No decoder for the file extension
    #[error("unsupported file extension: '{0}'")]
    UnsupportedExtension(String),
}

impl ParseError {
    /// Create JSON syntax error for path
    pub fn json(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Json {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Create TOML syntax error for path
    pub fn toml(path: impl Into<String>, message: impl ToString) -> Self {
        Self::Toml {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// Path of the offending file, when known
    #[must_use]
    pub fn path(&self) -> Option<&str> {
        match self {
            Self::Json { path, .. }
            | Self::Toml { path, .. }
            | Self::FrontMatter { path }
            | Self::NotAnObject { path } => Some(path),
            Self::UnsupportedExtension(_) => None,
        }
    }
}
