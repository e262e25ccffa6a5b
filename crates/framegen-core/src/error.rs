//! Error types for FrameGen

use thiserror::Error;

/// The main error type for frame model generation
#[derive(Debug, Error)]
pub enum FrameGenError {
    /// A frame or job identifier did not resolve. Never retried.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The primary asset failed a size or structural check
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Every secondary-format strategy failed and fallback was disabled
    #[error("Conversion exhausted: {0}")]
    ConversionExhausted(String),

    /// Storage or network hiccup expected to clear on retry
    #[error("Transient failure: {0}")]
    Transient(String),

    /// Malformed input that will fail the same way on every attempt
    #[error("Permanent failure: {0}")]
    Permanent(String),

    #[error("Geometry error: {0}")]
    Geometry(String),

    #[error("Export error: {0}")]
    Export(String),

    #[error("Import error: {0}")]
    Import(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Queue error: {0}")]
    Queue(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),

    #[error("JSON error: {0}")]
    JsonError(String),
}

impl FrameGenError {
    /// Whether the orchestrator should schedule another attempt after this error.
    ///
    /// Only unresolved identifiers are terminal on first sight; everything else
    /// is allowed to run out the attempt ceiling.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FrameGenError::NotFound(_))
    }

    /// Short machine-readable category name, used in job records and logs
    pub fn kind(&self) -> &'static str {
        match self {
            FrameGenError::NotFound(_) => "not_found",
            FrameGenError::Validation(_) => "validation",
            FrameGenError::ConversionExhausted(_) => "conversion_exhausted",
            FrameGenError::Transient(_) | FrameGenError::IoError(_) => "transient",
            FrameGenError::Storage(_) | FrameGenError::Persistence(_) => "transient",
            FrameGenError::Permanent(_) | FrameGenError::Geometry(_) => "permanent",
            FrameGenError::Config(_) => "permanent",
            _ => "internal",
        }
    }
}

/// Result type alias for FrameGen operations
pub type Result<T> = std::result::Result<T, FrameGenError>;

impl From<toml::de::Error> for FrameGenError {
    fn from(err: toml::de::Error) -> Self {
        FrameGenError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for FrameGenError {
    fn from(err: toml::ser::Error) -> Self {
        FrameGenError::TomlSerError(err.to_string())
    }
}

impl From<serde_json::Error> for FrameGenError {
    fn from(err: serde_json::Error) -> Self {
        FrameGenError::JsonError(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_is_terminal() {
        assert!(!FrameGenError::NotFound("frame-1".into()).is_retryable());
        assert!(FrameGenError::Transient("timeout".into()).is_retryable());
        assert!(FrameGenError::Permanent("bad spec".into()).is_retryable());
        assert!(FrameGenError::Validation("too big".into()).is_retryable());
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(FrameGenError::NotFound("x".into()).kind(), "not_found");
        assert_eq!(FrameGenError::Storage("x".into()).kind(), "transient");
        assert_eq!(FrameGenError::Geometry("x".into()).kind(), "permanent");
    }

    #[test]
    fn test_toml_error_conversion() {
        let err: FrameGenError = toml::from_str::<toml::Value>("= broken").unwrap_err().into();
        assert!(matches!(err, FrameGenError::TomlParseError(_)));
    }
}
