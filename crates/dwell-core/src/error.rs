//! Error types for the orchestrator
//!
//! Provides error handling for:
//! - Record source failures (transient, schema, total unavailability)
//! - Configuration loading and validation
//!
//! Per-entity problems never show up here: they are absorbed at the entity
//! boundary. Deadline exhaustion is not an error either; it yields a partial
//! result with a warning.

use std::path::PathBuf;

/// Record source errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SourceError {
    /// Source cannot be reached at all
    #[error("source unavailable: {0}")]
    Unavailable(String),

    /// Temporary failure; the page may be retried
    #[error("transient source failure: {0}")]
    Transient(String),

    /// Source rejected a requested field
    #[error("schema mismatch: field {field} is not available")]
    SchemaMismatch {
        /// Rejected field
        field: String,
    },

    /// Pagination token was not recognized
    #[error("invalid page token: {0}")]
    InvalidPageToken(String),

    /// Snapshot could not be loaded or decoded
    #[error("failed to load records: {0}")]
    Load(String),
}

impl SourceError {
    /// Check if the failed page may be retried as-is
    #[inline]
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    /// Check if narrowing the requested fields may help
    #[inline]
    #[must_use]
    pub fn is_schema_mismatch(&self) -> bool {
        matches!(self, Self::SchemaMismatch { .. })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A value is out of range
    #[error("invalid configuration: {0}")]
    Invalid(String),

    /// TOML could not be parsed
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// Configuration file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        /// File that was read
        path: PathBuf,
        /// Underlying I/O error
        source: std::io::Error,
    },
}

/// Main orchestrator error type
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Nothing could be retrieved from the record source
    #[error("record source unavailable: {0}")]
    SourceUnavailable(#[source] SourceError),

    /// Configuration rejected
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Reconstruction task panicked or was cancelled
    #[error("timeline reconstruction failed: {0}")]
    Reconstruction(String),
}

impl EngineError {
    /// Check if the error came from the record source
    #[inline]
    #[must_use]
    pub fn is_source_failure(&self) -> bool {
        matches!(self, Self::SourceUnavailable(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_error_is_retryable() {
        assert!(SourceError::Transient("blip".to_string()).is_retryable());
        assert!(!SourceError::Unavailable("down".to_string()).is_retryable());
        assert!(!SourceError::SchemaMismatch {
            field: "appliedDate".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn schema_mismatch_display() {
        let err = SourceError::SchemaMismatch {
            field: "onboardedDate".to_string(),
        };
        assert!(err.is_schema_mismatch());
        assert!(err.to_string().contains("onboardedDate"));
    }

    #[test]
    fn engine_error_wraps_source() {
        let err = EngineError::SourceUnavailable(SourceError::Unavailable("down".to_string()));
        assert!(err.is_source_failure());
        assert!(err.to_string().contains("record source unavailable"));
    }
}
