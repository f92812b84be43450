//! Error types for LoRA Atlas.
//!
//! Combination errors abort only the request that raised them. Identity and
//! classification errors are per-artifact: batch passes record them and move on.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the LoRA Atlas library.
#[derive(Debug, Error)]
pub enum AtlasError {
    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    // Catalog lookups
    #[error("Artifact not found: {stable_id}")]
    ArtifactNotFound { stable_id: String },

    #[error("Configuration set not found: {id}")]
    ConfigurationNotFound { id: i64 },

    #[error("Block profile {profile_id} not found for {stable_id}")]
    ProfileNotFound { stable_id: String, profile_id: i64 },

    // Identity errors
    #[error("Stable id {stable_id} is still referenced by a saved configuration or profile")]
    DuplicateIdentity { stable_id: String },

    #[error("Invalid stable id: {value}")]
    InvalidStableId { value: String },

    // Layout errors
    #[error("No layout rule matched {signal}; artifact marked unknown")]
    UnknownLayout { signal: String },

    // Combination errors
    #[error("No eligible artifacts remain after validation")]
    EmptyCombination {
        /// Exclusions collected before the request failed, as `stable_id: reason`.
        excluded: Vec<String>,
    },

    #[error("Invalid cap {cap}: must be a positive, finite number")]
    InvalidCap { cap: f64 },

    #[error("Artifact {stable_id} is incompatible: {reason}")]
    IncompatibleArtifact { stable_id: String, reason: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid parameters: {message}")]
    InvalidParams { message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for LoRA Atlas operations.
pub type Result<T> = std::result::Result<T, AtlasError>;

impl From<std::io::Error> for AtlasError {
    fn from(err: std::io::Error) -> Self {
        AtlasError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for AtlasError {
    fn from(err: rusqlite::Error) -> Self {
        AtlasError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl AtlasError {
    /// Create an IO error with path context.
    pub fn io_with_path(err: std::io::Error, path: impl Into<PathBuf>) -> Self {
        AtlasError::Io {
            message: err.to_string(),
            path: Some(path.into()),
            source: Some(err),
        }
    }

    /// Shorthand for a field validation failure.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        AtlasError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Convert to a JSON-RPC error code.
    ///
    /// Standard codes: -32602 invalid params, -32603 internal error.
    ///
    /// Application codes (-32000 to -32099):
    /// - -32002: Artifact, configuration set or profile not found
    /// - -32005: Validation error
    /// - -32006: Combination request rejected
    /// - -32007: Identity conflict
    pub fn to_rpc_error_code(&self) -> i32 {
        match self {
            AtlasError::ArtifactNotFound { .. }
            | AtlasError::ConfigurationNotFound { .. }
            | AtlasError::ProfileNotFound { .. } => -32002,

            AtlasError::Validation { .. }
            | AtlasError::InvalidStableId { .. }
            | AtlasError::UnknownLayout { .. } => -32005,

            AtlasError::EmptyCombination { .. }
            | AtlasError::InvalidCap { .. }
            | AtlasError::IncompatibleArtifact { .. } => -32006,

            AtlasError::DuplicateIdentity { .. } => -32007,

            AtlasError::InvalidParams { .. } => -32602,

            _ => -32603,
        }
    }

    /// Whether the error only affects a single artifact inside a batch pass.
    pub fn is_per_artifact(&self) -> bool {
        matches!(
            self,
            AtlasError::DuplicateIdentity { .. }
                | AtlasError::UnknownLayout { .. }
                | AtlasError::IncompatibleArtifact { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AtlasError::ArtifactNotFound {
            stable_id: "FLX-PPL-001".into(),
        };
        assert_eq!(err.to_string(), "Artifact not found: FLX-PPL-001");

        let err = AtlasError::InvalidCap { cap: -1.0 };
        assert_eq!(
            err.to_string(),
            "Invalid cap -1: must be a positive, finite number"
        );
    }

    #[test]
    fn test_rpc_error_codes() {
        assert_eq!(
            AtlasError::ConfigurationNotFound { id: 4 }.to_rpc_error_code(),
            -32002
        );
        assert_eq!(
            AtlasError::EmptyCombination { excluded: vec![] }.to_rpc_error_code(),
            -32006
        );
        assert_eq!(
            AtlasError::DuplicateIdentity {
                stable_id: "SDX-STL-002".into()
            }
            .to_rpc_error_code(),
            -32007
        );
        assert_eq!(AtlasError::Other("boom".into()).to_rpc_error_code(), -32603);
    }

    #[test]
    fn test_per_artifact_errors() {
        assert!(AtlasError::DuplicateIdentity {
            stable_id: "FLX-PPL-001".into()
        }
        .is_per_artifact());
        assert!(!AtlasError::InvalidCap { cap: 0.0 }.is_per_artifact());
    }
}
