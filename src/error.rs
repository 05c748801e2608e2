//! Centralized error types for digestnorm.
//!
//! Only run-level failures live here. Problems with a single message never
//! become errors: they are recorded as flags on the record instead.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the digestnorm library.
#[derive(Error, Debug)]
pub enum DigestError {
    /// I/O error with the associated file path.
    #[error("I/O error on '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The input directory does not exist or holds no archive files.
    #[error("No archive files found in {0}")]
    NoInputFiles(PathBuf),

    /// A non-empty archive file produced zero messages. This means the
    /// delimiter no longer matches the file format.
    #[error("'{path}' is not empty ({bytes} bytes) but contains no digest delimiter")]
    NoChunks { path: PathBuf, bytes: usize },

    /// A static table (aliases, denylist, spam signals) could not be loaded.
    #[error("Invalid configuration in '{source_name}': {reason}")]
    InvalidConfig { source_name: String, reason: String },

    /// A configured regular expression failed to compile.
    #[error("Invalid pattern '{pattern}' in {context}: {reason}")]
    InvalidPattern {
        context: String,
        pattern: String,
        reason: String,
    },

    /// Denylisted ids that are no longer present in the stage input.
    #[error("Artifact denylist is stale: {} id(s) not found in input: {}", .0.len(), .0.join(", "))]
    StaleDenylist(Vec<String>),

    /// The denylist was written for a different identifier scheme.
    #[error("Artifact denylist uses id scheme '{found}', records use '{expected}'")]
    SchemeMismatch { expected: String, found: String },

    /// A snapshot file could not be read or written as JSON.
    #[error("Snapshot error in '{path}': {source}")]
    Snapshot {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Convenience alias for `Result<T, DigestError>`.
pub type Result<T> = std::result::Result<T, DigestError>;

impl DigestError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `InvalidConfig` variant for a named table.
    pub fn config(source_name: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            source_name: source_name.into(),
            reason: reason.into(),
        }
    }

    /// `true` for errors raised while loading static configuration.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::InvalidConfig { .. }
                | Self::InvalidPattern { .. }
                | Self::StaleDenylist(_)
                | Self::SchemeMismatch { .. }
        )
    }
}
