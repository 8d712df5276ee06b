//! Error types for the Repodex library.
//!
//! All fallible operations return [`RepodexError`]. The variants line up with
//! the failure classes the indexing and search paths care about:
//!
//! - [`RepodexError::Analysis`]: a malformed analyzer chain, raised when the
//!   analyzer registry is built.
//! - [`RepodexError::Upsert`]: a single document could not be indexed. Batch
//!   indexing logs it and moves on.
//! - [`RepodexError::Commit`]: a commit point could not be written. This ends
//!   the indexing run.
//! - [`RepodexError::QueryParse`]: the query string was rejected.
//! - [`RepodexError::SnapshotUnavailable`]: nothing has been published for
//!   readers yet.
//!
//! # Examples
//!
//! ```
//! use repodex::error::{RepodexError, Result};
//!
//! fn parse(query: &str) -> Result<()> {
//!     if query.trim().is_empty() {
//!         return Err(RepodexError::query_parse("query is empty"));
//!     }
//!     Ok(())
//! }
//!
//! assert!(parse("  ").is_err());
//! ```

use std::io;

use thiserror::Error;

/// The main error type for Repodex operations.
#[derive(Error, Debug)]
pub enum RepodexError {
    /// I/O errors (file operations, sockets, etc.)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Malformed analyzer configuration
    #[error("Analysis error: {0}")]
    Analysis(String),

    /// A single document failed to index
    #[error("Upsert error for '{key}': {reason}")]
    Upsert { key: String, reason: String },

    /// A commit point could not be made durable
    #[error("Commit error: {0}")]
    Commit(String),

    /// The query string could not be parsed
    #[error("Query parse error: {0}")]
    QueryParse(String),

    /// No snapshot has been published yet
    #[error("Snapshot unavailable: {0}")]
    SnapshotUnavailable(String),

    /// Storage backend errors
    #[error("Storage error: {0}")]
    Storage(String),

    /// Upstream record source errors
    #[error("Source error: {0}")]
    Source(String),

    /// Invalid configuration values
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Binary (segment file) serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic error for other cases
    #[error("Error: {0}")]
    Other(String),
}

/// Result type alias for operations that may fail with RepodexError.
pub type Result<T> = std::result::Result<T, RepodexError>;

impl RepodexError {
    /// Create a new analysis error.
    pub fn analysis<S: Into<String>>(msg: S) -> Self {
        RepodexError::Analysis(msg.into())
    }

    /// Create a new upsert error for the document identified by `key`.
    pub fn upsert<K: Into<String>, S: Into<String>>(key: K, reason: S) -> Self {
        RepodexError::Upsert {
            key: key.into(),
            reason: reason.into(),
        }
    }

    /// Create a new commit error.
    pub fn commit<S: Into<String>>(msg: S) -> Self {
        RepodexError::Commit(msg.into())
    }

    /// Create a new query parse error.
    pub fn query_parse<S: Into<String>>(msg: S) -> Self {
        RepodexError::QueryParse(msg.into())
    }

    /// Create a new snapshot unavailable error.
    pub fn snapshot_unavailable<S: Into<String>>(msg: S) -> Self {
        RepodexError::SnapshotUnavailable(msg.into())
    }

    /// Create a new storage error.
    pub fn storage<S: Into<String>>(msg: S) -> Self {
        RepodexError::Storage(msg.into())
    }

    /// Create a new record source error.
    pub fn source<S: Into<String>>(msg: S) -> Self {
        RepodexError::Source(msg.into())
    }

    /// Create a new invalid config error.
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        RepodexError::InvalidConfig(msg.into())
    }

    /// Create a new generic error.
    pub fn other<S: Into<String>>(msg: S) -> Self {
        RepodexError::Other(msg.into())
    }

    /// Whether this error only affects a single document of a batch.
    pub fn is_per_document(&self) -> bool {
        matches!(self, RepodexError::Upsert { .. })
    }
}

impl From<bincode::Error> for RepodexError {
    fn from(err: bincode::Error) -> Self {
        RepodexError::Serialization(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_construction() {
        let error = RepodexError::analysis("no tokenizer");
        assert_eq!(error.to_string(), "Analysis error: no tokenizer");

        let error = RepodexError::upsert("https://x/a", "key is empty");
        assert_eq!(
            error.to_string(),
            "Upsert error for 'https://x/a': key is empty"
        );
        assert!(error.is_per_document());

        let error = RepodexError::commit("disk full");
        assert_eq!(error.to_string(), "Commit error: disk full");
        assert!(!error.is_per_document());
    }

    #[test]
    fn test_io_error_conversion() {
        let io_error = io::Error::new(io::ErrorKind::NotFound, "File not found");
        let error = RepodexError::from(io_error);

        match error {
            RepodexError::Io(_) => {}
            _ => panic!("Expected IO error"),
        }
    }

    #[test]
    fn test_json_error_conversion() {
        let json_error = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let error = RepodexError::from(json_error);
        assert!(matches!(error, RepodexError::Json(_)));
    }
}
