//! Error types for AtlasDoc
//!
//! Provides a unified error type for all operations.

use thiserror::Error;

use crate::document::DocId;

/// Result type alias using AtlasError
pub type Result<T> = std::result::Result<T, AtlasError>;

/// Unified error type for AtlasDoc operations
#[derive(Debug, Error)]
pub enum AtlasError {
    // -------------------------------------------------------------------------
    // I/O Errors
    // -------------------------------------------------------------------------
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Serialization Errors
    // -------------------------------------------------------------------------
    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Document Errors
    // -------------------------------------------------------------------------
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    #[error("Document {id} already exists in table '{table}'")]
    DuplicateIdentity { table: String, id: DocId },

    #[error("Document {id} not found in table '{table}'")]
    DocumentNotFound { table: String, id: DocId },

    #[error("No document ids left in table '{table}'")]
    IdSpaceExhausted { table: String },

    // -------------------------------------------------------------------------
    // Storage Errors
    // -------------------------------------------------------------------------
    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Corrupt table '{table}': key {key:?} is not a document id")]
    CorruptTable { table: String, key: String },

    #[error("Snapshot corruption detected: {0}")]
    SnapshotCorruption(String),

    // -------------------------------------------------------------------------
    // Configuration Errors
    // -------------------------------------------------------------------------
    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<serde_json::Error> for AtlasError {
    fn from(err: serde_json::Error) -> Self {
        AtlasError::Serialization(err.to_string())
    }
}

impl From<bincode::Error> for AtlasError {
    fn from(err: bincode::Error) -> Self {
        AtlasError::Serialization(err.to_string())
    }
}
