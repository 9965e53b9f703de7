// error.rs: Error types for the store boundary.

use std::path::PathBuf;

use thiserror::Error;

use crate::document::Collection;

/// Errors raised by a [`DocumentStore`](crate::DocumentStore) backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A file I/O operation failed.
    #[error("I/O error at {path}: {source}")]
    IoError {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Failed to serialize/deserialize the store snapshot.
    #[error("serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// A batch update targeted a document that does not exist.
    #[error("document not found: {collection}/{id}")]
    DocumentNotFound { collection: Collection, id: String },

    /// The backend could not serve the request (network fault, injected failure).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

/// A stored document does not have the shape its collection requires.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    #[error("{collection}/{id}: missing field '{field}'")]
    MissingField {
        collection: Collection,
        id: String,
        field: &'static str,
    },

    #[error("{collection}/{id}: invalid field '{field}': {reason}")]
    InvalidField {
        collection: Collection,
        id: String,
        field: &'static str,
        reason: String,
    },
}
