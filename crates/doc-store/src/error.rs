use thiserror::Error;

use crate::{DocumentPath, Version};

/// Errors that can occur when interacting with the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A document read by a transaction changed before the transaction committed.
    #[error(
        "Transaction conflict on {path}: expected version {expected:?}, found {actual:?}"
    )]
    Conflict {
        path: DocumentPath,
        expected: Option<Version>,
        actual: Option<Version>,
    },

    /// The transaction kept conflicting until the retry budget ran out.
    #[error("Transaction aborted after {attempts} conflicting attempts")]
    RetriesExhausted { attempts: u32 },

    /// An update targeted a document that does not exist.
    #[error("Document not found: {0}")]
    NotFound(DocumentPath),

    /// A transaction attempted a read after buffering a write.
    #[error("Transaction reads must happen before writes (read of {0})")]
    ReadAfterWrite(DocumentPath),

    /// A document body was not a JSON object.
    #[error("Document {0} must be a JSON object")]
    NotAnObject(DocumentPath),

    /// A path string could not be parsed.
    #[error("Invalid document path: {0}")]
    InvalidPath(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A serialization/deserialization error occurred.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A write was rejected by an injected fault (in-memory store only).
    #[error("Injected fault while writing {0}")]
    InjectedFault(DocumentPath),
}

impl StoreError {
    /// Returns true if the error is an optimistic concurrency conflict that
    /// can be resolved by re-running the transaction.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict { .. })
    }
}

/// Result type for document store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
