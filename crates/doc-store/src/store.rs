use std::pin::Pin;

use async_trait::async_trait;
use futures_core::Stream;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::{CollectionPath, Document, DocumentPath, Query, Result, StoreError, Version};

/// A buffered write, applied when its transaction commits.
#[derive(Debug, Clone)]
pub enum Write {
    /// Replaces the whole document, creating it if needed.
    Set { path: DocumentPath, data: Value },

    /// Writes the given top-level fields, keeping every other field.
    /// Creates the document if it does not exist.
    Merge { path: DocumentPath, data: Value },

    /// Like `Merge`, but the document must already exist.
    Update { path: DocumentPath, data: Value },

    /// Removes the document. Deleting a missing document is not an error.
    Delete { path: DocumentPath },
}

impl Write {
    /// Returns the path this write targets.
    pub fn path(&self) -> &DocumentPath {
        match self {
            Write::Set { path, .. }
            | Write::Merge { path, .. }
            | Write::Update { path, .. }
            | Write::Delete { path } => path,
        }
    }
}

/// The state a transaction observed for one document.
///
/// `expected == None` means the document did not exist when it was read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Precondition {
    pub path: DocumentPath,
    pub expected: Option<Version>,
}

/// An atomic batch: every precondition must still hold, then every write is
/// applied, all or nothing.
#[derive(Debug, Clone, Default)]
pub struct Commit {
    pub preconditions: Vec<Precondition>,
    pub writes: Vec<Write>,
}

impl Commit {
    /// Creates a commit holding a single unconditional write.
    pub fn single(write: Write) -> Self {
        Self {
            preconditions: Vec::new(),
            writes: vec![write],
        }
    }
}

/// A stream of documents.
pub type DocumentStream = Pin<Box<dyn Stream<Item = Result<Document>> + Send>>;

/// Core trait for document store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a single document.
    ///
    /// Returns None if the document doesn't exist.
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>>;

    /// Runs a collection query.
    async fn query(&self, query: &Query) -> Result<Vec<Document>>;

    /// Streams every document of a collection in path order.
    async fn stream_collection(&self, collection: &CollectionPath) -> Result<DocumentStream>;

    /// Atomically validates preconditions and applies writes.
    ///
    /// Fails with `StoreError::Conflict` if any precondition no longer holds,
    /// in which case nothing is written.
    async fn commit(&self, commit: Commit) -> Result<()>;
}

/// Extension trait providing single-write conveniences outside transactions.
#[async_trait]
pub trait DocumentStoreExt: DocumentStore {
    /// Replaces a document with the serialized value.
    async fn set<T: Serialize + Sync>(&self, path: &DocumentPath, value: &T) -> Result<()> {
        let data = to_object(path, value)?;
        self.commit(Commit::single(Write::Set {
            path: path.clone(),
            data,
        }))
        .await
    }

    /// Merges the serialized value into a document.
    async fn merge<T: Serialize + Sync>(&self, path: &DocumentPath, value: &T) -> Result<()> {
        let data = to_object(path, value)?;
        self.commit(Commit::single(Write::Merge {
            path: path.clone(),
            data,
        }))
        .await
    }

    /// Deletes a document.
    async fn delete(&self, path: &DocumentPath) -> Result<()> {
        self.commit(Commit::single(Write::Delete { path: path.clone() }))
            .await
    }

    /// Checks if a document exists.
    async fn exists(&self, path: &DocumentPath) -> Result<bool> {
        Ok(self.get(path).await?.is_some())
    }
}

// Blanket implementation for all DocumentStore implementations
impl<T: DocumentStore + ?Sized> DocumentStoreExt for T {}

/// Serializes a value and checks that it is a JSON object.
pub fn to_object<T: Serialize + ?Sized>(path: &DocumentPath, value: &T) -> Result<Value> {
    let data = serde_json::to_value(value)?;
    if data.is_object() {
        Ok(data)
    } else {
        Err(StoreError::NotAnObject(path.clone()))
    }
}

/// Shallow merge of `patch` into `base`: top-level keys of `patch` win.
pub fn merge_fields(base: &mut Map<String, Value>, patch: &Value) {
    if let Value::Object(fields) = patch {
        for (key, value) in fields {
            base.insert(key.clone(), value.clone());
        }
    }
}

/// Validates a commit before it touches storage.
pub fn validate_commit(commit: &Commit) -> Result<()> {
    for write in &commit.writes {
        match write {
            Write::Set { path, data } | Write::Merge { path, data } | Write::Update { path, data }
                if !data.is_object() =>
            {
                return Err(StoreError::NotAnObject(path.clone()));
            }
            _ => {}
        }
    }
    Ok(())
}
