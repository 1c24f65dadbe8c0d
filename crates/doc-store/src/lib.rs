//! Hierarchical document store used as the backing store of the marketplace.
//!
//! Documents are JSON objects addressed by slash-separated paths
//! (`shops/{shopId}/history/{orderId}`). The store offers point reads,
//! equality-filtered ordered queries and multi-document transactions with
//! optimistic concurrency control.

pub mod document;
pub mod error;
pub mod memory;
pub mod path;
pub mod postgres;
pub mod query;
pub mod store;
pub mod transaction;

pub use document::{Document, Version};
pub use error::{Result, StoreError};
pub use memory::InMemoryDocumentStore;
pub use path::{CollectionPath, DocumentPath};
pub use postgres::PostgresDocumentStore;
pub use query::{Cursor, Direction, FieldFilter, OrderBy, Query};
pub use store::{Commit, DocumentStore, DocumentStoreExt, DocumentStream, Precondition, Write};
pub use transaction::{RetryPolicy, Transaction, TransactionWork, run_transaction};
