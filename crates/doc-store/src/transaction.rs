use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::store::to_object;
use crate::{
    Commit, Document, DocumentPath, DocumentStore, Precondition, Query, Result, StoreError,
    Version, Write,
};

/// Default number of attempts before a conflicting transaction gives up.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;

/// How many times a conflicting transaction is re-run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
}

impl RetryPolicy {
    /// Creates a policy with the given attempt budget (at least one attempt).
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
        }
    }

    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self::new(1)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_ATTEMPTS)
    }
}

/// A read-then-write unit of work against the store.
///
/// Reads go through the transaction and are recorded with the version they
/// observed; writes are buffered. Nothing reaches the store until `commit`,
/// which fails with a conflict if any read document changed meanwhile.
///
/// Reads must all happen before the first write.
pub struct Transaction<'a, S: DocumentStore + ?Sized> {
    store: &'a S,
    reads: HashMap<DocumentPath, Option<Version>>,
    writes: Vec<Write>,
}

impl<'a, S: DocumentStore + ?Sized> Transaction<'a, S> {
    /// Starts a new transaction against the store.
    pub fn begin(store: &'a S) -> Self {
        Self {
            store,
            reads: HashMap::new(),
            writes: Vec::new(),
        }
    }

    /// Reads a document and records its version.
    ///
    /// A document read twice must not have changed in between.
    pub async fn get(&mut self, path: &DocumentPath) -> Result<Option<Document>> {
        if !self.writes.is_empty() {
            return Err(StoreError::ReadAfterWrite(path.clone()));
        }

        let doc = self.store.get(path).await?;
        let observed = doc.as_ref().map(|d| d.version);

        if let Some(previous) = self.reads.get(path)
            && *previous != observed
        {
            return Err(StoreError::Conflict {
                path: path.clone(),
                expected: *previous,
                actual: observed,
            });
        }
        self.reads.insert(path.clone(), observed);

        Ok(doc)
    }

    /// Runs a query and records the version of every returned document.
    ///
    /// Documents added to the collection meanwhile are not detected; callers
    /// that need a stable result set also read a document that every writer
    /// of the collection updates.
    pub async fn query(&mut self, query: &Query) -> Result<Vec<Document>> {
        if !self.writes.is_empty() {
            return Err(StoreError::ReadAfterWrite(query.collection.doc("*")));
        }

        let docs = self.store.query(query).await?;
        for doc in &docs {
            if let Some(previous) = self.reads.get(&doc.path)
                && *previous != Some(doc.version)
            {
                return Err(StoreError::Conflict {
                    path: doc.path.clone(),
                    expected: *previous,
                    actual: Some(doc.version),
                });
            }
            self.reads.insert(doc.path.clone(), Some(doc.version));
        }
        Ok(docs)
    }

    /// Buffers a full overwrite of a document.
    pub fn set<T: Serialize + ?Sized>(&mut self, path: &DocumentPath, value: &T) -> Result<()> {
        let data = to_object(path, value)?;
        self.writes.push(Write::Set {
            path: path.clone(),
            data,
        });
        Ok(())
    }

    /// Buffers a merge-write of the value's top-level fields.
    pub fn merge<T: Serialize + ?Sized>(&mut self, path: &DocumentPath, value: &T) -> Result<()> {
        let data = to_object(path, value)?;
        self.writes.push(Write::Merge {
            path: path.clone(),
            data,
        });
        Ok(())
    }

    /// Buffers a field update of an existing document.
    pub fn update(&mut self, path: &DocumentPath, fields: Value) -> Result<()> {
        if !fields.is_object() {
            return Err(StoreError::NotAnObject(path.clone()));
        }
        self.writes.push(Write::Update {
            path: path.clone(),
            data: fields,
        });
        Ok(())
    }

    /// Buffers a deletion.
    pub fn delete(&mut self, path: &DocumentPath) {
        self.writes.push(Write::Delete { path: path.clone() });
    }

    /// Returns the number of buffered writes.
    pub fn pending_writes(&self) -> usize {
        self.writes.len()
    }

    /// Commits the transaction: preconditions from every read plus all writes.
    pub async fn commit(self) -> Result<()> {
        if self.writes.is_empty() {
            return Ok(());
        }

        let preconditions = self
            .reads
            .into_iter()
            .map(|(path, expected)| Precondition { path, expected })
            .collect();

        let started = Instant::now();
        let result = self
            .store
            .commit(Commit {
                preconditions,
                writes: self.writes,
            })
            .await;
        metrics::histogram!("doc_store_commit_duration_seconds")
            .record(started.elapsed().as_secs_f64());
        result
    }
}

/// A transaction body that can be re-run on conflict.
///
/// Implementations must only read and buffer writes through the transaction;
/// any other side effect would be repeated on retry.
#[async_trait]
pub trait TransactionWork<S: DocumentStore + ?Sized>: Send + Sync {
    /// Value produced by a successful run.
    type Output: Send;

    /// Error type of the body. Store errors must convert into it.
    type Error: From<StoreError> + Send;

    /// Runs the body once against a fresh transaction.
    async fn run(&self, tx: &mut Transaction<'_, S>) -> std::result::Result<Self::Output, Self::Error>;
}

/// Runs a unit of work in a transaction, re-running it on commit conflicts.
///
/// Errors raised by the body abort the transaction without writing anything.
pub async fn run_transaction<S, W>(
    store: &S,
    policy: RetryPolicy,
    work: &W,
) -> std::result::Result<W::Output, W::Error>
where
    S: DocumentStore + ?Sized,
    W: TransactionWork<S>,
{
    let mut attempt = 1;
    loop {
        let mut tx = Transaction::begin(store);
        let output = work.run(&mut tx).await?;

        match tx.commit().await {
            Ok(()) => return Ok(output),
            Err(err) if err.is_conflict() => {
                metrics::counter!("doc_store_transaction_retries_total").increment(1);
                if attempt >= policy.max_attempts {
                    tracing::warn!(attempts = attempt, error = %err, "transaction retries exhausted");
                    return Err(StoreError::RetriesExhausted { attempts: attempt }.into());
                }
                tracing::debug!(attempt, error = %err, "transaction conflict, retrying");
                attempt += 1;
            }
            Err(err) => return Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;
    use crate::{CollectionPath, DocumentStoreExt, InMemoryDocumentStore};
    use serde_json::json;

    fn counter_path() -> DocumentPath {
        CollectionPath::root("counters").doc("c1")
    }

    #[tokio::test]
    async fn commit_applies_buffered_writes() {
        let store = InMemoryDocumentStore::new();
        let mut tx = Transaction::begin(&store);
        assert!(tx.get(&counter_path()).await.unwrap().is_none());
        tx.set(&counter_path(), &json!({"n": 1})).unwrap();
        assert_eq!(tx.pending_writes(), 1);
        tx.commit().await.unwrap();

        let doc = store.get(&counter_path()).await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"n": 1}));
    }

    #[tokio::test]
    async fn read_after_write_is_rejected() {
        let store = InMemoryDocumentStore::new();
        let mut tx = Transaction::begin(&store);
        tx.set(&counter_path(), &json!({"n": 1})).unwrap();
        let result = tx.get(&counter_path()).await;
        assert!(matches!(result, Err(StoreError::ReadAfterWrite(_))));
    }

    #[tokio::test]
    async fn stale_read_conflicts_on_commit() {
        let store = InMemoryDocumentStore::new();
        store.set(&counter_path(), &json!({"n": 1})).await.unwrap();

        let mut tx = Transaction::begin(&store);
        tx.get(&counter_path()).await.unwrap();

        // Concurrent writer bumps the version.
        store.set(&counter_path(), &json!({"n": 5})).await.unwrap();

        tx.set(&counter_path(), &json!({"n": 2})).unwrap();
        let result = tx.commit().await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));

        let doc = store.get(&counter_path()).await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"n": 5}));
    }

    #[tokio::test]
    async fn queried_documents_are_guarded() {
        let store = InMemoryDocumentStore::new();
        let items = CollectionPath::root("items");
        store.set(&items.doc("a"), &json!({"n": 1})).await.unwrap();

        let mut tx = Transaction::begin(&store);
        let docs = tx.query(&Query::collection(items.clone())).await.unwrap();
        assert_eq!(docs.len(), 1);

        store.set(&items.doc("a"), &json!({"n": 2})).await.unwrap();

        tx.set(&counter_path(), &json!({"n": 1})).unwrap();
        let result = tx.commit().await;
        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert!(!store.exists(&counter_path()).await.unwrap());
    }

    struct Increment {
        runs: AtomicU32,
        interfere: bool,
        store: InMemoryDocumentStore,
    }

    #[async_trait]
    impl TransactionWork<InMemoryDocumentStore> for Increment {
        type Output = i64;
        type Error = StoreError;

        async fn run(
            &self,
            tx: &mut Transaction<'_, InMemoryDocumentStore>,
        ) -> Result<i64> {
            let run = self.runs.fetch_add(1, Ordering::SeqCst);
            let current = tx
                .get(&counter_path())
                .await?
                .and_then(|d| d.field("n").and_then(Value::as_i64))
                .unwrap_or(0);

            if self.interfere && run == 0 {
                self.store
                    .set(&counter_path(), &json!({"n": current + 10}))
                    .await?;
            }

            tx.set(&counter_path(), &json!({"n": current + 1}))?;
            Ok(current + 1)
        }
    }

    #[tokio::test]
    async fn run_transaction_retries_after_conflict() {
        let store = InMemoryDocumentStore::new();
        let work = Increment {
            runs: AtomicU32::new(0),
            interfere: true,
            store: store.clone(),
        };

        let value = run_transaction(&store, RetryPolicy::default(), &work)
            .await
            .unwrap();

        assert_eq!(work.runs.load(Ordering::SeqCst), 2);
        assert_eq!(value, 11);
    }

    #[tokio::test]
    async fn run_transaction_gives_up_after_budget() {
        let store = InMemoryDocumentStore::new();
        let work = Increment {
            runs: AtomicU32::new(0),
            interfere: true,
            store: store.clone(),
        };

        let result = run_transaction(&store, RetryPolicy::no_retry(), &work).await;
        assert!(matches!(
            result,
            Err(StoreError::RetriesExhausted { attempts: 1 })
        ));
    }
}
