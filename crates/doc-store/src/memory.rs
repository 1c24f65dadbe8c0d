use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use tokio::sync::RwLock;

use crate::store::{merge_fields, validate_commit};
use crate::{
    CollectionPath, Commit, Document, DocumentPath, DocumentStore, DocumentStream, Query, Result,
    StoreError, Version, Write,
};

#[derive(Debug, Clone)]
struct StoredDocument {
    version: Version,
    data: Map<String, Value>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl StoredDocument {
    fn to_document(&self, path: &DocumentPath) -> Document {
        Document {
            path: path.clone(),
            version: self.version,
            data: Value::Object(self.data.clone()),
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// In-memory document store implementation for tests and local runs.
///
/// Commits are applied to a copy of the document map which replaces the live
/// map only once every write succeeded, so a failing write leaves no trace.
#[derive(Clone, Default)]
pub struct InMemoryDocumentStore {
    documents: Arc<RwLock<BTreeMap<DocumentPath, StoredDocument>>>,
    faults: Arc<RwLock<HashSet<DocumentPath>>>,
}

impl InMemoryDocumentStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the total number of documents stored.
    pub async fn document_count(&self) -> usize {
        self.documents.read().await.len()
    }

    /// Clears all documents and injected faults.
    pub async fn clear(&self) {
        self.documents.write().await.clear();
        self.faults.write().await.clear();
    }

    /// Makes every commit that writes to `path` fail mid-apply.
    pub async fn fail_writes_to(&self, path: DocumentPath) {
        self.faults.write().await.insert(path);
    }

    /// Removes an injected fault.
    pub async fn heal(&self, path: &DocumentPath) {
        self.faults.write().await.remove(path);
    }
}

fn apply_write(
    docs: &mut BTreeMap<DocumentPath, StoredDocument>,
    write: Write,
    now: DateTime<Utc>,
) -> Result<()> {
    match write {
        Write::Set { path, data } => {
            let fields = into_fields(&path, data)?;
            let (version, created_at) = match docs.get(&path) {
                Some(existing) => (existing.version.next(), existing.created_at),
                None => (Version::first(), now),
            };
            docs.insert(
                path,
                StoredDocument {
                    version,
                    data: fields,
                    created_at,
                    updated_at: now,
                },
            );
        }
        Write::Merge { path, data } => match docs.get_mut(&path) {
            Some(existing) => {
                merge_fields(&mut existing.data, &data);
                existing.version = existing.version.next();
                existing.updated_at = now;
            }
            None => {
                let fields = into_fields(&path, data)?;
                docs.insert(
                    path,
                    StoredDocument {
                        version: Version::first(),
                        data: fields,
                        created_at: now,
                        updated_at: now,
                    },
                );
            }
        },
        Write::Update { path, data } => {
            let existing = docs
                .get_mut(&path)
                .ok_or_else(|| StoreError::NotFound(path.clone()))?;
            merge_fields(&mut existing.data, &data);
            existing.version = existing.version.next();
            existing.updated_at = now;
        }
        Write::Delete { path } => {
            docs.remove(&path);
        }
    }
    Ok(())
}

fn into_fields(path: &DocumentPath, data: Value) -> Result<Map<String, Value>> {
    match data {
        Value::Object(fields) => Ok(fields),
        _ => Err(StoreError::NotAnObject(path.clone())),
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn get(&self, path: &DocumentPath) -> Result<Option<Document>> {
        let docs = self.documents.read().await;
        Ok(docs.get(path).map(|d| d.to_document(path)))
    }

    async fn query(&self, query: &Query) -> Result<Vec<Document>> {
        let docs = self.documents.read().await;
        let mut matched: Vec<Document> = docs
            .iter()
            .filter(|(path, _)| path.collection() == &query.collection)
            .map(|(path, stored)| stored.to_document(path))
            .filter(|doc| query.matches(doc.path.id(), &doc.data))
            .collect();

        // Stable sort keeps id order for ties
        matched.sort_by(|a, b| query.compare(&a.data, &b.data));

        if let Some(limit) = query.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn stream_collection(&self, collection: &CollectionPath) -> Result<DocumentStream> {
        use futures_util::stream;

        let docs = self.documents.read().await;
        let snapshot: Vec<Document> = docs
            .iter()
            .filter(|(path, _)| path.collection() == collection)
            .map(|(path, stored)| stored.to_document(path))
            .collect();

        Ok(Box::pin(stream::iter(snapshot.into_iter().map(Ok))))
    }

    async fn commit(&self, commit: Commit) -> Result<()> {
        validate_commit(&commit)?;

        let faults = self.faults.read().await;
        let mut docs = self.documents.write().await;

        for pre in &commit.preconditions {
            let actual = docs.get(&pre.path).map(|d| d.version);
            if actual != pre.expected {
                return Err(StoreError::Conflict {
                    path: pre.path.clone(),
                    expected: pre.expected,
                    actual,
                });
            }
        }

        let now = Utc::now();
        let mut staged = docs.clone();
        for write in commit.writes {
            if faults.contains(write.path()) {
                tracing::debug!(path = %write.path(), "injected write fault");
                return Err(StoreError::InjectedFault(write.path().clone()));
            }
            apply_write(&mut staged, write, now)?;
        }
        *docs = staged;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CollectionPath, Direction, DocumentStoreExt, Precondition};
    use serde_json::json;

    fn orders() -> CollectionPath {
        CollectionPath::root("orders")
    }

    #[tokio::test]
    async fn set_and_get_document() {
        let store = InMemoryDocumentStore::new();
        let path = orders().doc("o1");

        store.set(&path, &json!({"status": "prepare"})).await.unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.version, Version::first());
        assert_eq!(doc.data["status"], "prepare");
        assert_eq!(store.document_count().await, 1);
    }

    #[tokio::test]
    async fn merge_keeps_unrelated_fields() {
        let store = InMemoryDocumentStore::new();
        let path = orders().doc("o1");

        store.set(&path, &json!({"a": 1, "b": 2})).await.unwrap();
        store.merge(&path, &json!({"b": 3})).await.unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.data, json!({"a": 1, "b": 3}));
        assert_eq!(doc.version, Version::new(2));
    }

    #[tokio::test]
    async fn update_of_missing_document_fails() {
        let store = InMemoryDocumentStore::new();
        let result = store
            .commit(Commit::single(Write::Update {
                path: orders().doc("missing"),
                data: json!({"status": "done"}),
            }))
            .await;
        assert!(matches!(result, Err(StoreError::NotFound(_))));
    }

    #[tokio::test]
    async fn failed_precondition_writes_nothing() {
        let store = InMemoryDocumentStore::new();
        let existing = orders().doc("o1");
        store.set(&existing, &json!({"n": 1})).await.unwrap();

        let commit = Commit {
            preconditions: vec![Precondition {
                path: existing.clone(),
                expected: None,
            }],
            writes: vec![Write::Set {
                path: orders().doc("o2"),
                data: json!({"n": 2}),
            }],
        };
        let result = store.commit(commit).await;

        assert!(matches!(result, Err(StoreError::Conflict { .. })));
        assert!(!store.exists(&orders().doc("o2")).await.unwrap());
    }

    #[tokio::test]
    async fn injected_fault_rolls_back_earlier_writes() {
        let store = InMemoryDocumentStore::new();
        let first = orders().doc("o1");
        let second = orders().doc("o2");
        store.fail_writes_to(second.clone()).await;

        let commit = Commit {
            preconditions: vec![],
            writes: vec![
                Write::Set {
                    path: first.clone(),
                    data: json!({"n": 1}),
                },
                Write::Set {
                    path: second.clone(),
                    data: json!({"n": 2}),
                },
            ],
        };
        let result = store.commit(commit).await;

        assert!(matches!(result, Err(StoreError::InjectedFault(_))));
        assert_eq!(store.document_count().await, 0);

        store.heal(&second).await;
        store.set(&second, &json!({"n": 2})).await.unwrap();
        assert!(store.exists(&second).await.unwrap());
    }

    #[tokio::test]
    async fn query_filters_orders_and_limits() {
        let store = InMemoryDocumentStore::new();
        for (id, shop, at) in [("a", "s1", 10), ("b", "s1", 30), ("c", "s2", 20), ("d", "s1", 20)] {
            store
                .set(&orders().doc(id), &json!({"shopId": shop, "at": at}))
                .await
                .unwrap();
        }

        let query = Query::collection(orders())
            .filter_eq("shopId", "s1")
            .order_by("at", Direction::Descending)
            .limit(2);
        let docs = store.query(&query).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.path.id()).collect();
        assert_eq!(ids, vec!["b", "d"]);

        let next = Query::collection(orders())
            .filter_eq("shopId", "s1")
            .order_by("at", Direction::Descending)
            .start_after(20)
            .limit(2);
        let docs = store.query(&next).await.unwrap();
        let ids: Vec<&str> = docs.iter().map(|d| d.path.id()).collect();
        assert_eq!(ids, vec!["a"]);
    }

    #[tokio::test]
    async fn document_cursor_pages_through_tied_values() {
        let store = InMemoryDocumentStore::new();
        for (id, at) in [("a", 2000), ("b", 1000), ("c", 1000), ("d", 500)] {
            store
                .set(&orders().doc(id), &json!({"movedAt": at}))
                .await
                .unwrap();
        }

        let mut seen = Vec::new();
        let mut query = Query::collection(orders())
            .order_by("movedAt", Direction::Descending)
            .limit(2);
        loop {
            let docs = store.query(&query).await.unwrap();
            seen.extend(docs.iter().map(|d| d.path.id().to_string()));
            let Some(last) = docs.last().filter(|_| docs.len() == 2) else {
                break;
            };
            query = query
                .clone()
                .start_after_document(last.data["movedAt"].clone(), last.path.id());
        }

        assert_eq!(seen, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn stream_collection_yields_documents_in_path_order() {
        use futures_util::StreamExt;

        let store = InMemoryDocumentStore::new();
        for id in ["b", "a", "c"] {
            store.set(&orders().doc(id), &json!({"n": id})).await.unwrap();
        }
        store
            .set(&CollectionPath::root("carts").doc("x"), &json!({"n": 0}))
            .await
            .unwrap();

        let stream = store.stream_collection(&orders()).await.unwrap();
        let docs: Vec<_> = stream.collect().await;
        let ids: Vec<String> = docs
            .into_iter()
            .map(|d| d.unwrap().path.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn query_ignores_subcollections() {
        let store = InMemoryDocumentStore::new();
        let shop = CollectionPath::root("shops").doc("s1");
        store.set(&shop, &json!({"name": "x"})).await.unwrap();
        store
            .set(&shop.subcollection("history").doc("o1"), &json!({"n": 1}))
            .await
            .unwrap();

        let docs = store
            .query(&Query::collection(CollectionPath::root("shops")))
            .await
            .unwrap();
        assert_eq!(docs.len(), 1);
    }
}
