//! PostgreSQL integration tests
//!
//! These tests start a shared PostgreSQL container and need Docker, so they
//! are ignored by default. Run with:
//!
//! ```bash
//! cargo test -p doc-store --test postgres_integration -- --ignored --test-threads=1
//! ```

use std::sync::Arc;

use doc_store::{
    CollectionPath, Commit, Direction, DocumentStore, DocumentStoreExt, PostgresDocumentStore,
    Precondition, Query, StoreError, Transaction, Version, Write,
};
use serde_json::json;
use serial_test::serial;
use sqlx::PgPool;
use testcontainers::{ContainerAsync, runners::AsyncRunner};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

/// Shared container info - container stays alive for all tests
struct ContainerInfo {
    #[allow(dead_code)] // Container must stay alive for tests
    container: ContainerAsync<Postgres>,
    connection_string: String,
}

static CONTAINER: OnceCell<Arc<ContainerInfo>> = OnceCell::const_new();

async fn get_container_info() -> Arc<ContainerInfo> {
    CONTAINER
        .get_or_init(|| async {
            let container = Postgres::default().start().await.unwrap();

            let host = container.get_host().await.unwrap();
            let port = container.get_host_port_ipv4(5432).await.unwrap();

            let connection_string =
                format!("postgres://postgres:postgres@{}:{}/postgres", host, port);

            let temp_pool = PgPool::connect(&connection_string).await.unwrap();
            sqlx::raw_sql(include_str!(
                "../../../migrations/001_create_documents_table.sql"
            ))
            .execute(&temp_pool)
            .await
            .unwrap();
            temp_pool.close().await;

            Arc::new(ContainerInfo {
                container,
                connection_string,
            })
        })
        .await
        .clone()
}

/// Get a fresh store with its own pool and an empty table
async fn get_test_store() -> PostgresDocumentStore {
    let info = get_container_info().await;

    let pool = sqlx::postgres::PgPoolOptions::new()
        .max_connections(5)
        .connect(&info.connection_string)
        .await
        .unwrap();

    sqlx::query("TRUNCATE TABLE documents")
        .execute(&pool)
        .await
        .unwrap();

    PostgresDocumentStore::new(pool)
}

fn orders() -> CollectionPath {
    CollectionPath::root("orders")
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn set_get_and_merge() {
    let store = get_test_store().await;
    let path = orders().doc("o1");

    store.set(&path, &json!({"a": 1, "b": 2})).await.unwrap();
    store.merge(&path, &json!({"b": 3})).await.unwrap();

    let doc = store.get(&path).await.unwrap().unwrap();
    assert_eq!(doc.data, json!({"a": 1, "b": 3}));
    assert_eq!(doc.version, Version::new(2));
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn update_of_missing_document_fails() {
    let store = get_test_store().await;
    let result = store
        .commit(Commit::single(Write::Update {
            path: orders().doc("missing"),
            data: json!({"status": "done"}),
        }))
        .await;
    assert!(matches!(result, Err(StoreError::NotFound(_))));
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn stale_precondition_conflicts() {
    let store = get_test_store().await;
    let path = orders().doc("o1");
    store.set(&path, &json!({"n": 1})).await.unwrap();

    let commit = Commit {
        preconditions: vec![Precondition {
            path: path.clone(),
            expected: None,
        }],
        writes: vec![Write::Delete { path: path.clone() }],
    };
    let result = store.commit(commit).await;

    assert!(matches!(result, Err(StoreError::Conflict { .. })));
    assert!(store.exists(&path).await.unwrap());
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn transaction_moves_document_atomically() {
    let store = get_test_store().await;
    let live = orders().doc("o1");
    let archived = CollectionPath::root("shops")
        .doc("s1")
        .subcollection("history")
        .doc("o1");
    store.set(&live, &json!({"total": 100})).await.unwrap();

    let mut tx = Transaction::begin(&store);
    let doc = tx.get(&live).await.unwrap().unwrap();
    tx.merge(&archived, &doc.data).unwrap();
    tx.delete(&live);
    tx.commit().await.unwrap();

    assert!(!store.exists(&live).await.unwrap());
    let moved = store.get(&archived).await.unwrap().unwrap();
    assert_eq!(moved.data["total"], 100);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn ordered_query_with_cursor() {
    let store = get_test_store().await;
    for (id, at) in [("a", 10), ("b", 30), ("c", 20)] {
        store
            .set(&orders().doc(id), &json!({"shopId": "s1", "movedAt": at}))
            .await
            .unwrap();
    }
    store
        .set(&orders().doc("x"), &json!({"shopId": "s2", "movedAt": 99}))
        .await
        .unwrap();

    let first = Query::collection(orders())
        .filter_eq("shopId", "s1")
        .order_by("movedAt", Direction::Descending)
        .limit(2);
    let docs = store.query(&first).await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.path.id()).collect();
    assert_eq!(ids, vec!["b", "c"]);

    let next = first.clone().start_after(20);
    let docs = store.query(&next).await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.path.id()).collect();
    assert_eq!(ids, vec!["a"]);
}

#[tokio::test]
#[ignore = "requires docker"]
#[serial]
async fn document_cursor_keeps_tied_values() {
    let store = get_test_store().await;
    for (id, at) in [("a", 2000), ("b", 1000), ("c", 1000), ("d", 500)] {
        store
            .set(&orders().doc(id), &json!({"movedAt": at}))
            .await
            .unwrap();
    }

    let first = Query::collection(orders())
        .order_by("movedAt", Direction::Descending)
        .limit(2);
    let docs = store.query(&first).await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.path.id()).collect();
    assert_eq!(ids, vec!["a", "b"]);

    let next = first.clone().start_after_document(1000, "b");
    let docs = store.query(&next).await.unwrap();
    let ids: Vec<&str> = docs.iter().map(|d| d.path.id()).collect();
    assert_eq!(ids, vec!["c", "d"]);
}
