use criterion::{Criterion, criterion_group, criterion_main};
use doc_store::{
    CollectionPath, Direction, DocumentStore, DocumentStoreExt, InMemoryDocumentStore, Query,
    Transaction,
};
use serde_json::json;

fn bench_single_set(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("doc_store/set_single_document", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryDocumentStore::new();
                let path = CollectionPath::root("carts").doc("alice");
                store.set(&path, &json!({"items": [], "total": 0})).await.unwrap();
            });
        });
    });
}

fn bench_read_then_write_transaction(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let cart = CollectionPath::root("carts").doc("alice");
    let order = CollectionPath::root("orders").doc("o1");
    rt.block_on(async {
        store.set(&cart, &json!({"total": 100})).await.unwrap();
    });

    c.bench_function("doc_store/read_then_write_transaction", |b| {
        b.iter(|| {
            rt.block_on(async {
                let mut tx = Transaction::begin(&store);
                let doc = tx.get(&cart).await.unwrap().unwrap();
                tx.set(&order, &doc.data).unwrap();
                tx.merge(&cart, &json!({"total": 100})).unwrap();
                tx.commit().await.unwrap();
            });
        });
    });
}

fn bench_ordered_query(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryDocumentStore::new();
    let history = CollectionPath::root("shops").doc("s1").subcollection("history");
    rt.block_on(async {
        for i in 0..500 {
            store
                .set(&history.doc(format!("o{i}")), &json!({"movedAt": i}))
                .await
                .unwrap();
        }
    });

    c.bench_function("doc_store/ordered_query_500_limit_50", |b| {
        b.iter(|| {
            rt.block_on(async {
                let query = Query::collection(history.clone())
                    .order_by("movedAt", Direction::Descending)
                    .limit(50);
                store.query(&query).await.unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_single_set,
    bench_read_then_write_transaction,
    bench_ordered_query
);
criterion_main!(benches);
