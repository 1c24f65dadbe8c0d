use criterion::{Criterion, criterion_group, criterion_main};
use doc_store::{DocumentStoreExt, InMemoryDocumentStore};
use domain::{
    AddToCart, CartService, Checkout, CheckoutService, CreateOrder, MenuItemInput, Money,
    OrderLine, OrderService, UpdateOrderStatus, paths,
};
use serde_json::json;

fn add(customer: &str, item: &str) -> AddToCart {
    AddToCart::new(
        customer,
        "s1",
        "Bench Shop",
        MenuItemInput::new(item, "Bench Dish", Money::from_units(10)),
        1,
    )
}

fn bench_cart_add_item(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let carts = CartService::new(InMemoryDocumentStore::new());

    c.bench_function("domain/cart_add_item", |b| {
        b.iter(|| {
            rt.block_on(async {
                carts.add_item(add("alice", "m1")).await.unwrap();
            });
        });
    });
}

fn bench_checkout(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/add_then_checkout", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryDocumentStore::new();
                store
                    .set(&paths::user(&"u1".into()), &json!({"cost": 1000}))
                    .await
                    .unwrap();
                let carts = CartService::new(store.clone());
                carts.add_item(add("alice", "m1")).await.unwrap();
                carts.add_item(add("alice", "m2")).await.unwrap();
                CheckoutService::new(store)
                    .checkout(Checkout::new("alice", "u1"))
                    .await
                    .unwrap();
            });
        });
    });
}

fn bench_order_lifecycle(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();

    c.bench_function("domain/create_progress_archive", |b| {
        b.iter(|| {
            rt.block_on(async {
                let store = InMemoryDocumentStore::new();
                store
                    .set(&paths::user(&"alice".into()), &json!({"cost": 1000}))
                    .await
                    .unwrap();
                let orders = OrderService::new(store);
                let order = orders
                    .create_order(CreateOrder::new(
                        "s1",
                        "alice",
                        vec![OrderLine::new("m1", "Dish", Money::from_units(50), 2)],
                    ))
                    .await
                    .unwrap();
                orders
                    .update_status(UpdateOrderStatus::new(order.id.clone(), "ongoing"))
                    .await
                    .unwrap();
                orders
                    .update_status(UpdateOrderStatus::new(order.id, "done"))
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_cart_add_item,
    bench_checkout,
    bench_order_lifecycle
);
criterion_main!(benches);
