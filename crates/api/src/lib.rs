//! HTTP API server for the marketplace backend.
//!
//! Exposes the cart, checkout, order lifecycle, history, wallet, shop, menu
//! and reservation operations as REST endpoints, with structured logging
//! (tracing) and Prometheus metrics.

pub mod config;
pub mod error;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, patch, post, put};
use doc_store::{DocumentStore, RetryPolicy};
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use routes::AppState;

/// Creates the Axum application router with all routes and shared state.
pub fn create_app<S: DocumentStore + Clone + 'static>(
    state: Arc<AppState<S>>,
    metrics_handle: PrometheusHandle,
) -> Router {
    let metrics_router = Router::new()
        .route("/metrics", get(routes::metrics::get))
        .with_state(metrics_handle);

    Router::new()
        .route("/health", get(routes::health::check))
        .route("/cart", get(routes::cart::get::<S>))
        .route("/cart/add", post(routes::cart::add::<S>))
        .route("/cart/qty", patch(routes::cart::update_quantity::<S>))
        .route("/cart/checkout", post(routes::cart::checkout::<S>))
        .route("/orders", post(routes::orders::create::<S>))
        .route("/orders/{id}", get(routes::orders::get::<S>))
        .route("/orders/{id}/status", put(routes::orders::update_status::<S>))
        .route(
            "/shops",
            post(routes::shops::register::<S>).get(routes::shops::list::<S>),
        )
        .route(
            "/shops/{shop_id}",
            get(routes::shops::get::<S>)
                .patch(routes::shops::update::<S>)
                .delete(routes::shops::delete::<S>),
        )
        .route(
            "/shops/{shop_id}/menu",
            post(routes::menu::create::<S>).get(routes::menu::list::<S>),
        )
        .route(
            "/shops/{shop_id}/menu/{item_id}",
            patch(routes::menu::update::<S>).delete(routes::menu::delete::<S>),
        )
        .route("/vendors/{vendor_id}/shop", get(routes::shops::by_vendor::<S>))
        .route("/shops/{shop_id}/orders", get(routes::orders::list_by_shop::<S>))
        .route("/shops/{shop_id}/history", get(routes::history::shop::<S>))
        .route(
            "/shops/{shop_id}/reservations",
            post(routes::reservations::create::<S>).get(routes::reservations::list::<S>),
        )
        .route("/users/{id}/history", get(routes::history::user::<S>))
        .route(
            "/users/{id}/reservations",
            get(routes::reservations::list_by_user::<S>),
        )
        .route("/users/{id}/wallet", get(routes::wallet::balance::<S>))
        .route("/users/{id}/wallet/topup", post(routes::wallet::top_up::<S>))
        .with_state(state)
        .merge(metrics_router)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(TraceLayer::new_for_http())
}

/// Creates the application state with every service sharing `store`.
pub fn create_default_state<S: DocumentStore + Clone + 'static>(
    store: S,
    retry: RetryPolicy,
) -> Arc<AppState<S>> {
    Arc::new(AppState::new(store, retry))
}
