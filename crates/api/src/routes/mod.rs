//! HTTP route handlers.

pub mod cart;
pub mod health;
pub mod history;
pub mod menu;
pub mod metrics;
pub mod orders;
pub mod reservations;
pub mod shops;
pub mod wallet;

use doc_store::{DocumentStore, RetryPolicy};
use domain::{
    CartService, CheckoutService, MenuService, OrderService, ReservationService, ShopService,
    WalletService,
};
use serde::Serialize;

/// Shared application state accessible from all handlers.
pub struct AppState<S: DocumentStore> {
    pub carts: CartService<S>,
    pub checkout: CheckoutService<S>,
    pub orders: OrderService<S>,
    pub wallet: WalletService<S>,
    pub shops: ShopService<S>,
    pub menus: MenuService<S>,
    pub reservations: ReservationService<S>,
}

impl<S: DocumentStore + Clone> AppState<S> {
    /// Builds every service over one store handle.
    pub fn new(store: S, retry: RetryPolicy) -> Self {
        Self {
            carts: CartService::new(store.clone()).with_retry_policy(retry),
            checkout: CheckoutService::new(store.clone()).with_retry_policy(retry),
            orders: OrderService::new(store.clone()).with_retry_policy(retry),
            wallet: WalletService::new(store.clone()).with_retry_policy(retry),
            shops: ShopService::new(store.clone()).with_retry_policy(retry),
            menus: MenuService::new(store.clone()).with_retry_policy(retry),
            reservations: ReservationService::new(store).with_retry_policy(retry),
        }
    }
}

/// `{message, ...}` envelope for command responses.
#[derive(Debug, Serialize)]
pub struct Envelope<T: Serialize> {
    pub message: &'static str,
    #[serde(flatten)]
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn new(message: &'static str, data: T) -> Self {
        Self { message, data }
    }
}
