//! Cart and checkout endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::HeaderMap;
use common::CustomerId;
use doc_store::DocumentStore;
use domain::{
    AddToCart, Cart, Checkout, CheckoutReceipt, MenuItemInput, Money, UpdateCartQuantity,
};
use serde::{Deserialize, Serialize};

use super::{AppState, Envelope};
use crate::error::ApiError;

/// Header carrying the checkout idempotency key.
pub const IDEMPOTENCY_KEY_HEADER: &str = "idempotency-key";

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartQuery {
    #[serde(default, alias = "customer_id")]
    pub customer_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddToCartRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub shop_id: String,
    #[serde(default, alias = "shop_name")]
    pub shop_name: String,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default, alias = "quantity")]
    pub qty: i64,
    pub item: MenuItemRequest,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItemRequest {
    #[serde(default, alias = "menuItemId", alias = "id")]
    pub menu_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Money,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateQuantityRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default, alias = "menuItemId")]
    pub menu_id: String,
    #[serde(default, alias = "quantity")]
    pub qty: i64,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub shop_id: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutRequest {
    #[serde(default)]
    pub customer_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutResponse {
    #[serde(flatten)]
    pub receipt: CheckoutReceipt,
    pub replayed: bool,
}

impl AddToCartRequest {
    fn into_command(self) -> AddToCart {
        let mut item = MenuItemInput::new(self.item.menu_id, self.item.name, self.item.price);
        item.vendor_id = non_blank(self.vendor_id).map(Into::into);
        item.image = non_blank(self.item.image);
        item.description = non_blank(self.item.description);
        AddToCart::new(
            self.customer_id,
            self.shop_id,
            self.shop_name,
            item,
            self.qty,
        )
    }
}

impl UpdateQuantityRequest {
    fn into_command(self) -> UpdateCartQuantity {
        let mut cmd = UpdateCartQuantity::new(self.customer_id, self.menu_id, self.qty);
        if let Some(shop_id) = non_blank(self.shop_id) {
            cmd = cmd.with_shop(shop_id);
        }
        if let Some(vendor_id) = non_blank(self.vendor_id) {
            cmd = cmd.with_vendor(vendor_id);
        }
        cmd
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// The header wins over the body field when both are present.
fn idempotency_key(headers: &HeaderMap, body: Option<String>) -> Result<Option<String>, ApiError> {
    match headers.get(IDEMPOTENCY_KEY_HEADER) {
        Some(value) => value
            .to_str()
            .map(|key| Some(key.trim().to_string()))
            .map_err(|_| ApiError::BadRequest("Idempotency-Key must be visible ASCII".into())),
        None => Ok(non_blank(body)),
    }
}

// -- Handlers --

/// GET /cart?customerId= : the customer's cart, empty if none exists.
#[tracing::instrument(skip(state, query))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    query: Result<Query<CartQuery>, QueryRejection>,
) -> Result<Json<Cart>, ApiError> {
    let Query(query) = query?;
    let cart = state
        .carts
        .get_cart(&CustomerId::new(query.customer_id))
        .await?;
    Ok(Json(cart))
}

/// POST /cart/add : adds an item, locking the cart to its shop.
#[tracing::instrument(skip(state, req))]
pub async fn add<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    req: Result<Json<AddToCartRequest>, JsonRejection>,
) -> Result<Json<Envelope<Cart>>, ApiError> {
    let Json(req) = req?;
    let cart = state.carts.add_item(req.into_command()).await?;
    Ok(Json(Envelope::new("item added to cart", cart)))
}

/// PATCH /cart/qty : sets a line's quantity; zero or less removes it.
#[tracing::instrument(skip(state, req))]
pub async fn update_quantity<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    req: Result<Json<UpdateQuantityRequest>, JsonRejection>,
) -> Result<Json<Envelope<Cart>>, ApiError> {
    let Json(req) = req?;
    let cart = state.carts.update_quantity(req.into_command()).await?;
    Ok(Json(Envelope::new("cart updated", cart)))
}

/// POST /cart/checkout : turns the cart into an order paid from the wallet.
#[tracing::instrument(skip(state, headers, req))]
pub async fn checkout<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    headers: HeaderMap,
    req: Result<Json<CheckoutRequest>, JsonRejection>,
) -> Result<Json<Envelope<CheckoutResponse>>, ApiError> {
    let Json(req) = req?;
    let mut cmd = Checkout::new(req.customer_id, req.user_id);
    if let Some(key) = idempotency_key(&headers, req.idempotency_key)? {
        cmd = cmd.with_idempotency_key(key);
    }

    let outcome = state.checkout.checkout(cmd).await?;
    let message = if outcome.replayed {
        "checkout already completed"
    } else {
        "checkout complete"
    };
    Ok(Json(Envelope::new(
        message,
        CheckoutResponse {
            receipt: outcome.receipt,
            replayed: outcome.replayed,
        },
    )))
}
