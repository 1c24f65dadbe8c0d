//! Order creation, lookup and status endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{OrderId, ShopId};
use doc_store::DocumentStore;
use domain::{CreateOrder, HistoryRecord, Order, OrderLine, StatusUpdate, UpdateOrderStatus};
use serde::{Deserialize, Serialize};

use super::{AppState, Envelope};
use crate::error::ApiError;

// -- Request types --

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
    #[serde(default, alias = "shop_id")]
    pub shop_id: String,
    #[serde(default, alias = "customer_id")]
    pub customer_id: String,
    #[serde(default)]
    pub items: Vec<OrderLine>,
    #[serde(default)]
    pub note: String,
    #[serde(default, alias = "customer_name")]
    pub customer_name: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatusFilter {
    #[serde(default)]
    pub status: Option<String>,
}

// -- Response types --

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusChanged {
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub history: Option<HistoryRecord>,
}

impl From<StatusUpdate> for StatusChanged {
    fn from(update: StatusUpdate) -> Self {
        match update {
            StatusUpdate::Updated(order) => StatusChanged {
                archived: false,
                order: Some(order),
                history: None,
            },
            StatusUpdate::Archived(record) => StatusChanged {
                archived: true,
                order: None,
                history: Some(record),
            },
        }
    }
}

// -- Handlers --

/// POST /orders : places an order directly, settled outside the wallet.
#[tracing::instrument(skip(state, req))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    req: Result<Json<CreateOrderRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Order>), ApiError> {
    let Json(req) = req?;
    let mut cmd = CreateOrder::new(req.shop_id, req.customer_id, req.items).with_note(req.note);
    cmd.customer_name = req.customer_name.filter(|n| !n.trim().is_empty());

    let order = state.orders.create_order(cmd).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

/// GET /orders/{id} : a live order.
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
) -> Result<Json<Order>, ApiError> {
    let order = state.orders.get_order(&OrderId::new(id)).await?;
    Ok(Json(order))
}

/// GET /shops/{shopId}/orders?status= : a shop's live orders, newest first.
#[tracing::instrument(skip(state, filter))]
pub async fn list_by_shop<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(shop_id): Path<String>,
    filter: Result<Query<StatusFilter>, QueryRejection>,
) -> Result<Json<Vec<Order>>, ApiError> {
    let Query(filter) = filter?;
    let orders = state
        .orders
        .list_by_shop(&ShopId::new(shop_id), filter.status.as_deref())
        .await?;
    Ok(Json(orders))
}

/// PUT /orders/{id}/status : moves an order forward; `done` archives it.
#[tracing::instrument(skip(state, req))]
pub async fn update_status<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(id): Path<String>,
    req: Result<Json<UpdateStatusRequest>, JsonRejection>,
) -> Result<Json<Envelope<StatusChanged>>, ApiError> {
    let Json(req) = req?;
    let update = state
        .orders
        .update_status(UpdateOrderStatus::new(id, req.status))
        .await?;

    let message = match update {
        StatusUpdate::Updated(_) => "order status updated",
        StatusUpdate::Archived(_) => "order completed and moved to history",
    };
    Ok(Json(Envelope::new(message, update.into())))
}
