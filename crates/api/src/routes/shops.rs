//! Shop registration, lookup, edit and removal endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use common::{ShopId, VendorId};
use doc_store::DocumentStore;
use domain::{RegisterShop, Shop, ShopStatus, UpdateShop};
use serde::{Deserialize, Serialize};

use super::{AppState, Envelope};
use crate::error::ApiError;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterShopRequest {
    #[serde(default, alias = "shop_name")]
    pub shop_name: String,
    #[serde(default)]
    pub vendor_id: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default = "default_true")]
    pub order_active: bool,
    #[serde(default)]
    pub reserve_active: bool,
}

impl From<RegisterShopRequest> for RegisterShop {
    fn from(req: RegisterShopRequest) -> Self {
        RegisterShop {
            shop_name: req.shop_name,
            vendor_id: req.vendor_id.map(VendorId::new),
            description: req.description,
            image: req.image,
            order_active: req.order_active,
            reserve_active: req.reserve_active,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateShopRequest {
    #[serde(alias = "shop_name")]
    pub shop_name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    #[serde(alias = "order_active")]
    pub order_active: Option<bool>,
    #[serde(alias = "reserve_active")]
    pub reserve_active: Option<bool>,
    pub status: Option<ShopStatus>,
}

impl From<UpdateShopRequest> for UpdateShop {
    fn from(req: UpdateShopRequest) -> Self {
        UpdateShop {
            shop_name: req.shop_name,
            description: req.description,
            image: req.image,
            order_active: req.order_active,
            reserve_active: req.reserve_active,
            status: req.status,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopFilter {
    #[serde(default, alias = "vendor_id")]
    pub vendor_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ShopListing {
    pub shops: Vec<Shop>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ShopRemoved {
    pub shop_id: ShopId,
}

/// POST /shops
#[tracing::instrument(skip(state, req))]
pub async fn register<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    req: Result<Json<RegisterShopRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Shop>), ApiError> {
    let Json(req) = req?;
    let shop = state.shops.register(req.into()).await?;
    Ok((StatusCode::CREATED, Json(shop)))
}

/// GET /shops/{shopId}
#[tracing::instrument(skip(state))]
pub async fn get<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(shop_id): Path<String>,
) -> Result<Json<Shop>, ApiError> {
    Ok(Json(state.shops.get(&ShopId::new(shop_id)).await?))
}

/// GET /shops?vendorId=
#[tracing::instrument(skip(state, filter))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    filter: Result<Query<ShopFilter>, QueryRejection>,
) -> Result<Json<ShopListing>, ApiError> {
    let Query(filter) = filter?;
    let vendor = filter
        .vendor_id
        .filter(|v| !v.trim().is_empty())
        .map(VendorId::new);
    let shops = state.shops.list(vendor.as_ref()).await?;
    Ok(Json(ShopListing { shops }))
}

/// GET /vendors/{vendorId}/shop
#[tracing::instrument(skip(state))]
pub async fn by_vendor<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(vendor_id): Path<String>,
) -> Result<Json<Shop>, ApiError> {
    Ok(Json(state.shops.find_by_vendor(&VendorId::new(vendor_id)).await?))
}

/// PATCH /shops/{shopId}
#[tracing::instrument(skip(state, req))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(shop_id): Path<String>,
    req: Result<Json<UpdateShopRequest>, JsonRejection>,
) -> Result<Json<Envelope<Shop>>, ApiError> {
    let Json(req) = req?;
    let shop = state.shops.update(&ShopId::new(shop_id), req.into()).await?;
    Ok(Json(Envelope::new("shop updated", shop)))
}

/// DELETE /shops/{shopId}
#[tracing::instrument(skip(state))]
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(shop_id): Path<String>,
) -> Result<Json<Envelope<ShopRemoved>>, ApiError> {
    let shop_id = ShopId::new(shop_id);
    state.shops.delete(&shop_id).await?;
    Ok(Json(Envelope::new("shop deleted", ShopRemoved { shop_id })))
}
