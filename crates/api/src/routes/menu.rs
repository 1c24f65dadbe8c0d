//! Menu endpoints under a shop.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use common::{MenuItemId, ShopId};
use doc_store::DocumentStore;
use domain::{CreateMenuItem, MenuItem, MenuWrite, Money, PriceRange, UpdateMenuItem};
use serde::{Deserialize, Serialize};

use super::{AppState, Envelope};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct CreateMenuItemRequest {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: Option<Money>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

impl From<CreateMenuItemRequest> for CreateMenuItem {
    fn from(req: CreateMenuItemRequest) -> Self {
        CreateMenuItem {
            name: req.name,
            price: req.price,
            description: req.description,
            image: req.image,
            active: req.active,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UpdateMenuItemRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: Option<Money>,
    pub active: Option<bool>,
}

impl From<UpdateMenuItemRequest> for UpdateMenuItem {
    fn from(req: UpdateMenuItemRequest) -> Self {
        UpdateMenuItem {
            name: req.name,
            description: req.description,
            image: req.image,
            price: req.price,
            active: req.active,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuWritten {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<MenuItem>,
    pub price_range: PriceRange,
}

impl From<MenuWrite> for MenuWritten {
    fn from(write: MenuWrite) -> Self {
        Self {
            item: write.item,
            price_range: write.price_range,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MenuListing {
    pub items: Vec<MenuItem>,
    pub count: usize,
}

/// POST /shops/{shopId}/menu
#[tracing::instrument(skip(state, req))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(shop_id): Path<String>,
    req: Result<Json<CreateMenuItemRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<MenuWritten>), ApiError> {
    let Json(req) = req?;
    let write = state.menus.create(&ShopId::new(shop_id), req.into()).await?;
    Ok((StatusCode::CREATED, Json(write.into())))
}

/// GET /shops/{shopId}/menu
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(shop_id): Path<String>,
) -> Result<Json<MenuListing>, ApiError> {
    let items = state.menus.list(&ShopId::new(shop_id)).await?;
    Ok(Json(MenuListing {
        count: items.len(),
        items,
    }))
}

/// PATCH /shops/{shopId}/menu/{menuItemId}
#[tracing::instrument(skip(state, req))]
pub async fn update<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((shop_id, item_id)): Path<(String, String)>,
    req: Result<Json<UpdateMenuItemRequest>, JsonRejection>,
) -> Result<Json<Envelope<MenuWritten>>, ApiError> {
    let Json(req) = req?;
    let write = state
        .menus
        .update(&ShopId::new(shop_id), &MenuItemId::new(item_id), req.into())
        .await?;
    Ok(Json(Envelope::new("menu item updated", write.into())))
}

/// DELETE /shops/{shopId}/menu/{menuItemId}
#[tracing::instrument(skip(state))]
pub async fn delete<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path((shop_id, item_id)): Path<(String, String)>,
) -> Result<Json<Envelope<MenuWritten>>, ApiError> {
    let write = state
        .menus
        .delete(&ShopId::new(shop_id), &MenuItemId::new(item_id))
        .await?;
    Ok(Json(Envelope::new("menu item deleted", write.into())))
}
