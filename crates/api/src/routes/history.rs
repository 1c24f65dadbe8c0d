//! Completed-order history endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use common::{ShopId, UserId};
use doc_store::DocumentStore;
use domain::{HistoryPage, HistoryScope, ListHistory};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct HistoryParams {
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

impl HistoryParams {
    fn into_query(self, scope: HistoryScope) -> ListHistory {
        ListHistory {
            scope,
            limit: self.limit,
            cursor: self.cursor,
            status: self.status,
        }
    }
}

/// GET /shops/{shopId}/history : the shop's completed orders, newest first.
#[tracing::instrument(skip(state, params))]
pub async fn shop<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(shop_id): Path<String>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<HistoryPage>, ApiError> {
    let Query(params) = params?;
    let query = params.into_query(HistoryScope::Shop(ShopId::new(shop_id)));
    Ok(Json(state.orders.list_history(query).await?))
}

/// GET /users/{id}/history : the user's completed orders, newest first.
#[tracing::instrument(skip(state, params))]
pub async fn user<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    params: Result<Query<HistoryParams>, QueryRejection>,
) -> Result<Json<HistoryPage>, ApiError> {
    let Query(params) = params?;
    let query = params.into_query(HistoryScope::User(UserId::new(user_id)));
    Ok(Json(state.orders.list_history(query).await?))
}
