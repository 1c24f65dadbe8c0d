//! Table reservation endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{ShopId, UserId};
use doc_store::DocumentStore;
use domain::{CreateReservation, Reservation};
use serde::Deserialize;

use super::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReservationRequest {
    #[serde(default, alias = "user_id")]
    pub user_id: String,
    #[serde(default)]
    pub people: i64,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(alias = "start_at")]
    pub start_at: DateTime<Utc>,
}

/// POST /shops/{shopId}/reservations
#[tracing::instrument(skip(state, req))]
pub async fn create<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(shop_id): Path<String>,
    req: Result<Json<CreateReservationRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Reservation>), ApiError> {
    let Json(req) = req?;
    let mut cmd = CreateReservation::new(shop_id, req.user_id, req.people, req.start_at);
    cmd.phone = req.phone;
    cmd.note = req.note;

    let reservation = state.reservations.create(cmd).await?;
    Ok((StatusCode::CREATED, Json(reservation)))
}

/// GET /shops/{shopId}/reservations
#[tracing::instrument(skip(state))]
pub async fn list<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(shop_id): Path<String>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let reservations = state
        .reservations
        .list_by_shop(&ShopId::new(shop_id))
        .await?;
    Ok(Json(reservations))
}

/// GET /users/{id}/reservations
#[tracing::instrument(skip(state))]
pub async fn list_by_user<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<Vec<Reservation>>, ApiError> {
    let reservations = state
        .reservations
        .list_by_user(&UserId::new(user_id))
        .await?;
    Ok(Json(reservations))
}
