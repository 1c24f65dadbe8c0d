//! Wallet balance and top-up endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use common::UserId;
use doc_store::DocumentStore;
use domain::{Money, TopUp};
use serde::{Deserialize, Serialize};

use super::{AppState, Envelope};
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct TopUpRequest {
    #[serde(default)]
    pub amount: Money,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletResponse {
    pub user_id: UserId,
    pub balance: Money,
}

/// GET /users/{id}/wallet
#[tracing::instrument(skip(state))]
pub async fn balance<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
) -> Result<Json<WalletResponse>, ApiError> {
    let user_id = UserId::new(user_id);
    let balance = state.wallet.get_balance(&user_id).await?;
    Ok(Json(WalletResponse { user_id, balance }))
}

/// POST /users/{id}/wallet/topup
#[tracing::instrument(skip(state, req))]
pub async fn top_up<S: DocumentStore + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    Path(user_id): Path<String>,
    req: Result<Json<TopUpRequest>, JsonRejection>,
) -> Result<Json<Envelope<WalletResponse>>, ApiError> {
    let Json(req) = req?;
    let user_id = UserId::new(user_id);
    let balance = state
        .wallet
        .top_up(TopUp::new(user_id.clone(), req.amount))
        .await?;
    Ok(Json(Envelope::new(
        "wallet topped up",
        WalletResponse { user_id, balance },
    )))
}
