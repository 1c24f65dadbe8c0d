//! API error types with HTTP response mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use domain::{DomainError, ErrorKind};
use serde::Serialize;
use thiserror::Error;

/// API-level error type that maps to HTTP responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Domain logic or storage error.
    #[error(transparent)]
    Domain(#[from] DomainError),
    /// Request could not be decoded.
    #[error("{0}")]
    BadRequest(String),
}

/// JSON body of every error response.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    pub code: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
}

/// HTTP status for each error kind.
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::Validation | ErrorKind::InvalidStatus => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::ShopConflict | ErrorKind::InvalidTransition => StatusCode::CONFLICT,
        ErrorKind::InsufficientFunds => StatusCode::PAYMENT_REQUIRED,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
        ErrorKind::Contention => StatusCode::SERVICE_UNAVAILABLE,
    }
}

impl ApiError {
    fn kind(&self) -> ErrorKind {
        match self {
            ApiError::Domain(err) => err.kind(),
            ApiError::BadRequest(_) => ErrorKind::Validation,
        }
    }

    fn body(&self) -> ErrorBody {
        let kind = self.kind();
        let (error, msg) = match kind {
            ErrorKind::Storage => ("storage error".to_string(), Some(self.to_string())),
            ErrorKind::Contention => (
                "too many concurrent updates, retry later".to_string(),
                Some(self.to_string()),
            ),
            _ => (self.to_string(), None),
        };
        ErrorBody {
            error,
            code: kind.code(),
            msg,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let kind = self.kind();
        let status = status_for(kind);
        metrics::counter!("http_errors_total", "code" => kind.code()).increment(1);
        match kind {
            ErrorKind::Storage => tracing::error!(error = %self, "storage failure"),
            ErrorKind::Contention => tracing::warn!(error = %self, "transaction contention"),
            _ => tracing::debug!(error = %self, code = kind.code(), "request rejected"),
        }
        (status, Json(self.body())).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(format!("invalid request body: {}", rejection.body_text()))
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(format!("invalid query string: {}", rejection.body_text()))
    }
}
