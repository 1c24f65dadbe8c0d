//! Domain error types.

use doc_store::StoreError;
use thiserror::Error;

use crate::cart::CartError;
use crate::money::Money;
use crate::order::OrderError;

/// Errors that can occur during domain operations.
#[derive(Debug, Error)]
pub enum DomainError {
    /// A cart rule was violated.
    #[error("{0}")]
    Cart(#[from] CartError),

    /// An order rule was violated.
    #[error("{0}")]
    Order(#[from] OrderError),

    /// Request input failed validation.
    #[error("{0}")]
    Validation(String),

    /// A required document does not exist.
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The wallet balance does not cover the amount to debit.
    #[error("insufficient funds: balance {available}, required {required}")]
    InsufficientFunds { available: Money, required: Money },

    /// An error occurred in the document store.
    #[error("Document store error: {0}")]
    Store(#[from] StoreError),

    /// A stored document could not be decoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Coarse classification of a [`DomainError`], used by the HTTP layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    NotFound,
    ShopConflict,
    InsufficientFunds,
    InvalidStatus,
    InvalidTransition,
    Storage,
    Contention,
}

impl ErrorKind {
    /// Stable machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::Validation => "VALIDATION_ERROR",
            ErrorKind::NotFound => "NOT_FOUND",
            ErrorKind::ShopConflict => "CART_SHOP_CONFLICT",
            ErrorKind::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorKind::InvalidStatus => "INVALID_STATUS",
            ErrorKind::InvalidTransition => "INVALID_TRANSITION",
            ErrorKind::Storage => "STORAGE_ERROR",
            ErrorKind::Contention => "STORAGE_CONFLICT",
        }
    }
}

impl DomainError {
    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        DomainError::Validation(msg.into())
    }

    pub(crate) fn not_found(entity: &'static str, id: impl std::fmt::Display) -> Self {
        DomainError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Classifies the error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Cart(e) => e.kind(),
            DomainError::Order(e) => e.kind(),
            DomainError::Validation(_) => ErrorKind::Validation,
            DomainError::NotFound { .. } => ErrorKind::NotFound,
            DomainError::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            DomainError::Store(StoreError::RetriesExhausted { .. }) => ErrorKind::Contention,
            DomainError::Store(_) | DomainError::Serialization(_) => ErrorKind::Storage,
        }
    }

    /// Shorthand for `self.kind().code()`.
    pub fn code(&self) -> &'static str {
        self.kind().code()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{MenuItemId, ShopId};

    #[test]
    fn cart_errors_keep_their_kind() {
        let conflict = DomainError::from(CartError::ShopConflict {
            locked: ShopId::new("s1"),
            incoming: ShopId::new("s2"),
        });
        assert_eq!(conflict.kind(), ErrorKind::ShopConflict);
        assert_eq!(conflict.code(), "CART_SHOP_CONFLICT");

        let missing = DomainError::from(CartError::LineNotFound(MenuItemId::new("m1")));
        assert_eq!(missing.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn exhausted_retries_are_contention() {
        let err = DomainError::from(StoreError::RetriesExhausted { attempts: 5 });
        assert_eq!(err.kind(), ErrorKind::Contention);
        assert_eq!(err.code(), "STORAGE_CONFLICT");
    }

    #[test]
    fn insufficient_funds_message_shows_amounts() {
        let err = DomainError::InsufficientFunds {
            available: Money::from_cents(1050),
            required: Money::from_units(20),
        };
        assert_eq!(
            err.to_string(),
            "insufficient funds: balance 10.50, required 20.00"
        );
    }
}
