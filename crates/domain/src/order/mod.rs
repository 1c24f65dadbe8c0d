//! Order lifecycle: live orders, status transitions and history archive.

mod commands;
mod history;
mod model;
mod service;
mod state;

pub use commands::{CreateOrder, UpdateOrderStatus};
pub use history::{
    DEFAULT_SHOP_HISTORY_LIMIT, DEFAULT_USER_HISTORY_LIMIT, HistoryCursor, HistoryPage,
    HistoryRecord, HistoryScope, ListHistory, MAX_HISTORY_LIMIT,
};
pub use model::{ORDER_SCHEMA_VERSION, Order, OrderLine, PaymentState, order_total};
pub use service::{OrderService, StatusUpdate};
pub use state::OrderStatus;

use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during order operations.
#[derive(Debug, Error)]
pub enum OrderError {
    /// A required field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Order has no items.
    #[error("Order has no items")]
    NoItems,

    /// An order line is malformed.
    #[error("Invalid item at index {index}: {reason}")]
    InvalidLine { index: usize, reason: &'static str },

    /// The status string is not a known order status.
    #[error("invalid status: {0}")]
    InvalidStatus(String),

    /// The order cannot move from its current status to the requested one.
    #[error("Invalid state transition: cannot move from {from} to {to}")]
    InvalidTransition { from: OrderStatus, to: OrderStatus },
}

impl OrderError {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            OrderError::InvalidStatus(_) => ErrorKind::InvalidStatus,
            OrderError::InvalidTransition { .. } => ErrorKind::InvalidTransition,
            _ => ErrorKind::Validation,
        }
    }
}
