//! Cart Manager: one mutable cart per customer, locked to a single shop.

mod commands;
mod model;
mod service;

pub use commands::{AddToCart, MenuItemInput, UpdateCartQuantity};
pub use model::{Cart, CartLine};
pub use service::CartService;
pub(crate) use service::load_cart;

use common::{MenuItemId, ShopId};
use thiserror::Error;

use crate::error::ErrorKind;

/// Errors that can occur during cart operations.
#[derive(Debug, Error)]
pub enum CartError {
    /// A required field is missing or blank.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Quantity must be greater than zero when adding.
    #[error("Invalid quantity: {0} (must be greater than 0)")]
    InvalidQuantity(i64),

    /// Prices cannot be negative.
    #[error("Invalid price: {0} (must not be negative)")]
    NegativePrice(crate::Money),

    /// The cart already holds lines from another shop.
    #[error("cart contains items from another shop ({locked}); cannot add items from {incoming}")]
    ShopConflict { locked: ShopId, incoming: ShopId },

    /// No line with this menu item id.
    #[error("item not found in cart: {0}")]
    LineNotFound(MenuItemId),

    /// Checkout of a cart without lines.
    #[error("cart is empty")]
    Empty,

    /// Neither the lines nor the cached total give a positive amount.
    #[error("cart total could not be computed")]
    UncomputableTotal,
}

impl CartError {
    pub(crate) fn kind(&self) -> ErrorKind {
        match self {
            CartError::ShopConflict { .. } => ErrorKind::ShopConflict,
            CartError::LineNotFound(_) => ErrorKind::NotFound,
            _ => ErrorKind::Validation,
        }
    }
}
