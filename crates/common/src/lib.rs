//! Shared identifier types used across the marketplace crates.

mod types;

pub use types::{CustomerId, MenuItemId, OrderId, ReservationId, ShopId, UserId, VendorId};
