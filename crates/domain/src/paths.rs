//! Document layout of the marketplace in the store.

use common::{CustomerId, MenuItemId, OrderId, ReservationId, ShopId, UserId};
use doc_store::{CollectionPath, DocumentPath};

use crate::error::DomainError;

pub const CARTS: &str = "carts";
pub const CHECKOUTS: &str = "checkouts";
pub const ORDERS: &str = "orders";
pub const SHOPS: &str = "shops";
pub const USERS: &str = "users";
pub const HISTORY: &str = "history";
pub const RESERVATIONS: &str = "reservations";
pub const MENU: &str = "menu";

pub fn cart(customer_id: &CustomerId) -> DocumentPath {
    CollectionPath::root(CARTS).doc(customer_id)
}

/// Receipt of a checkout made with an idempotency key.
pub fn checkout_receipt(customer_id: &CustomerId, key: &str) -> DocumentPath {
    cart(customer_id).subcollection(CHECKOUTS).doc(key)
}

pub fn orders() -> CollectionPath {
    CollectionPath::root(ORDERS)
}

pub fn order(order_id: &OrderId) -> DocumentPath {
    orders().doc(order_id)
}

pub fn shops() -> CollectionPath {
    CollectionPath::root(SHOPS)
}

pub fn shop(shop_id: &ShopId) -> DocumentPath {
    shops().doc(shop_id)
}

pub fn menu(shop_id: &ShopId) -> CollectionPath {
    shop(shop_id).subcollection(MENU)
}

pub fn menu_item(shop_id: &ShopId, item_id: &MenuItemId) -> DocumentPath {
    menu(shop_id).doc(item_id)
}

pub fn shop_history(shop_id: &ShopId) -> CollectionPath {
    shop(shop_id).subcollection(HISTORY)
}

pub fn user(user_id: &UserId) -> DocumentPath {
    CollectionPath::root(USERS).doc(user_id)
}

pub fn user_history(user_id: &UserId) -> CollectionPath {
    user(user_id).subcollection(HISTORY)
}

pub fn reservations() -> CollectionPath {
    CollectionPath::root(RESERVATIONS)
}

pub fn reservation(reservation_id: &ReservationId) -> DocumentPath {
    reservations().doc(reservation_id)
}

/// Checks that a caller-supplied id is usable as a single path segment.
pub fn require_segment(field: &str, value: &str) -> Result<(), DomainError> {
    if value.trim().is_empty() {
        return Err(DomainError::validation(format!("{field} is required")));
    }
    if value.contains('/') {
        return Err(DomainError::validation(format!(
            "{field} must not contain '/'"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn history_partitions_live_under_their_owner() {
        let shop = shop_history(&ShopId::new("s1")).doc("o1");
        let user = user_history(&UserId::new("u1")).doc("o1");
        assert_eq!(shop.to_string(), "shops/s1/history/o1");
        assert_eq!(user.to_string(), "users/u1/history/o1");
    }

    #[test]
    fn menu_items_nest_under_their_shop() {
        let path = menu_item(&ShopId::new("s1"), &MenuItemId::new("m1"));
        assert_eq!(path.to_string(), "shops/s1/menu/m1");
    }

    #[test]
    fn checkout_receipts_nest_under_the_cart() {
        let path = checkout_receipt(&CustomerId::new("alice"), "k1");
        assert_eq!(path.to_string(), "carts/alice/checkouts/k1");
    }

    #[test]
    fn segments_must_be_non_blank_and_slash_free() {
        assert!(require_segment("shopId", "s1").is_ok());
        assert!(require_segment("shopId", "  ").is_err());
        assert!(require_segment("shopId", "a/b").is_err());
    }
}
