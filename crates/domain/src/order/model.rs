//! Live order document model.

use chrono::{DateTime, Utc};
use common::{CustomerId, MenuItemId, OrderId, ShopId, UserId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Money;
use crate::cart::{Cart, CartLine};

use super::OrderStatus;

/// Schema version written on every current order document.
pub const ORDER_SCHEMA_VERSION: u32 = 2;

/// An item in an order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderLine {
    /// Menu item id.
    pub id: MenuItemId,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub price: Money,

    #[serde(default)]
    pub qty: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Client-defined add-ons, kept as is.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extras: Option<Value>,
}

impl OrderLine {
    /// Creates a new order line.
    pub fn new(id: impl Into<MenuItemId>, name: impl Into<String>, price: Money, qty: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            qty,
            image: None,
            description: None,
            extras: None,
        }
    }

    /// Returns the line total. A quantity of zero counts as one.
    pub fn line_total(&self) -> Money {
        self.price.multiply(self.qty.max(1))
    }
}

impl From<&CartLine> for OrderLine {
    fn from(line: &CartLine) -> Self {
        Self {
            id: line.menu_item_id.clone(),
            name: line.name.clone(),
            price: line.unit_price,
            qty: line.quantity,
            image: line.image.clone(),
            description: line.description.clone(),
            extras: None,
        }
    }
}

/// Sum of line totals.
pub fn order_total(lines: &[OrderLine]) -> Money {
    lines.iter().map(OrderLine::line_total).sum()
}

/// How an order is paid for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PaymentState {
    /// Charged to the wallet at checkout.
    #[default]
    Paid,

    /// Placed directly; settled with the shop on collection, never through
    /// the wallet.
    Due,
}

/// A live order. Stored at `orders/{orderId}` until it completes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    #[serde(default)]
    pub id: OrderId,

    pub shop_id: ShopId,

    pub customer_id: CustomerId,

    /// Account owner when it differs from the customer id (checkout orders).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<UserId>,

    pub status: OrderStatus,

    pub items: Vec<OrderLine>,

    pub total: Money,

    #[serde(default)]
    pub note: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_name: Option<String>,

    pub payment: PaymentState,

    pub schema_version: u32,

    pub created_at: DateTime<Utc>,

    pub updated_at: DateTime<Utc>,
}

impl Order {
    /// Builds the order placed by checking out a cart.
    pub(crate) fn from_cart(
        id: OrderId,
        cart: &Cart,
        shop_id: ShopId,
        user_id: UserId,
        total: Money,
        now: DateTime<Utc>,
    ) -> Self {
        let shop_name = Some(cart.shop_name.trim())
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        Self {
            id,
            shop_id,
            customer_id: cart.customer_id.clone(),
            user_id: Some(user_id),
            status: OrderStatus::Prepare,
            items: cart.items.iter().map(OrderLine::from).collect(),
            total,
            note: String::new(),
            customer_name: None,
            shop_name,
            payment: PaymentState::Paid,
            schema_version: ORDER_SCHEMA_VERSION,
            created_at: now,
            updated_at: now,
        }
    }

    /// The account whose history this order belongs to.
    pub fn owner(&self) -> UserId {
        self.user_id
            .clone()
            .filter(|u| !u.is_blank())
            .unwrap_or_else(|| self.customer_id.clone().into())
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.qty))
    }
}
