//! Order commands.

use common::{CustomerId, OrderId, ShopId};

use crate::error::DomainError;
use crate::paths::require_segment;

use super::{OrderError, OrderLine, OrderStatus};

/// Command to place an order directly, without a cart.
///
/// It is settled with the shop, never through the wallet.
#[derive(Debug, Clone)]
pub struct CreateOrder {
    pub shop_id: ShopId,
    pub customer_id: CustomerId,
    pub items: Vec<OrderLine>,
    pub note: String,
    pub customer_name: Option<String>,
}

impl CreateOrder {
    /// Creates a new CreateOrder command.
    pub fn new(
        shop_id: impl Into<ShopId>,
        customer_id: impl Into<CustomerId>,
        items: Vec<OrderLine>,
    ) -> Self {
        Self {
            shop_id: shop_id.into(),
            customer_id: customer_id.into(),
            items,
            note: String::new(),
            customer_name: None,
        }
    }

    /// Attaches a note for the shop.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.note = note.into();
        self
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        require_segment("shopId", self.shop_id.as_str())?;
        require_segment("customerId", self.customer_id.as_str())?;
        if self.items.is_empty() {
            return Err(OrderError::NoItems.into());
        }
        for (index, line) in self.items.iter().enumerate() {
            if line.id.is_blank() {
                return Err(OrderError::InvalidLine {
                    index,
                    reason: "id is required",
                }
                .into());
            }
            if line.price.is_negative() {
                return Err(OrderError::InvalidLine {
                    index,
                    reason: "price must not be negative",
                }
                .into());
            }
        }
        Ok(())
    }
}

/// Command to move an order to a new status.
#[derive(Debug, Clone)]
pub struct UpdateOrderStatus {
    pub order_id: OrderId,
    pub status: String,
}

impl UpdateOrderStatus {
    /// Creates a new UpdateOrderStatus command.
    pub fn new(order_id: impl Into<OrderId>, status: impl Into<String>) -> Self {
        Self {
            order_id: order_id.into(),
            status: status.into(),
        }
    }

    /// Validates the command and returns the parsed target status.
    pub(crate) fn target(&self) -> Result<OrderStatus, DomainError> {
        require_segment("orderId", self.order_id.as_str())?;
        Ok(self.status.parse::<OrderStatus>()?)
    }
}
