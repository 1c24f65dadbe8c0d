//! Cart commands.

use common::{CustomerId, MenuItemId, ShopId, VendorId};

use crate::Money;
use crate::error::DomainError;
use crate::paths::require_segment;

use super::CartError;

/// Menu item data supplied by the client when adding to a cart.
#[derive(Debug, Clone, Default)]
pub struct MenuItemInput {
    pub menu_item_id: MenuItemId,
    pub name: String,
    pub unit_price: Money,
    pub vendor_id: Option<VendorId>,
    pub image: Option<String>,
    pub description: Option<String>,
}

impl MenuItemInput {
    /// Creates an input with the required fields.
    pub fn new(menu_item_id: impl Into<MenuItemId>, name: impl Into<String>, unit_price: Money) -> Self {
        Self {
            menu_item_id: menu_item_id.into(),
            name: name.into(),
            unit_price,
            ..Default::default()
        }
    }
}

/// Command to add a menu item to a customer's cart.
#[derive(Debug, Clone)]
pub struct AddToCart {
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    pub shop_name: String,
    pub item: MenuItemInput,
    pub quantity: i64,
}

impl AddToCart {
    /// Creates a new AddToCart command.
    pub fn new(
        customer_id: impl Into<CustomerId>,
        shop_id: impl Into<ShopId>,
        shop_name: impl Into<String>,
        item: MenuItemInput,
        quantity: i64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            shop_id: shop_id.into(),
            shop_name: shop_name.into(),
            item,
            quantity,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        require_segment("customerId", self.customer_id.as_str())?;
        require_segment("shopId", self.shop_id.as_str())?;
        if self.shop_name.trim().is_empty() {
            return Err(CartError::MissingField("shopName").into());
        }
        if self.item.menu_item_id.is_blank() {
            return Err(CartError::MissingField("menuItemId").into());
        }
        if self.quantity <= 0 {
            return Err(CartError::InvalidQuantity(self.quantity).into());
        }
        if self.item.unit_price.is_negative() {
            return Err(CartError::NegativePrice(self.item.unit_price).into());
        }
        Ok(())
    }

    /// Quantity as stored on the line. Only meaningful after validation.
    pub(crate) fn line_quantity(&self) -> u32 {
        u32::try_from(self.quantity).unwrap_or(u32::MAX)
    }
}

/// Command to change (or remove, when `<= 0`) a line's quantity.
#[derive(Debug, Clone)]
pub struct UpdateCartQuantity {
    pub customer_id: CustomerId,
    pub menu_item_id: MenuItemId,
    pub quantity: i64,
    pub vendor_id: Option<VendorId>,
    pub shop_id: Option<ShopId>,
}

impl UpdateCartQuantity {
    /// Creates a new UpdateCartQuantity command.
    pub fn new(
        customer_id: impl Into<CustomerId>,
        menu_item_id: impl Into<MenuItemId>,
        quantity: i64,
    ) -> Self {
        Self {
            customer_id: customer_id.into(),
            menu_item_id: menu_item_id.into(),
            quantity,
            vendor_id: None,
            shop_id: None,
        }
    }

    /// Backfills the line's shop if it has none.
    pub fn with_shop(mut self, shop_id: impl Into<ShopId>) -> Self {
        self.shop_id = Some(shop_id.into());
        self
    }

    /// Backfills the line's vendor if it has none.
    pub fn with_vendor(mut self, vendor_id: impl Into<VendorId>) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        require_segment("customerId", self.customer_id.as_str())?;
        if self.menu_item_id.is_blank() {
            return Err(CartError::MissingField("menuItemId").into());
        }
        Ok(())
    }
}
