//! Cart document model.

use chrono::{DateTime, Utc};
use common::{CustomerId, MenuItemId, ShopId, VendorId};
use serde::de::{self, Deserializer};
use serde::{Deserialize, Serialize};

use crate::Money;

use super::{CartError, MenuItemInput};

/// One line of a cart. Lines merge on `(shopId, menuItemId)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    #[serde(alias = "id")]
    pub menu_item_id: MenuItemId,

    #[serde(default)]
    pub name: String,

    #[serde(alias = "qty", deserialize_with = "whole_quantity")]
    pub quantity: u32,

    #[serde(default, alias = "price")]
    pub unit_price: Money,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shop_id: Option<ShopId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<VendorId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl CartLine {
    /// Returns the line total (quantity * unit price).
    pub fn line_total(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }

    fn fill_blanks_from(&mut self, item: &MenuItemInput) {
        if self.name.trim().is_empty() && !item.name.trim().is_empty() {
            self.name = item.name.clone();
        }
        if self.unit_price.is_zero() && item.unit_price.is_positive() {
            self.unit_price = item.unit_price;
        }
        fill_blank(&mut self.image, &item.image);
        fill_blank(&mut self.description, &item.description);
        if self.vendor_id.as_ref().is_none_or(VendorId::is_blank)
            && let Some(vendor) = &item.vendor_id
        {
            self.vendor_id = Some(vendor.clone());
        }
    }
}

/// Accepts `2` as well as `2.0`; older cart documents stored quantities as
/// floats.
fn whole_quantity<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u32, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Float(f64),
    }

    let quantity = match Raw::deserialize(deserializer)? {
        Raw::Int(n) => u32::try_from(n).ok(),
        Raw::Float(f) if f.fract() == 0.0 && (0.0..=f64::from(u32::MAX)).contains(&f) => {
            Some(f as u32)
        }
        Raw::Float(_) => None,
    };
    quantity.ok_or_else(|| de::Error::custom("quantity must be a whole, non-negative number"))
}

fn fill_blank(current: &mut Option<String>, incoming: &Option<String>) {
    let blank = current.as_deref().is_none_or(|s| s.trim().is_empty());
    if blank && let Some(value) = incoming.as_deref().filter(|s| !s.trim().is_empty()) {
        *current = Some(value.to_string());
    }
}

/// A customer's cart. Stored at `carts/{customerId}`.
///
/// Whenever the cart has lines they all belong to `shopId`; that shop lock
/// is released only once the cart is empty again.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    #[serde(default)]
    pub customer_id: CustomerId,

    #[serde(default)]
    pub shop_id: Option<ShopId>,

    #[serde(default, alias = "shop_name")]
    pub shop_name: String,

    #[serde(default)]
    pub items: Vec<CartLine>,

    #[serde(default)]
    pub total: Money,

    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    /// Returns the empty cart of a customer.
    pub fn empty(customer_id: CustomerId) -> Self {
        Self {
            customer_id,
            shop_id: None,
            shop_name: String::new(),
            items: Vec::new(),
            total: Money::zero(),
            updated_at: Utc::now(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Total number of units across all lines.
    pub fn item_count(&self) -> u32 {
        self.items
            .iter()
            .fold(0u32, |acc, line| acc.saturating_add(line.quantity))
    }

    /// The shop the cart is locked to. `None` while the cart has no lines.
    pub fn locked_shop(&self) -> Option<&ShopId> {
        if self.items.is_empty() {
            return None;
        }
        self.shop_id.as_ref().filter(|s| !s.is_blank()).or_else(|| {
            self.items
                .iter()
                .find_map(|line| line.shop_id.as_ref().filter(|s| !s.is_blank()))
        })
    }

    /// Sum of `quantity * unitPrice` over lines with a positive price and quantity.
    pub fn computed_total(&self) -> Money {
        self.items
            .iter()
            .filter(|line| line.quantity > 0 && line.unit_price.is_positive())
            .map(CartLine::line_total)
            .sum()
    }

    /// Adds `quantity` units of a menu item from `shop_id`.
    pub fn add_item(
        &mut self,
        shop_id: &ShopId,
        shop_name: &str,
        item: &MenuItemInput,
        quantity: u32,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        if let Some(locked) = self.locked_shop()
            && locked != shop_id
        {
            return Err(CartError::ShopConflict {
                locked: locked.clone(),
                incoming: shop_id.clone(),
            });
        }

        let existing = self.items.iter_mut().find(|line| {
            line.menu_item_id == item.menu_item_id
                && line.shop_id.as_ref().is_none_or(|s| s == shop_id)
        });

        match existing {
            Some(line) => {
                line.quantity = line.quantity.saturating_add(quantity);
                line.shop_id = Some(shop_id.clone());
                line.fill_blanks_from(item);
            }
            None => self.items.push(CartLine {
                menu_item_id: item.menu_item_id.clone(),
                name: item.name.clone(),
                quantity,
                unit_price: item.unit_price,
                shop_id: Some(shop_id.clone()),
                vendor_id: item.vendor_id.clone(),
                image: item.image.clone(),
                description: item.description.clone(),
            }),
        }

        self.shop_id = Some(shop_id.clone());
        self.shop_name = shop_name.to_string();
        self.total = self.computed_total();
        self.updated_at = now;
        Ok(())
    }

    /// Sets a line's quantity; `quantity <= 0` removes the line.
    ///
    /// Missing `vendorId`/`shopId` on the line are backfilled from the
    /// arguments. A backfilled shop must match the cart's lock.
    pub fn set_quantity(
        &mut self,
        menu_item_id: &MenuItemId,
        quantity: i64,
        vendor_id: Option<&VendorId>,
        shop_id: Option<&ShopId>,
        now: DateTime<Utc>,
    ) -> Result<(), CartError> {
        let index = self
            .items
            .iter()
            .position(|line| &line.menu_item_id == menu_item_id)
            .ok_or_else(|| CartError::LineNotFound(menu_item_id.clone()))?;

        if quantity <= 0 {
            self.items.remove(index);
        } else {
            let locked = self.locked_shop().cloned();
            let line = &mut self.items[index];

            if let Some(shop) = shop_id.filter(|s| !s.is_blank())
                && line.shop_id.as_ref().is_none_or(ShopId::is_blank)
            {
                if let Some(locked) = locked
                    && &locked != shop
                {
                    return Err(CartError::ShopConflict {
                        locked,
                        incoming: shop.clone(),
                    });
                }
                line.shop_id = Some(shop.clone());
            }
            if let Some(vendor) = vendor_id.filter(|v| !v.is_blank())
                && line.vendor_id.as_ref().is_none_or(VendorId::is_blank)
            {
                line.vendor_id = Some(vendor.clone());
            }
            line.quantity = u32::try_from(quantity).unwrap_or(u32::MAX);
        }

        self.total = self.computed_total();
        if self.items.is_empty() || !self.total.is_positive() {
            self.shop_name.clear();
        }
        if self.items.is_empty() {
            self.shop_id = None;
        } else if self.shop_id.as_ref().is_none_or(ShopId::is_blank) {
            self.shop_id = self.locked_shop().cloned();
        }
        self.updated_at = now;
        Ok(())
    }

    /// Amount to charge at checkout.
    ///
    /// Recomputed from the lines; the cached total is only used when the
    /// recomputation yields zero.
    pub fn checkout_total(&self) -> Result<Money, CartError> {
        if self.items.is_empty() {
            return Err(CartError::Empty);
        }
        let computed = self.computed_total();
        if computed.is_positive() {
            return Ok(computed);
        }
        if self.total.is_positive() {
            return Ok(self.total);
        }
        Err(CartError::UncomputableTotal)
    }

    /// Resets the cart to its empty form, releasing the shop lock.
    pub fn clear(&mut self, now: DateTime<Utc>) {
        self.items.clear();
        self.total = Money::zero();
        self.shop_id = None;
        self.shop_name.clear();
        self.updated_at = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn shop(id: &str) -> ShopId {
        ShopId::new(id)
    }

    fn item(id: &str, price: i64) -> MenuItemInput {
        MenuItemInput::new(id, format!("Item {id}"), Money::from_units(price))
    }

    fn cart_with(lines: &[(&str, i64, u32)]) -> Cart {
        let mut cart = Cart::empty(CustomerId::new("alice"));
        for (id, price, qty) in lines {
            cart.add_item(&shop("s1"), "Shop One", &item(id, *price), *qty, Utc::now())
                .unwrap();
        }
        cart
    }

    #[test]
    fn stored_float_quantities_decode() {
        let cart: Cart = serde_json::from_value(json!({
            "customerId": "alice",
            "shopId": "s1",
            "items": [{"id": "m1", "name": "Tea", "price": 12.5, "qty": 2.0}],
            "total": 25
        }))
        .unwrap();
        assert_eq!(cart.items[0].quantity, 2);
        assert_eq!(cart.items[0].line_total(), Money::from_units(25));

        let fractional = serde_json::from_value::<CartLine>(json!({"id": "m1", "qty": 1.5}));
        assert!(fractional.is_err());
        let negative = serde_json::from_value::<CartLine>(json!({"id": "m1", "qty": -1}));
        assert!(negative.is_err());
    }

    #[test]
    fn adding_same_item_merges_lines() {
        let cart = cart_with(&[("m1", 50, 1), ("m1", 50, 2), ("m2", 10, 1)]);

        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.items[0].quantity, 3);
        assert_eq!(cart.total, Money::from_units(160));
        assert_eq!(cart.locked_shop(), Some(&shop("s1")));
        assert_eq!(cart.shop_name, "Shop One");
    }

    #[test]
    fn other_shop_conflicts_and_leaves_cart_alone() {
        let mut cart = cart_with(&[("m1", 50, 1)]);
        let before = cart.clone();

        let err = cart
            .add_item(&shop("s2"), "Shop Two", &item("m9", 5), 1, Utc::now())
            .unwrap_err();

        assert!(matches!(err, CartError::ShopConflict { .. }));
        assert_eq!(cart, before);
    }

    #[test]
    fn merge_fills_blank_fields_only() {
        let mut cart = Cart::empty(CustomerId::new("alice"));
        let bare = MenuItemInput::new("m1", "", Money::zero());
        cart.add_item(&shop("s1"), "Shop", &bare, 1, Utc::now()).unwrap();

        let mut rich = MenuItemInput::new("m1", "Pad Thai", Money::from_units(40));
        rich.image = Some("pad.png".into());
        cart.add_item(&shop("s1"), "Shop", &rich, 1, Utc::now()).unwrap();

        let mut renamed = MenuItemInput::new("m1", "Other Name", Money::from_units(99));
        renamed.image = Some("other.png".into());
        cart.add_item(&shop("s1"), "Shop", &renamed, 1, Utc::now()).unwrap();

        let line = &cart.items[0];
        assert_eq!(line.quantity, 3);
        assert_eq!(line.name, "Pad Thai");
        assert_eq!(line.unit_price, Money::from_units(40));
        assert_eq!(line.image.as_deref(), Some("pad.png"));
        assert_eq!(cart.total, Money::from_units(120));
    }

    #[test]
    fn zero_quantity_removes_line_and_releases_lock() {
        let mut cart = cart_with(&[("m1", 50, 2)]);

        cart.set_quantity(&MenuItemId::new("m1"), 0, None, None, Utc::now())
            .unwrap();

        assert!(cart.is_empty());
        assert_eq!(cart.total, Money::zero());
        assert_eq!(cart.shop_name, "");
        assert_eq!(cart.shop_id, None);
        assert_eq!(cart.locked_shop(), None);
    }

    #[test]
    fn set_quantity_recomputes_total() {
        let mut cart = cart_with(&[("m1", 50, 2), ("m2", 10, 1)]);
        cart.set_quantity(&MenuItemId::new("m2"), 5, None, None, Utc::now())
            .unwrap();
        assert_eq!(cart.total, Money::from_units(150));
    }

    #[test]
    fn set_quantity_on_missing_line_fails() {
        let mut cart = cart_with(&[("m1", 50, 2)]);
        let err = cart
            .set_quantity(&MenuItemId::new("nope"), 1, None, None, Utc::now())
            .unwrap_err();
        assert!(matches!(err, CartError::LineNotFound(_)));
    }

    #[test]
    fn backfilled_shop_must_match_lock() {
        let mut cart: Cart = serde_json::from_value(json!({
            "customerId": "alice",
            "shopId": "s1",
            "shopName": "Shop One",
            "items": [{"menuItemId": "m1", "name": "x", "quantity": 1, "unitPrice": 10}],
            "total": 10
        }))
        .unwrap();

        let err = cart
            .set_quantity(&MenuItemId::new("m1"), 2, None, Some(&shop("s2")), Utc::now())
            .unwrap_err();
        assert!(matches!(err, CartError::ShopConflict { .. }));

        cart.set_quantity(
            &MenuItemId::new("m1"),
            2,
            Some(&VendorId::new("v1")),
            Some(&shop("s1")),
            Utc::now(),
        )
        .unwrap();
        assert_eq!(cart.items[0].shop_id, Some(shop("s1")));
        assert_eq!(cart.items[0].vendor_id, Some(VendorId::new("v1")));
    }

    #[test]
    fn checkout_total_falls_back_to_cached_total() {
        let mut cart = cart_with(&[("m1", 0, 1)]);
        assert!(matches!(
            cart.checkout_total(),
            Err(CartError::UncomputableTotal)
        ));

        cart.total = Money::from_units(30);
        assert_eq!(cart.checkout_total().unwrap(), Money::from_units(30));

        let empty = Cart::empty(CustomerId::new("bob"));
        assert!(matches!(empty.checkout_total(), Err(CartError::Empty)));
    }

    #[test]
    fn legacy_line_keys_are_accepted() {
        let line: CartLine = serde_json::from_value(json!({
            "id": "m1", "name": "Tea", "qty": 2, "price": 12.5, "shopId": "s1"
        }))
        .unwrap();
        assert_eq!(line.quantity, 2);
        assert_eq!(line.line_total(), Money::from_units(25));
    }
}
