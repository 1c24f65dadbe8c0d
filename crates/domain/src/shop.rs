//! Shops: registration, lookup, edits and removal. Archive reads the shop
//! name from here.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{ShopId, VendorId};
use doc_store::{
    Document, DocumentStore, DocumentStoreExt, Query, RetryPolicy, Transaction, TransactionWork,
    run_transaction,
};
use serde::{Deserialize, Serialize};

use crate::Money;
use crate::error::DomainError;
use crate::paths::{self, require_segment};

/// Whether a shop is trading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ShopStatus {
    #[default]
    Open,
    Closed,
}

fn default_true() -> bool {
    true
}

/// A shop document at `shops/{shopId}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Shop {
    #[serde(default)]
    pub id: ShopId,

    #[serde(default, alias = "shop_name")]
    pub shop_name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_id: Option<VendorId>,

    #[serde(default)]
    pub description: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default = "default_true")]
    pub order_active: bool,

    #[serde(default)]
    pub reserve_active: bool,

    #[serde(default)]
    pub status: ShopStatus,

    /// Cheapest active menu item; maintained by menu writes.
    #[serde(default, alias = "price_min")]
    pub price_min: Option<Money>,

    #[serde(default, alias = "price_max")]
    pub price_max: Option<Money>,

    #[serde(default, alias = "menu_active_count")]
    pub menu_active_count: u32,

    #[serde(default)]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub updated_at: DateTime<Utc>,
}

impl Shop {
    pub(crate) fn from_document(doc: &Document) -> Result<Self, DomainError> {
        let mut shop: Shop = doc.decode()?;
        if shop.id.is_blank() {
            shop.id = ShopId::new(doc.path.id());
        }
        Ok(shop)
    }
}

/// Command to register a new shop.
#[derive(Debug, Clone, Default)]
pub struct RegisterShop {
    pub shop_name: String,
    pub vendor_id: Option<VendorId>,
    pub description: String,
    pub image: Option<String>,
    pub order_active: bool,
    pub reserve_active: bool,
}

impl RegisterShop {
    pub fn new(shop_name: impl Into<String>) -> Self {
        Self {
            shop_name: shop_name.into(),
            order_active: true,
            ..Default::default()
        }
    }

    pub fn accepting_reservations(mut self) -> Self {
        self.reserve_active = true;
        self
    }

    pub fn owned_by(mut self, vendor_id: impl Into<VendorId>) -> Self {
        self.vendor_id = Some(vendor_id.into());
        self
    }
}

/// Partial update of a shop's own fields; `None` fields are left alone.
///
/// The price range is derived from the menu and cannot be set here.
#[derive(Debug, Clone, Default)]
pub struct UpdateShop {
    pub shop_name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub order_active: Option<bool>,
    pub reserve_active: Option<bool>,
    pub status: Option<ShopStatus>,
}

impl UpdateShop {
    fn validate(&self) -> Result<(), DomainError> {
        if self.shop_name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("shopName cannot be empty"));
        }
        Ok(())
    }

    fn apply(&self, shop: &mut Shop, now: DateTime<Utc>) {
        if let Some(name) = &self.shop_name {
            shop.shop_name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            shop.description = description.trim().to_string();
        }
        if let Some(image) = &self.image {
            let image = image.trim();
            shop.image = (!image.is_empty()).then(|| image.to_string());
        }
        if let Some(order_active) = self.order_active {
            shop.order_active = order_active;
        }
        if let Some(reserve_active) = self.reserve_active {
            shop.reserve_active = reserve_active;
        }
        if let Some(status) = self.status {
            shop.status = status;
        }
        shop.updated_at = now;
    }
}

/// Service for shop documents.
#[derive(Clone)]
pub struct ShopService<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> ShopService<S> {
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Registers a shop under a generated id.
    #[tracing::instrument(skip(self, cmd), fields(shop_name = %cmd.shop_name))]
    pub async fn register(&self, cmd: RegisterShop) -> Result<Shop, DomainError> {
        let shop_name = cmd.shop_name.trim();
        if shop_name.is_empty() {
            return Err(DomainError::validation("shopName is required"));
        }
        if let Some(vendor) = &cmd.vendor_id {
            require_segment("vendorId", vendor.as_str())?;
        }

        let now = Utc::now();
        let shop = Shop {
            id: ShopId::generate(),
            shop_name: shop_name.to_string(),
            vendor_id: cmd.vendor_id,
            description: cmd.description,
            image: cmd.image,
            order_active: cmd.order_active,
            reserve_active: cmd.reserve_active,
            status: ShopStatus::Open,
            price_min: None,
            price_max: None,
            menu_active_count: 0,
            created_at: now,
            updated_at: now,
        };
        self.store.set(&paths::shop(&shop.id), &shop).await?;

        tracing::info!(shop_id = %shop.id, "shop registered");
        Ok(shop)
    }

    /// Loads a shop.
    #[tracing::instrument(skip(self))]
    pub async fn get(&self, shop_id: &ShopId) -> Result<Shop, DomainError> {
        require_segment("shopId", shop_id.as_str())?;
        let doc = self
            .store
            .get(&paths::shop(shop_id))
            .await?
            .ok_or_else(|| DomainError::not_found("shop", shop_id))?;
        Shop::from_document(&doc)
    }

    /// Lists shops by name, optionally only those of one vendor.
    ///
    /// Unreadable shop documents are skipped.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, vendor_id: Option<&VendorId>) -> Result<Vec<Shop>, DomainError> {
        let mut query = Query::collection(paths::shops());
        if let Some(vendor) = vendor_id {
            require_segment("vendorId", vendor.as_str())?;
            query = query.filter_eq("vendorId", vendor.as_str());
        }

        let mut shops = Vec::new();
        for doc in self.store.query(&query).await? {
            match Shop::from_document(&doc) {
                Ok(shop) => shops.push(shop),
                Err(err) => tracing::warn!(path = %doc.path, error = %err, "skipping unreadable shop"),
            }
        }
        shops.sort_by(|a, b| a.shop_name.cmp(&b.shop_name).then_with(|| a.id.cmp(&b.id)));
        Ok(shops)
    }

    /// Finds the shop a vendor runs. With several, the oldest one wins.
    #[tracing::instrument(skip(self))]
    pub async fn find_by_vendor(&self, vendor_id: &VendorId) -> Result<Shop, DomainError> {
        self.list(Some(vendor_id))
            .await?
            .into_iter()
            .min_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)))
            .ok_or_else(|| DomainError::not_found("shop for vendor", vendor_id))
    }

    /// Changes some of a shop's fields.
    #[tracing::instrument(skip(self, cmd))]
    pub async fn update(&self, shop_id: &ShopId, cmd: UpdateShop) -> Result<Shop, DomainError> {
        require_segment("shopId", shop_id.as_str())?;
        cmd.validate()?;
        let shop = run_transaction(&self.store, self.retry, &UpdateShopTx { shop_id, cmd: &cmd })
            .await?;
        tracing::info!(shop_id = %shop.id, "shop updated");
        Ok(shop)
    }

    /// Removes a shop and its menu. Archived history stays behind.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, shop_id: &ShopId) -> Result<(), DomainError> {
        require_segment("shopId", shop_id.as_str())?;
        let removed_items =
            run_transaction(&self.store, self.retry, &DeleteShopTx { shop_id }).await?;
        tracing::info!(shop_id = %shop_id, removed_items, "shop deleted");
        Ok(())
    }
}

struct UpdateShopTx<'a> {
    shop_id: &'a ShopId,
    cmd: &'a UpdateShop,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for UpdateShopTx<'a> {
    type Output = Shop;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<Shop, DomainError> {
        let path = paths::shop(self.shop_id);
        let doc = tx
            .get(&path)
            .await?
            .ok_or_else(|| DomainError::not_found("shop", self.shop_id))?;
        let mut shop = Shop::from_document(&doc)?;

        self.cmd.apply(&mut shop, Utc::now());
        tx.set(&path, &shop)?;
        Ok(shop)
    }
}

/// Deletes the shop document and every menu item under it.
struct DeleteShopTx<'a> {
    shop_id: &'a ShopId,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for DeleteShopTx<'a> {
    type Output = usize;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<usize, DomainError> {
        let path = paths::shop(self.shop_id);
        if tx.get(&path).await?.is_none() {
            return Err(DomainError::not_found("shop", self.shop_id));
        }
        let menu = tx
            .query(&Query::collection(paths::menu(self.shop_id)))
            .await?;

        for item in &menu {
            tx.delete(&item.path);
        }
        tx.delete(&path);
        Ok(menu.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_store::InMemoryDocumentStore;
    use serde_json::json;

    #[tokio::test]
    async fn register_then_get() {
        let service = ShopService::new(InMemoryDocumentStore::new());
        let shop = service
            .register(RegisterShop::new("  Noodle House ").accepting_reservations())
            .await
            .unwrap();

        let loaded = service.get(&shop.id).await.unwrap();
        assert_eq!(loaded.shop_name, "Noodle House");
        assert!(loaded.reserve_active);
        assert!(loaded.order_active);
        assert_eq!(loaded, shop);
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let service = ShopService::new(InMemoryDocumentStore::new());
        let err = service.register(RegisterShop::new(" ")).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn list_sorts_by_name_and_filters_by_vendor() {
        let service = ShopService::new(InMemoryDocumentStore::new());
        service
            .register(RegisterShop::new("Zen Sushi").owned_by("v1"))
            .await
            .unwrap();
        service
            .register(RegisterShop::new("Arepa Bar").owned_by("v2"))
            .await
            .unwrap();

        let names: Vec<String> = service
            .list(None)
            .await
            .unwrap()
            .into_iter()
            .map(|s| s.shop_name)
            .collect();
        assert_eq!(names, vec!["Arepa Bar", "Zen Sushi"]);

        let v1 = service.list(Some(&VendorId::new("v1"))).await.unwrap();
        assert_eq!(v1.len(), 1);
        assert_eq!(v1[0].shop_name, "Zen Sushi");

        let found = service.find_by_vendor(&VendorId::new("v2")).await.unwrap();
        assert_eq!(found.shop_name, "Arepa Bar");
        let err = service
            .find_by_vendor(&VendorId::new("v9"))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { .. }));
    }

    #[tokio::test]
    async fn update_changes_only_given_fields() {
        let service = ShopService::new(InMemoryDocumentStore::new());
        let shop = service
            .register(RegisterShop::new("Noodle House"))
            .await
            .unwrap();

        let updated = service
            .update(
                &shop.id,
                UpdateShop {
                    description: Some(" Hand-pulled noodles ".into()),
                    status: Some(ShopStatus::Closed),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.shop_name, "Noodle House");
        assert_eq!(updated.description, "Hand-pulled noodles");
        assert_eq!(updated.status, ShopStatus::Closed);
        assert_eq!(service.get(&shop.id).await.unwrap(), updated);

        let blank = UpdateShop {
            shop_name: Some("  ".into()),
            ..Default::default()
        };
        let err = service.update(&shop.id, blank).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = service
            .update(&ShopId::new("ghost"), UpdateShop::default())
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "shop", .. }));
    }

    #[tokio::test]
    async fn delete_removes_shop_and_menu() {
        let store = InMemoryDocumentStore::new();
        let service = ShopService::new(store.clone());
        let shop = service.register(RegisterShop::new("Cafe")).await.unwrap();
        let item = paths::menu_item(&shop.id, &common::MenuItemId::new("m1"));
        store.set(&item, &json!({"name": "Latte", "price": 4})).await.unwrap();

        service.delete(&shop.id).await.unwrap();

        assert!(!store.exists(&paths::shop(&shop.id)).await.unwrap());
        assert!(!store.exists(&item).await.unwrap());
        let err = service.delete(&shop.id).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "shop", .. }));
    }

    #[tokio::test]
    async fn legacy_snake_case_name_is_read() {
        let store = InMemoryDocumentStore::new();
        store
            .set(&paths::shop(&ShopId::new("s1")), &json!({"shop_name": "Old Shop"}))
            .await
            .unwrap();

        let shop = ShopService::new(store).get(&ShopId::new("s1")).await.unwrap();
        assert_eq!(shop.id, ShopId::new("s1"));
        assert_eq!(shop.shop_name, "Old Shop");
        assert!(shop.order_active);
    }
}
