//! Shop menus.
//!
//! Items live at `shops/{shopId}/menu/{menuItemId}`. Every menu write also
//! rewrites the shop's price range (`priceMin`, `priceMax`,
//! `menuActiveCount`) in the same transaction, so the shop document always
//! matches its active items.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{MenuItemId, ShopId};
use doc_store::{
    Document, DocumentStore, Query, RetryPolicy, Transaction, TransactionWork, run_transaction,
};
use serde::{Deserialize, Serialize};

use crate::Money;
use crate::error::DomainError;
use crate::paths::{self, require_segment};

fn default_true() -> bool {
    true
}

/// One dish on a shop's menu.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MenuItem {
    #[serde(default)]
    pub id: MenuItemId,

    #[serde(default, alias = "shop_id")]
    pub shop_id: ShopId,

    #[serde(default, alias = "Name")]
    pub name: String,

    #[serde(default, alias = "Description")]
    pub description: String,

    #[serde(default, alias = "Image", skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,

    #[serde(default, alias = "Price")]
    pub price: Money,

    #[serde(default = "default_true")]
    pub active: bool,

    #[serde(default, alias = "CreatedAt")]
    pub created_at: DateTime<Utc>,

    #[serde(default, alias = "UpdatedAt")]
    pub updated_at: DateTime<Utc>,
}

impl MenuItem {
    fn from_document(doc: &Document, shop_id: &ShopId) -> Result<Self, DomainError> {
        let mut item: MenuItem = doc.decode()?;
        if item.id.is_blank() {
            item.id = MenuItemId::new(doc.path.id());
        }
        if item.shop_id.is_blank() {
            item.shop_id = shop_id.clone();
        }
        Ok(item)
    }
}

/// Price summary of a shop's active menu items, stored on the shop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceRange {
    pub price_min: Option<Money>,
    pub price_max: Option<Money>,
    pub menu_active_count: u32,
}

impl PriceRange {
    /// Summarizes the active items; inactive ones are ignored.
    pub fn of<'a>(items: impl IntoIterator<Item = &'a MenuItem>) -> Self {
        items
            .into_iter()
            .filter(|item| item.active)
            .fold(Self::default(), |mut range, item| {
                range.price_min = Some(range.price_min.map_or(item.price, |p| p.min(item.price)));
                range.price_max = Some(range.price_max.map_or(item.price, |p| p.max(item.price)));
                range.menu_active_count += 1;
                range
            })
    }
}

fn clean_image(raw: &str) -> Result<Option<String>, DomainError> {
    let image = raw.trim();
    if image.is_empty() {
        return Ok(None);
    }
    if !(image.starts_with("http://") || image.starts_with("https://")) {
        return Err(DomainError::validation("image must be an http(s) url"));
    }
    Ok(Some(image.to_string()))
}

fn check_price(price: Money) -> Result<(), DomainError> {
    if price.is_negative() {
        return Err(DomainError::validation("price must be >= 0"));
    }
    Ok(())
}

/// Command to add an item to a menu.
#[derive(Debug, Clone, Default)]
pub struct CreateMenuItem {
    pub name: String,
    pub price: Option<Money>,
    pub description: String,
    pub image: Option<String>,
    /// Defaults to active.
    pub active: Option<bool>,
}

impl CreateMenuItem {
    pub fn new(name: impl Into<String>, price: Money) -> Self {
        Self {
            name: name.into(),
            price: Some(price),
            ..Default::default()
        }
    }

    fn build(&self, shop_id: &ShopId, now: DateTime<Utc>) -> Result<MenuItem, DomainError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(DomainError::validation("name is required"));
        }
        let price = self
            .price
            .ok_or_else(|| DomainError::validation("price is required"))?;
        check_price(price)?;

        Ok(MenuItem {
            id: MenuItemId::generate(),
            shop_id: shop_id.clone(),
            name: name.to_string(),
            description: self.description.trim().to_string(),
            image: clean_image(self.image.as_deref().unwrap_or_default())?,
            price,
            active: self.active.unwrap_or(true),
            created_at: now,
            updated_at: now,
        })
    }
}

/// Partial update of a menu item; `None` fields are left alone.
#[derive(Debug, Clone, Default)]
pub struct UpdateMenuItem {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image: Option<String>,
    pub price: Option<Money>,
    pub active: Option<bool>,
}

impl UpdateMenuItem {
    fn validate(&self) -> Result<(), DomainError> {
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(DomainError::validation("name cannot be empty"));
        }
        if let Some(price) = self.price {
            check_price(price)?;
        }
        if let Some(image) = &self.image {
            clean_image(image)?;
        }
        Ok(())
    }

    fn apply(&self, item: &mut MenuItem, now: DateTime<Utc>) -> Result<(), DomainError> {
        if let Some(name) = &self.name {
            item.name = name.trim().to_string();
        }
        if let Some(description) = &self.description {
            item.description = description.trim().to_string();
        }
        if let Some(image) = &self.image {
            item.image = clean_image(image)?;
        }
        if let Some(price) = self.price {
            item.price = price;
        }
        if let Some(active) = self.active {
            item.active = active;
        }
        item.updated_at = now;
        Ok(())
    }
}

/// Outcome of a menu write.
#[derive(Debug, Clone, PartialEq)]
pub struct MenuWrite {
    /// The item as stored; `None` after a delete.
    pub item: Option<MenuItem>,
    /// The shop's price range after the write.
    pub price_range: PriceRange,
}

/// Service for shop menus.
#[derive(Clone)]
pub struct MenuService<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> MenuService<S> {
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

    /// Adds an item to an existing shop's menu.
    #[tracing::instrument(skip(self, cmd), fields(name = %cmd.name))]
    pub async fn create(
        &self,
        shop_id: &ShopId,
        cmd: CreateMenuItem,
    ) -> Result<MenuWrite, DomainError> {
        require_segment("shopId", shop_id.as_str())?;
        // Built once so a retried transaction reuses the same id
        let item = cmd.build(shop_id, Utc::now())?;

        let write = self.write(shop_id, MenuChange::Create(&item)).await?;
        metrics::counter!("menu_writes_total", "op" => "create").increment(1);
        tracing::info!(menu_item_id = %item.id, "menu item created");
        Ok(write)
    }

    /// Lists a shop's menu, oldest item first.
    #[tracing::instrument(skip(self))]
    pub async fn list(&self, shop_id: &ShopId) -> Result<Vec<MenuItem>, DomainError> {
        require_segment("shopId", shop_id.as_str())?;
        let docs = self
            .store
            .query(&Query::collection(paths::menu(shop_id)))
            .await?;

        let mut items = Vec::with_capacity(docs.len());
        for doc in &docs {
            match MenuItem::from_document(doc, shop_id) {
                Ok(item) => items.push(item),
                Err(err) => {
                    tracing::warn!(path = %doc.path, error = %err, "skipping unreadable menu item")
                }
            }
        }
        items.sort_by(|a, b| {
            a.created_at
                .cmp(&b.created_at)
                .then_with(|| a.name.cmp(&b.name))
        });
        Ok(items)
    }

    /// Changes some fields of a menu item.
    #[tracing::instrument(skip(self, cmd))]
    pub async fn update(
        &self,
        shop_id: &ShopId,
        item_id: &MenuItemId,
        cmd: UpdateMenuItem,
    ) -> Result<MenuWrite, DomainError> {
        require_segment("shopId", shop_id.as_str())?;
        require_segment("menuItemId", item_id.as_str())?;
        cmd.validate()?;

        let write = self
            .write(shop_id, MenuChange::Update(item_id, &cmd))
            .await?;
        metrics::counter!("menu_writes_total", "op" => "update").increment(1);
        Ok(write)
    }

    /// Removes an item from a menu.
    #[tracing::instrument(skip(self))]
    pub async fn delete(
        &self,
        shop_id: &ShopId,
        item_id: &MenuItemId,
    ) -> Result<MenuWrite, DomainError> {
        require_segment("shopId", shop_id.as_str())?;
        require_segment("menuItemId", item_id.as_str())?;

        let write = self.write(shop_id, MenuChange::Delete(item_id)).await?;
        metrics::counter!("menu_writes_total", "op" => "delete").increment(1);
        tracing::info!(menu_item_id = %item_id, "menu item deleted");
        Ok(write)
    }

    async fn write(
        &self,
        shop_id: &ShopId,
        change: MenuChange<'_>,
    ) -> Result<MenuWrite, DomainError> {
        run_transaction(&self.store, self.retry, &MenuWriteTx { shop_id, change }).await
    }
}

enum MenuChange<'a> {
    Create(&'a MenuItem),
    Update(&'a MenuItemId, &'a UpdateMenuItem),
    Delete(&'a MenuItemId),
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ShopPricePatch {
    #[serde(flatten)]
    range: PriceRange,
    updated_at: DateTime<Utc>,
}

/// Applies one menu change and rewrites the shop's price range.
///
/// Every menu writer updates the shop document, so the shop read guards the
/// menu listing against concurrent inserts.
struct MenuWriteTx<'a> {
    shop_id: &'a ShopId,
    change: MenuChange<'a>,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for MenuWriteTx<'a> {
    type Output = MenuWrite;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<MenuWrite, DomainError> {
        let shop_path = paths::shop(self.shop_id);
        if tx.get(&shop_path).await?.is_none() {
            return Err(DomainError::not_found("shop", self.shop_id));
        }

        let target = match &self.change {
            MenuChange::Create(item) => item.id.clone(),
            MenuChange::Update(id, _) | MenuChange::Delete(id) => (*id).clone(),
        };
        let item_path = paths::menu_item(self.shop_id, &target);
        let existing = match &self.change {
            MenuChange::Create(_) => None,
            MenuChange::Update(..) | MenuChange::Delete(_) => {
                let doc = tx
                    .get(&item_path)
                    .await?
                    .ok_or_else(|| DomainError::not_found("menu item", &target))?;
                Some(MenuItem::from_document(&doc, self.shop_id)?)
            }
        };

        let mut menu = Vec::new();
        for doc in tx.query(&Query::collection(paths::menu(self.shop_id))).await? {
            if doc.path.id() == target.as_str() {
                continue;
            }
            match MenuItem::from_document(&doc, self.shop_id) {
                Ok(item) => menu.push(item),
                Err(err) => tracing::warn!(
                    path = %doc.path,
                    error = %err,
                    "unreadable menu item left out of price range"
                ),
            }
        }

        let now = Utc::now();
        let written = match (&self.change, existing) {
            (MenuChange::Create(item), _) => Some((*item).clone()),
            (MenuChange::Update(_, cmd), Some(mut item)) => {
                cmd.apply(&mut item, now)?;
                Some(item)
            }
            _ => None,
        };
        if let Some(item) = &written {
            menu.push(item.clone());
        }
        let price_range = PriceRange::of(&menu);

        match &written {
            Some(item) => tx.set(&item_path, item)?,
            None => tx.delete(&item_path),
        }
        let patch = serde_json::to_value(ShopPricePatch {
            range: price_range,
            updated_at: now,
        })?;
        tx.update(&shop_path, patch)?;

        Ok(MenuWrite {
            item: written,
            price_range,
        })
    }
}
