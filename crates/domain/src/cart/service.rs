//! Cart service: every cart mutation is one store transaction.

use async_trait::async_trait;
use chrono::Utc;
use common::CustomerId;
use doc_store::{DocumentStore, RetryPolicy, Transaction, TransactionWork, run_transaction};

use crate::error::DomainError;
use crate::paths::{self, require_segment};

use super::{AddToCart, Cart, UpdateCartQuantity};

/// Service for managing customer carts.
#[derive(Clone)]
pub struct CartService<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> CartService<S> {
    /// Creates a new cart service with the given store.
    pub fn new(store: S) -> Self {
        Self {
            store,
            retry: RetryPolicy::default(),
        }
    }

    /// Overrides how often a conflicting transaction is retried.
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Returns the persisted cart, or the empty cart if none exists yet.
    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, customer_id: &CustomerId) -> Result<Cart, DomainError> {
        require_segment("customerId", customer_id.as_str())?;

        match self.store.get(&paths::cart(customer_id)).await? {
            Some(doc) => decode_cart(&doc, customer_id),
            None => Ok(Cart::empty(customer_id.clone())),
        }
    }

    /// Adds a menu item to the cart, enforcing the single-shop lock.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id, shop_id = %cmd.shop_id))]
    pub async fn add_item(&self, cmd: AddToCart) -> Result<Cart, DomainError> {
        cmd.validate()?;

        let cart = run_transaction(&self.store, self.retry, &AddItemTx { cmd: &cmd }).await?;

        metrics::counter!("cart_items_added_total").increment(1);
        tracing::debug!(
            menu_item_id = %cmd.item.menu_item_id,
            quantity = cmd.quantity,
            total = %cart.total,
            "item added to cart"
        );
        Ok(cart)
    }

    /// Changes a line's quantity, removing it when the quantity is `<= 0`.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id, menu_item_id = %cmd.menu_item_id))]
    pub async fn update_quantity(&self, cmd: UpdateCartQuantity) -> Result<Cart, DomainError> {
        cmd.validate()?;
        run_transaction(&self.store, self.retry, &UpdateQuantityTx { cmd: &cmd }).await
    }
}

fn decode_cart(doc: &doc_store::Document, customer_id: &CustomerId) -> Result<Cart, DomainError> {
    let mut cart: Cart = doc.decode()?;
    if cart.customer_id.is_blank() {
        cart.customer_id = customer_id.clone();
    }
    Ok(cart)
}

/// Reads the cart through the transaction; a missing cart reads as empty.
pub(crate) async fn load_cart<S: DocumentStore>(
    tx: &mut Transaction<'_, S>,
    customer_id: &CustomerId,
) -> Result<Option<Cart>, DomainError> {
    match tx.get(&paths::cart(customer_id)).await? {
        Some(doc) => decode_cart(&doc, customer_id).map(Some),
        None => Ok(None),
    }
}

struct AddItemTx<'a> {
    cmd: &'a AddToCart,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for AddItemTx<'a> {
    type Output = Cart;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<Cart, DomainError> {
        let cmd = self.cmd;
        let mut cart = load_cart(tx, &cmd.customer_id)
            .await?
            .unwrap_or_else(|| Cart::empty(cmd.customer_id.clone()));

        cart.add_item(
            &cmd.shop_id,
            cmd.shop_name.trim(),
            &cmd.item,
            cmd.line_quantity(),
            Utc::now(),
        )?;

        tx.set(&paths::cart(&cmd.customer_id), &cart)?;
        Ok(cart)
    }
}

struct UpdateQuantityTx<'a> {
    cmd: &'a UpdateCartQuantity,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for UpdateQuantityTx<'a> {
    type Output = Cart;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<Cart, DomainError> {
        let cmd = self.cmd;
        let mut cart = load_cart(tx, &cmd.customer_id)
            .await?
            .ok_or_else(|| DomainError::not_found("cart", &cmd.customer_id))?;

        cart.set_quantity(
            &cmd.menu_item_id,
            cmd.quantity,
            cmd.vendor_id.as_ref(),
            cmd.shop_id.as_ref(),
            Utc::now(),
        )?;

        tx.set(&paths::cart(&cmd.customer_id), &cart)?;
        Ok(cart)
    }
}
