//! Checkout: turns a cart into a paid order in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, UserId};
use doc_store::{DocumentStore, RetryPolicy, Transaction, TransactionWork, run_transaction};
use serde::{Deserialize, Serialize};

use crate::Money;
use crate::cart::{Cart, CartError, load_cart};
use crate::error::DomainError;
use crate::order::Order;
use crate::paths::{self, require_segment};
use crate::wallet::{balance_of, balance_patch};

const MAX_IDEMPOTENCY_KEY_LEN: usize = 128;

/// Command to check out a customer's cart against a user's wallet.
#[derive(Debug, Clone)]
pub struct Checkout {
    pub customer_id: CustomerId,
    pub user_id: UserId,
    /// Client-chosen key; a repeated checkout with the same key returns
    /// the first receipt instead of charging again.
    pub idempotency_key: Option<String>,
}

impl Checkout {
    pub fn new(customer_id: impl Into<CustomerId>, user_id: impl Into<UserId>) -> Self {
        Self {
            customer_id: customer_id.into(),
            user_id: user_id.into(),
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    fn validate(&self) -> Result<(), DomainError> {
        require_segment("customerId", self.customer_id.as_str())?;
        require_segment("userId", self.user_id.as_str())?;
        if let Some(key) = &self.idempotency_key {
            require_segment("idempotencyKey", key)?;
            if key.len() > MAX_IDEMPOTENCY_KEY_LEN {
                return Err(DomainError::validation(format!(
                    "idempotencyKey must be at most {MAX_IDEMPOTENCY_KEY_LEN} characters"
                )));
            }
        }
        Ok(())
    }
}

/// What a successful checkout returns. Stored as the idempotency record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckoutReceipt {
    /// Id under which the order will appear in history.
    pub history_id: OrderId,
    pub order_id: OrderId,
    pub total: Money,
    pub remaining_balance: Money,
    pub created_at: DateTime<Utc>,
}

/// A receipt plus whether it was replayed from an earlier checkout.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckoutOutcome {
    pub receipt: CheckoutReceipt,
    pub replayed: bool,
}

/// Service for checking out carts.
#[derive(Clone)]
pub struct CheckoutService<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> CheckoutService<S> {
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

    /// Creates the order, debits the wallet and clears the cart atomically.
    #[tracing::instrument(skip(self, cmd), fields(customer_id = %cmd.customer_id, user_id = %cmd.user_id))]
    pub async fn checkout(&self, cmd: Checkout) -> Result<CheckoutOutcome, DomainError> {
        cmd.validate()?;

        match run_transaction(&self.store, self.retry, &CheckoutTx { cmd: &cmd }).await {
            Ok(outcome) => {
                if outcome.replayed {
                    tracing::info!(order_id = %outcome.receipt.order_id, "checkout replayed");
                } else {
                    metrics::counter!("checkouts_total").increment(1);
                    metrics::counter!("orders_created_total").increment(1);
                    tracing::info!(
                        order_id = %outcome.receipt.order_id,
                        total = %outcome.receipt.total,
                        "checkout completed"
                    );
                }
                Ok(outcome)
            }
            Err(err) => {
                metrics::counter!("checkout_failures_total", "reason" => err.code()).increment(1);
                tracing::warn!(error = %err, "checkout failed");
                Err(err)
            }
        }
    }
}

struct CheckoutTx<'a> {
    cmd: &'a Checkout,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for CheckoutTx<'a> {
    type Output = CheckoutOutcome;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<CheckoutOutcome, DomainError> {
        let cmd = self.cmd;

        let receipt_path = cmd
            .idempotency_key
            .as_deref()
            .map(|key| paths::checkout_receipt(&cmd.customer_id, key));
        if let Some(path) = &receipt_path
            && let Some(doc) = tx.get(path).await?
        {
            return Ok(CheckoutOutcome {
                receipt: doc.decode()?,
                replayed: true,
            });
        }

        let cart = load_cart(tx, &cmd.customer_id)
            .await?
            .unwrap_or_else(|| Cart::empty(cmd.customer_id.clone()));
        let total = cart.checkout_total()?;
        let shop_id = cart
            .locked_shop()
            .cloned()
            .ok_or(CartError::MissingField("shopId"))?;

        let user_path = paths::user(&cmd.user_id);
        let account = tx
            .get(&user_path)
            .await?
            .ok_or_else(|| DomainError::not_found("user", &cmd.user_id))?;
        let available = balance_of(&account)?;
        if available < total {
            return Err(DomainError::InsufficientFunds {
                available,
                required: total,
            });
        }

        let now = Utc::now();
        let order = Order::from_cart(
            OrderId::generate(),
            &cart,
            shop_id,
            cmd.user_id.clone(),
            total,
            now,
        );
        let remaining = available - total;

        let mut cleared = cart;
        cleared.clear(now);

        tx.set(&paths::order(&order.id), &order)?;
        tx.update(&user_path, balance_patch(remaining, now)?)?;
        tx.set(&paths::cart(&cmd.customer_id), &cleared)?;

        let receipt = CheckoutReceipt {
            history_id: order.id.clone(),
            order_id: order.id,
            total,
            remaining_balance: remaining,
            created_at: now,
        };
        if let Some(path) = &receipt_path {
            tx.set(path, &receipt)?;
        }

        Ok(CheckoutOutcome {
            receipt,
            replayed: false,
        })
    }
}
