//! Stored-balance wallet on the user account document.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::UserId;
use doc_store::{Document, DocumentStore, RetryPolicy, Transaction, TransactionWork, run_transaction};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::Money;
use crate::error::DomainError;
use crate::paths::{self, require_segment};

/// The wallet fields of `users/{userId}`. Other account fields are left alone.
#[derive(Debug, Default, Deserialize)]
struct WalletFields {
    #[serde(default)]
    cost: Money,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct BalancePatch {
    cost: Money,
    updated_at: DateTime<Utc>,
}

/// Reads the balance from a user account document.
pub(crate) fn balance_of(doc: &Document) -> Result<Money, DomainError> {
    Ok(doc.decode::<WalletFields>()?.cost)
}

/// Fields to write to set a new balance.
pub(crate) fn balance_patch(balance: Money, now: DateTime<Utc>) -> Result<Value, DomainError> {
    Ok(serde_json::to_value(BalancePatch {
        cost: balance,
        updated_at: now,
    })?)
}

/// Command to add funds to a wallet.
#[derive(Debug, Clone)]
pub struct TopUp {
    pub user_id: UserId,
    pub amount: Money,
}

impl TopUp {
    pub fn new(user_id: impl Into<UserId>, amount: Money) -> Self {
        Self {
            user_id: user_id.into(),
            amount,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        require_segment("userId", self.user_id.as_str())?;
        if !self.amount.is_positive() {
            return Err(DomainError::validation("amount must be greater than 0"));
        }
        Ok(())
    }
}

/// Service for reading and funding wallets.
#[derive(Clone)]
pub struct WalletService<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> WalletService<S> {
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

    /// Returns the user's balance.
    #[tracing::instrument(skip(self))]
    pub async fn get_balance(&self, user_id: &UserId) -> Result<Money, DomainError> {
        require_segment("userId", user_id.as_str())?;
        let doc = self
            .store
            .get(&paths::user(user_id))
            .await?
            .ok_or_else(|| DomainError::not_found("user", user_id))?;
        balance_of(&doc)
    }

    /// Adds funds and returns the new balance. Creates the account if needed.
    #[tracing::instrument(skip(self, cmd), fields(user_id = %cmd.user_id, amount = %cmd.amount))]
    pub async fn top_up(&self, cmd: TopUp) -> Result<Money, DomainError> {
        cmd.validate()?;
        let balance = run_transaction(&self.store, self.retry, &TopUpTx { cmd: &cmd }).await?;
        tracing::info!(balance = %balance, "wallet topped up");
        Ok(balance)
    }
}

struct TopUpTx<'a> {
    cmd: &'a TopUp,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for TopUpTx<'a> {
    type Output = Money;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<Money, DomainError> {
        let path = paths::user(&self.cmd.user_id);
        let current = match tx.get(&path).await? {
            Some(doc) => balance_of(&doc)?,
            None => Money::zero(),
        };
        let balance = current + self.cmd.amount;
        tx.merge(&path, &balance_patch(balance, Utc::now())?)?;
        Ok(balance)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use doc_store::{DocumentStoreExt, InMemoryDocumentStore};
    use serde_json::json;

    #[tokio::test]
    async fn top_up_creates_and_increments() {
        let store = InMemoryDocumentStore::new();
        let wallet = WalletService::new(store.clone());
        let user = UserId::new("u1");

        let balance = wallet
            .top_up(TopUp::new("u1", Money::from_units(100)))
            .await
            .unwrap();
        assert_eq!(balance, Money::from_units(100));

        let balance = wallet
            .top_up(TopUp::new("u1", Money::from_cents(2550)))
            .await
            .unwrap();
        assert_eq!(balance, Money::from_cents(12550));
        assert_eq!(wallet.get_balance(&user).await.unwrap(), Money::from_cents(12550));
    }

    #[tokio::test]
    async fn top_up_keeps_other_account_fields() {
        let store = InMemoryDocumentStore::new();
        let path = paths::user(&UserId::new("u1"));
        store
            .set(&path, &json!({"username": "alice", "cost": 10}))
            .await
            .unwrap();

        WalletService::new(store.clone())
            .top_up(TopUp::new("u1", Money::from_units(5)))
            .await
            .unwrap();

        let doc = store.get(&path).await.unwrap().unwrap();
        assert_eq!(doc.data["username"], "alice");
        assert_eq!(doc.data["cost"], 15);
    }

    #[tokio::test]
    async fn non_positive_top_up_is_rejected() {
        let wallet = WalletService::new(InMemoryDocumentStore::new());
        let err = wallet
            .top_up(TopUp::new("u1", Money::zero()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn missing_account_is_not_found() {
        let wallet = WalletService::new(InMemoryDocumentStore::new());
        let err = wallet.get_balance(&UserId::new("ghost")).await.unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "user", .. }));
    }
}
