//! Order service: creation, status transitions and archive-and-retire.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{OrderId, ShopId};
use doc_store::{
    Direction, DocumentStore, Query, RetryPolicy, Transaction, TransactionWork, run_transaction,
};
use serde::Serialize;

use crate::error::DomainError;
use crate::migration::upgrade_order;
use crate::paths::{self, require_segment};
use crate::shop::Shop;

use super::{
    CreateOrder, HistoryCursor, HistoryPage, HistoryRecord, ListHistory, ORDER_SCHEMA_VERSION,
    Order, OrderError, OrderStatus, PaymentState, UpdateOrderStatus, order_total,
};

/// Result of a status update.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusUpdate {
    /// The live order moved to a non-terminal status.
    Updated(Order),
    /// The order completed and now lives only in history.
    Archived(HistoryRecord),
}

/// Service for managing orders.
#[derive(Clone)]
pub struct OrderService<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> OrderService<S> {
    /// Creates a new order service with the given store.
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

    /// Places an order directly. The total is computed from the lines.
    #[tracing::instrument(skip(self, cmd), fields(shop_id = %cmd.shop_id, customer_id = %cmd.customer_id))]
    pub async fn create_order(&self, cmd: CreateOrder) -> Result<Order, DomainError> {
        cmd.validate()?;

        let now = Utc::now();
        let order = Order {
            id: OrderId::generate(),
            shop_id: cmd.shop_id,
            customer_id: cmd.customer_id,
            user_id: None,
            status: OrderStatus::Prepare,
            total: order_total(&cmd.items),
            items: cmd.items,
            note: cmd.note,
            customer_name: cmd.customer_name.filter(|n| !n.trim().is_empty()),
            shop_name: None,
            payment: PaymentState::Due,
            schema_version: ORDER_SCHEMA_VERSION,
            created_at: now,
            updated_at: now,
        };

        // Generated ids never collide in practice; the read still guards the write.
        let path = paths::order(&order.id);
        let mut tx = Transaction::begin(&self.store);
        tx.get(&path).await?;
        tx.set(&path, &order)?;
        tx.commit().await?;

        metrics::counter!("orders_created_total").increment(1);
        tracing::info!(order_id = %order.id, total = %order.total, "order created");
        Ok(order)
    }

    /// Loads a live order.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(&self, order_id: &OrderId) -> Result<Order, DomainError> {
        require_segment("orderId", order_id.as_str())?;
        let doc = self
            .store
            .get(&paths::order(order_id))
            .await?
            .ok_or_else(|| DomainError::not_found("order", order_id))?;
        upgrade_order(order_id, &doc.data)
    }

    /// Lists a shop's live orders, newest first, optionally by status.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_shop(
        &self,
        shop_id: &ShopId,
        status: Option<&str>,
    ) -> Result<Vec<Order>, DomainError> {
        require_segment("shopId", shop_id.as_str())?;
        let status = status
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::parse::<OrderStatus>)
            .transpose()?;

        let mut query = Query::collection(paths::orders()).filter_eq("shopId", shop_id.as_str());
        if let Some(status) = status {
            query = query.filter_eq("status", status.as_str());
        }

        let docs = self.store.query(&query).await?;
        let mut orders = docs
            .iter()
            .map(|doc| upgrade_order(&OrderId::new(doc.path.id()), &doc.data))
            .collect::<Result<Vec<_>, _>>()?;
        orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(orders)
    }

    /// Moves an order to a new status; completing it archives the order.
    #[tracing::instrument(skip(self, cmd), fields(order_id = %cmd.order_id, status = %cmd.status))]
    pub async fn update_status(&self, cmd: UpdateOrderStatus) -> Result<StatusUpdate, DomainError> {
        let target = cmd.target()?;

        if target.is_terminal() {
            let record = run_transaction(
                &self.store,
                self.retry,
                &ArchiveTx {
                    order_id: &cmd.order_id,
                },
            )
            .await?;

            metrics::counter!("orders_archived_total").increment(1);
            tracing::info!(
                shop_id = %record.shop_id,
                user_id = %record.user_id,
                total = %record.total,
                "order completed and moved to history"
            );
            return Ok(StatusUpdate::Archived(record));
        }

        let order = run_transaction(
            &self.store,
            self.retry,
            &UpdateStatusTx {
                order_id: &cmd.order_id,
                status: target,
            },
        )
        .await?;
        Ok(StatusUpdate::Updated(order))
    }

    /// Reads one page of a history partition, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_history(&self, query: ListHistory) -> Result<HistoryPage, DomainError> {
        query.validate()?;
        let limit = query.effective_limit();

        let mut store_query = Query::collection(query.scope.collection());
        if let Some(status) = query.parsed_status()? {
            store_query = store_query.filter_eq("status", status.as_str());
        }
        store_query = store_query.order_by("movedAt", Direction::Descending);
        if let Some(cursor) = query.parsed_cursor()? {
            store_query = match cursor.history_id {
                Some(id) => store_query.start_after_document(cursor.moved_at, id),
                None => store_query.start_after(cursor.moved_at),
            };
        }
        store_query = store_query.limit(limit);

        let docs = self.store.query(&store_query).await?;
        let full_page = docs.len() == limit;

        let mut records = Vec::with_capacity(docs.len());
        for doc in &docs {
            match doc.decode::<HistoryRecord>() {
                Ok(record) => records.push(record),
                Err(err) => {
                    tracing::warn!(path = %doc.path, error = %err, "skipping unreadable history record")
                }
            }
        }

        // Built from the raw document so an unreadable last record still pages
        let next_cursor = if full_page {
            docs.last().and_then(|doc| {
                let moved_at = doc.field("movedAt")?.as_i64()?;
                Some(
                    HistoryCursor {
                        moved_at,
                        history_id: Some(doc.path.id().to_string()),
                    }
                    .to_string(),
                )
            })
        } else {
            None
        };

        Ok(HistoryPage {
            records,
            next_cursor,
        })
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusPatch {
    status: OrderStatus,
    updated_at: DateTime<Utc>,
}

struct UpdateStatusTx<'a> {
    order_id: &'a OrderId,
    status: OrderStatus,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for UpdateStatusTx<'a> {
    type Output = Order;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<Order, DomainError> {
        let path = paths::order(self.order_id);
        let doc = tx
            .get(&path)
            .await?
            .ok_or_else(|| DomainError::not_found("order", self.order_id))?;
        let mut order = upgrade_order(self.order_id, &doc.data)?;

        if !order.status.can_transition_to(self.status) {
            return Err(OrderError::InvalidTransition {
                from: order.status,
                to: self.status,
            }
            .into());
        }
        if order.status == self.status {
            return Ok(order);
        }

        order.status = self.status;
        order.updated_at = Utc::now();
        let patch = serde_json::to_value(StatusPatch {
            status: order.status,
            updated_at: order.updated_at,
        })?;
        tx.update(&path, patch)?;

        tracing::debug!(status = %order.status, "order status updated");
        Ok(order)
    }
}

/// Completes an order: history in both partitions and the live order
/// deleted, all or nothing. The wallet is never touched here; checkout
/// orders were charged when they were placed.
struct ArchiveTx<'a> {
    order_id: &'a OrderId,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for ArchiveTx<'a> {
    type Output = HistoryRecord;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<HistoryRecord, DomainError> {
        let path = paths::order(self.order_id);
        let doc = tx
            .get(&path)
            .await?
            .ok_or_else(|| DomainError::not_found("order", self.order_id))?;
        let mut order = upgrade_order(self.order_id, &doc.data)?;

        if order.shop_name.as_deref().is_none_or(|n| n.trim().is_empty()) {
            order.shop_name = Some(resolve_shop_name(tx, &order.shop_id).await?);
        }

        let now = Utc::now();
        order.status = OrderStatus::Done;
        order.updated_at = now;
        order.total = order_total(&order.items);
        let owner = order.owner();
        let record = HistoryRecord::from_order(&order, now);

        tx.merge(&paths::shop_history(&order.shop_id).doc(&order.id), &record)?;
        tx.merge(&paths::user_history(&owner).doc(&order.id), &record)?;
        tx.delete(&path);

        Ok(record)
    }
}

async fn resolve_shop_name<S: DocumentStore>(
    tx: &mut Transaction<'_, S>,
    shop_id: &ShopId,
) -> Result<String, DomainError> {
    let Some(doc) = tx.get(&paths::shop(shop_id)).await? else {
        return Ok(String::new());
    };
    match Shop::from_document(&doc) {
        Ok(shop) => Ok(shop.shop_name),
        Err(err) => {
            tracing::warn!(shop_id = %shop_id, error = %err, "unreadable shop document");
            Ok(String::new())
        }
    }
}
