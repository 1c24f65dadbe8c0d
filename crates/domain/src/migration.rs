//! Upgrades legacy order documents to the current schema.
//!
//! Orders written before `schemaVersion` existed used mixed key spellings
//! (`shop_id`, `order_items`, `Qty`) and loose number types (prices as
//! strings, quantities as floats). Reads go through [`upgrade_order`];
//! [`backfill_orders`] rewrites the stored documents once.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::{CustomerId, MenuItemId, OrderId, ShopId, UserId};
use doc_store::{DocumentStore, RetryPolicy, Transaction, TransactionWork, run_transaction};
use futures_util::StreamExt;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::Money;
use crate::error::DomainError;
use crate::order::{ORDER_SCHEMA_VERSION, Order, OrderError, OrderLine, OrderStatus, PaymentState, order_total};
use crate::paths;

/// Returns true if the raw document is at the current schema version.
pub fn is_current(raw: &Value) -> bool {
    raw.get("schemaVersion").and_then(Value::as_u64) == Some(u64::from(ORDER_SCHEMA_VERSION))
}

/// Decodes an order document of any schema version.
///
/// Current documents are decoded strictly. Legacy documents are coerced;
/// lines without an id are dropped, other malformed line fields fall back
/// to defaults.
pub fn upgrade_order(order_id: &OrderId, raw: &Value) -> Result<Order, DomainError> {
    if is_current(raw) {
        let mut order: Order = serde_json::from_value(raw.clone())?;
        order.id = order_id.clone();
        return Ok(order);
    }

    let obj = raw
        .as_object()
        .ok_or_else(|| DomainError::validation(format!("order {order_id} is not an object")))?;

    let shop_id = first_str(obj, &["shopId", "shop_id"]).ok_or(OrderError::MissingField("shopId"))?;
    let user_id = first_str(obj, &["userId", "user_id"]).map(UserId::new);
    let customer_id = first_str(obj, &["customerId", "customer_id", "userId"])
        .ok_or(OrderError::MissingField("customerId"))?;

    let status = match first_str(obj, &["status"]) {
        Some(raw_status) => raw_status.parse::<OrderStatus>().unwrap_or_else(|_| {
            tracing::warn!(order_id = %order_id, status = raw_status, "unknown legacy status, using prepare");
            OrderStatus::Prepare
        }),
        None => OrderStatus::Prepare,
    };

    let items: Vec<OrderLine> = first_value(obj, &["items", "order_items"])
        .and_then(Value::as_array)
        .map(|lines| {
            lines
                .iter()
                .enumerate()
                .filter_map(|(index, line)| upgrade_line(order_id, index, line))
                .collect()
        })
        .unwrap_or_default();

    let total = first_value(obj, &["total", "Total"])
        .and_then(loose_money)
        .filter(Money::is_positive)
        .unwrap_or_else(|| order_total(&items));

    let now = Utc::now();
    let updated_at = first_value(obj, &["updatedAt", "updated_at"]).and_then(loose_time);
    let created_at = first_value(obj, &["createdAt", "created_at"])
        .and_then(loose_time)
        .or(updated_at)
        .unwrap_or(now);

    Ok(Order {
        id: order_id.clone(),
        shop_id: ShopId::new(shop_id),
        customer_id: CustomerId::new(customer_id),
        user_id,
        status,
        items,
        total,
        note: first_str(obj, &["note"]).unwrap_or_default().to_string(),
        customer_name: first_str(obj, &["customerName", "customer_name"]).map(str::to_string),
        shop_name: first_str(obj, &["shopName", "shop_name"]).map(str::to_string),
        // Legacy flows never charged at completion.
        payment: PaymentState::Paid,
        schema_version: ORDER_SCHEMA_VERSION,
        created_at,
        updated_at: updated_at.unwrap_or(created_at),
    })
}

fn upgrade_line(order_id: &OrderId, index: usize, raw: &Value) -> Option<OrderLine> {
    let Some(obj) = raw.as_object() else {
        tracing::warn!(order_id = %order_id, index, "dropping non-object order line");
        return None;
    };

    let id = match first_value(obj, &["id", "menuId", "menuItemId"]) {
        Some(Value::String(s)) if !s.trim().is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        _ => {
            tracing::warn!(order_id = %order_id, index, "dropping order line without id");
            return None;
        }
    };

    let extras = obj.get("extras").filter(|v| !v.is_null()).cloned();

    Some(OrderLine {
        id: MenuItemId::new(id),
        name: first_str(obj, &["name", "Name"]).unwrap_or_default().to_string(),
        price: first_value(obj, &["price", "Price", "unitPrice"])
            .and_then(loose_money)
            .unwrap_or_default(),
        qty: first_value(obj, &["qty", "Qty", "quantity"])
            .and_then(loose_count)
            .unwrap_or_default(),
        image: first_str(obj, &["image"]).map(str::to_string),
        description: first_str(obj, &["description"]).map(str::to_string),
        extras,
    })
}

fn first_value<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|k| obj.get(*k).filter(|v| !v.is_null()))
}

fn first_str<'a>(obj: &'a Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    keys.iter()
        .filter_map(|k| obj.get(*k).and_then(Value::as_str))
        .map(str::trim)
        .find(|s| !s.is_empty())
}

fn loose_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
}

fn loose_money(value: &Value) -> Option<Money> {
    if let Some(units) = value.as_i64() {
        return Some(Money::from_units(units));
    }
    loose_number(value).and_then(Money::from_decimal)
}

fn loose_count(value: &Value) -> Option<u32> {
    let n = loose_number(value)?;
    if !n.is_finite() {
        return None;
    }
    Some(n.round().clamp(0.0, f64::from(u32::MAX)) as u32)
}

fn loose_time(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s.trim())
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        Value::Object(obj) => {
            let seconds = first_value(obj, &["_seconds", "seconds"]).and_then(Value::as_i64)?;
            DateTime::from_timestamp(seconds, 0)
        }
        _ => None,
    }
}

/// Outcome of a backfill run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackfillReport {
    pub scanned: usize,
    pub upgraded: usize,
    pub failed: usize,
}

/// Rewrites every live order that is not at the current schema version.
///
/// The collection is streamed, so large order sets are never loaded whole.
/// Each document is upgraded in its own transaction; a document that cannot
/// be upgraded is counted and skipped.
#[tracing::instrument(skip(store))]
pub async fn backfill_orders<S: DocumentStore>(
    store: &S,
    retry: RetryPolicy,
) -> Result<BackfillReport, DomainError> {
    let mut docs = store.stream_collection(&paths::orders()).await?;
    let mut report = BackfillReport::default();

    while let Some(doc) = docs.next().await {
        let doc = doc?;
        report.scanned += 1;
        if is_current(&doc.data) {
            continue;
        }

        let order_id = OrderId::new(doc.path.id());
        match run_transaction(store, retry, &UpgradeTx { order_id: &order_id }).await {
            Ok(true) => report.upgraded += 1,
            Ok(false) => {}
            Err(err) => {
                tracing::warn!(order_id = %order_id, error = %err, "order upgrade failed");
                report.failed += 1;
            }
        }
    }

    tracing::info!(
        scanned = report.scanned,
        upgraded = report.upgraded,
        failed = report.failed,
        "order backfill finished"
    );
    Ok(report)
}

struct UpgradeTx<'a> {
    order_id: &'a OrderId,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for UpgradeTx<'a> {
    type Output = bool;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<bool, DomainError> {
        let path = paths::order(self.order_id);
        let Some(doc) = tx.get(&path).await? else {
            return Ok(false);
        };
        if is_current(&doc.data) {
            return Ok(false);
        }

        let order = upgrade_order(self.order_id, &doc.data)?;
        tx.set(&path, &order)?;
        Ok(true)
    }
}
