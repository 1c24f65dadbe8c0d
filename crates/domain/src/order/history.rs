//! Archived orders, partitioned by shop and by user.

use chrono::{DateTime, Utc};
use common::{CustomerId, OrderId, ShopId, UserId};
use doc_store::CollectionPath;
use serde::{Deserialize, Serialize};

use crate::Money;
use crate::error::DomainError;
use crate::paths::{self, require_segment};

use super::{Order, OrderLine, OrderStatus, PaymentState};

pub const DEFAULT_USER_HISTORY_LIMIT: usize = 20;
pub const DEFAULT_SHOP_HISTORY_LIMIT: usize = 50;
pub const MAX_HISTORY_LIMIT: usize = 200;

/// Immutable snapshot of a completed order.
///
/// The same record is written to `shops/{shopId}/history/{orderId}` and
/// `users/{userId}/history/{orderId}`. `movedAt` is epoch milliseconds; it
/// and the history id together form the pagination cursor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryRecord {
    pub history_id: OrderId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub customer_id: CustomerId,
    pub shop_id: ShopId,
    #[serde(default)]
    pub shop_name: String,
    pub status: OrderStatus,
    pub items: Vec<OrderLine>,
    pub item_count: u32,
    pub total: Money,
    #[serde(default)]
    pub note: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub customer_name: Option<String>,
    pub payment: PaymentState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub moved_at: DateTime<Utc>,
}

impl HistoryRecord {
    /// Snapshots a completed order.
    pub fn from_order(order: &Order, moved_at: DateTime<Utc>) -> Self {
        Self {
            history_id: order.id.clone(),
            order_id: order.id.clone(),
            user_id: order.owner(),
            customer_id: order.customer_id.clone(),
            shop_id: order.shop_id.clone(),
            shop_name: order.shop_name.clone().unwrap_or_default(),
            status: order.status,
            items: order.items.clone(),
            item_count: order.item_count(),
            total: order.total,
            note: order.note.clone(),
            customer_name: order.customer_name.clone(),
            payment: order.payment,
            created_at: order.created_at,
            updated_at: order.updated_at,
            moved_at,
        }
    }

    /// Cursor pointing just past this record.
    pub fn cursor(&self) -> HistoryCursor {
        HistoryCursor {
            moved_at: self.moved_at.timestamp_millis(),
            history_id: Some(self.history_id.to_string()),
        }
    }
}

/// Position in a newest-first history listing, rendered `{movedAt}:{historyId}`.
///
/// A bare `{movedAt}` is still accepted and skips every record with that
/// timestamp.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryCursor {
    pub moved_at: i64,
    pub history_id: Option<String>,
}

impl std::fmt::Display for HistoryCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.history_id {
            Some(id) => write!(f, "{}:{}", self.moved_at, id),
            None => write!(f, "{}", self.moved_at),
        }
    }
}

impl std::str::FromStr for HistoryCursor {
    type Err = DomainError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let invalid = || DomainError::validation(format!("invalid cursor: {raw}"));
        let (millis, id) = match raw.split_once(':') {
            Some((millis, id)) if !id.is_empty() => (millis, Some(id.to_string())),
            Some(_) => return Err(invalid()),
            None => (raw, None),
        };
        Ok(Self {
            moved_at: millis.parse().map_err(|_| invalid())?,
            history_id: id,
        })
    }
}

/// Which history partition to read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryScope {
    Shop(ShopId),
    User(UserId),
}

impl HistoryScope {
    pub(crate) fn collection(&self) -> CollectionPath {
        match self {
            HistoryScope::Shop(shop_id) => paths::shop_history(shop_id),
            HistoryScope::User(user_id) => paths::user_history(user_id),
        }
    }

    pub fn default_limit(&self) -> usize {
        match self {
            HistoryScope::Shop(_) => DEFAULT_SHOP_HISTORY_LIMIT,
            HistoryScope::User(_) => DEFAULT_USER_HISTORY_LIMIT,
        }
    }

    fn owner(&self) -> (&'static str, &str) {
        match self {
            HistoryScope::Shop(shop_id) => ("shopId", shop_id.as_str()),
            HistoryScope::User(user_id) => ("userId", user_id.as_str()),
        }
    }
}

/// Query for one page of history, newest first.
#[derive(Debug, Clone)]
pub struct ListHistory {
    pub scope: HistoryScope,
    pub limit: Option<usize>,
    /// `nextCursor` of the previous page.
    pub cursor: Option<String>,
    pub status: Option<String>,
}

impl ListHistory {
    pub fn new(scope: HistoryScope) -> Self {
        Self {
            scope,
            limit: None,
            cursor: None,
            status: None,
        }
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn after(mut self, cursor: impl Into<String>) -> Self {
        self.cursor = Some(cursor.into());
        self
    }

    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Effective page size: default when unset or zero, capped at the maximum.
    pub fn effective_limit(&self) -> usize {
        match self.limit {
            None | Some(0) => self.scope.default_limit(),
            Some(n) => n.min(MAX_HISTORY_LIMIT),
        }
    }

    pub(crate) fn parsed_cursor(&self) -> Result<Option<HistoryCursor>, DomainError> {
        match self.cursor.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw.parse().map(Some),
        }
    }

    pub(crate) fn parsed_status(&self) -> Result<Option<OrderStatus>, DomainError> {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => Ok(Some(raw.parse::<OrderStatus>()?)),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), DomainError> {
        let (field, owner) = self.scope.owner();
        require_segment(field, owner)?;
        self.parsed_cursor()?;
        self.parsed_status()?;
        Ok(())
    }
}

/// One page of history records.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryPage {
    pub records: Vec<HistoryRecord>,
    /// Present when the page is full; pass it back to fetch the next page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn limit_defaults_per_scope_and_is_capped() {
        let user = ListHistory::new(HistoryScope::User(UserId::new("u1")));
        assert_eq!(user.effective_limit(), 20);

        let shop = ListHistory::new(HistoryScope::Shop(ShopId::new("s1")));
        assert_eq!(shop.effective_limit(), 50);
        assert_eq!(shop.clone().limit(0).effective_limit(), 50);
        assert_eq!(shop.clone().limit(1000).effective_limit(), 200);
        assert_eq!(shop.limit(7).effective_limit(), 7);
    }

    #[test]
    fn malformed_cursor_is_rejected() {
        for raw in ["yesterday", "1000:", "abc:o1"] {
            let query = ListHistory::new(HistoryScope::User(UserId::new("u1"))).after(raw);
            assert!(matches!(query.validate(), Err(DomainError::Validation(_))));
        }
    }

    #[test]
    fn cursor_parses_with_and_without_history_id() {
        let full: HistoryCursor = "1000:o-1".parse().unwrap();
        assert_eq!(full.moved_at, 1000);
        assert_eq!(full.history_id.as_deref(), Some("o-1"));
        assert_eq!(full.to_string(), "1000:o-1");

        let bare: HistoryCursor = "1000".parse().unwrap();
        assert_eq!(bare.history_id, None);
        assert_eq!(bare.to_string(), "1000");
    }

    #[test]
    fn moved_at_is_stored_as_epoch_millis() {
        let moved_at = DateTime::from_timestamp_millis(1_700_000_000_123).unwrap();
        let record = HistoryRecord {
            history_id: OrderId::new("o1"),
            order_id: OrderId::new("o1"),
            user_id: UserId::new("u1"),
            customer_id: CustomerId::new("alice"),
            shop_id: ShopId::new("s1"),
            shop_name: "Shop".into(),
            status: OrderStatus::Done,
            items: vec![],
            item_count: 0,
            total: Money::zero(),
            note: String::new(),
            customer_name: None,
            payment: PaymentState::Paid,
            created_at: moved_at,
            updated_at: moved_at,
            moved_at,
        };

        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["movedAt"], 1_700_000_000_123i64);
        assert_eq!(record.cursor().to_string(), "1700000000123:o1");
    }
}
