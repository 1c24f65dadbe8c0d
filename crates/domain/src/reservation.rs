//! Table reservations.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use common::{ReservationId, ShopId, UserId};
use doc_store::{DocumentStore, Query, RetryPolicy, Transaction, TransactionWork, run_transaction};
use serde::{Deserialize, Serialize};

use crate::error::DomainError;
use crate::paths::{self, require_segment};
use crate::shop::Shop;

/// Shops keep local time at UTC+7.
pub const SHOP_UTC_OFFSET_SECONDS: i32 = 7 * 3600;

/// Calendar day (`YYYY-MM-DD`) of an instant in shop local time.
pub fn day_key(at: DateTime<Utc>) -> String {
    match FixedOffset::east_opt(SHOP_UTC_OFFSET_SECONDS) {
        Some(offset) => at.with_timezone(&offset).format("%Y-%m-%d").to_string(),
        None => at.format("%Y-%m-%d").to_string(),
    }
}

/// A reservation document at `reservations/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Reservation {
    #[serde(default)]
    pub id: ReservationId,
    pub shop_id: ShopId,
    pub user_id: UserId,
    pub people: u32,
    #[serde(default)]
    pub phone: String,
    #[serde(default)]
    pub note: String,
    pub start_at: DateTime<Utc>,
    pub day_key: String,
    pub created_at: DateTime<Utc>,
}

/// Command to book a table.
#[derive(Debug, Clone)]
pub struct CreateReservation {
    pub shop_id: ShopId,
    pub user_id: UserId,
    pub people: i64,
    pub phone: Option<String>,
    pub note: Option<String>,
    pub start_at: DateTime<Utc>,
}

impl CreateReservation {
    pub fn new(
        shop_id: impl Into<ShopId>,
        user_id: impl Into<UserId>,
        people: i64,
        start_at: DateTime<Utc>,
    ) -> Self {
        Self {
            shop_id: shop_id.into(),
            user_id: user_id.into(),
            people,
            phone: None,
            note: None,
            start_at,
        }
    }

    fn validate(&self) -> Result<(), DomainError> {
        require_segment("shopId", self.shop_id.as_str())?;
        require_segment("userId", self.user_id.as_str())?;
        Ok(())
    }

    fn party_size(&self) -> u32 {
        if self.people <= 0 {
            1
        } else {
            u32::try_from(self.people).unwrap_or(u32::MAX)
        }
    }
}

/// Service for reservations.
#[derive(Clone)]
pub struct ReservationService<S: DocumentStore> {
    store: S,
    retry: RetryPolicy,
}

impl<S: DocumentStore> ReservationService<S> {
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

    /// Books a table at a shop that accepts reservations.
    #[tracing::instrument(skip(self, cmd), fields(shop_id = %cmd.shop_id, user_id = %cmd.user_id))]
    pub async fn create(&self, cmd: CreateReservation) -> Result<Reservation, DomainError> {
        cmd.validate()?;
        let reservation =
            run_transaction(&self.store, self.retry, &CreateReservationTx { cmd: &cmd }).await?;
        tracing::info!(reservation_id = %reservation.id, day = %reservation.day_key, "reservation created");
        Ok(reservation)
    }

    /// Lists a shop's reservations by start time.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_shop(&self, shop_id: &ShopId) -> Result<Vec<Reservation>, DomainError> {
        require_segment("shopId", shop_id.as_str())?;
        self.list_where("shopId", shop_id.as_str()).await
    }

    /// Lists a user's reservations across shops by start time.
    #[tracing::instrument(skip(self))]
    pub async fn list_by_user(&self, user_id: &UserId) -> Result<Vec<Reservation>, DomainError> {
        require_segment("userId", user_id.as_str())?;
        self.list_where("userId", user_id.as_str()).await
    }

    async fn list_where(&self, field: &str, value: &str) -> Result<Vec<Reservation>, DomainError> {
        let query = Query::collection(paths::reservations()).filter_eq(field, value);

        let mut reservations = Vec::new();
        for doc in self.store.query(&query).await? {
            let mut reservation: Reservation = doc.decode()?;
            if reservation.id.is_blank() {
                reservation.id = ReservationId::new(doc.path.id());
            }
            reservations.push(reservation);
        }
        reservations.sort_by(|a, b| a.start_at.cmp(&b.start_at));
        Ok(reservations)
    }
}

struct CreateReservationTx<'a> {
    cmd: &'a CreateReservation,
}

#[async_trait]
impl<'a, S: DocumentStore> TransactionWork<S> for CreateReservationTx<'a> {
    type Output = Reservation;
    type Error = DomainError;

    async fn run(&self, tx: &mut Transaction<'_, S>) -> Result<Reservation, DomainError> {
        let cmd = self.cmd;
        let doc = tx
            .get(&paths::shop(&cmd.shop_id))
            .await?
            .ok_or_else(|| DomainError::not_found("shop", &cmd.shop_id))?;
        let shop = Shop::from_document(&doc)?;
        if !shop.reserve_active {
            return Err(DomainError::validation(
                "shop is not accepting reservations",
            ));
        }

        let reservation = Reservation {
            id: ReservationId::generate(),
            shop_id: cmd.shop_id.clone(),
            user_id: cmd.user_id.clone(),
            people: cmd.party_size(),
            phone: cmd.phone.clone().unwrap_or_default().trim().to_string(),
            note: cmd.note.clone().unwrap_or_default().trim().to_string(),
            start_at: cmd.start_at,
            day_key: day_key(cmd.start_at),
            created_at: Utc::now(),
        };
        tx.set(&paths::reservation(&reservation.id), &reservation)?;
        Ok(reservation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shop::{RegisterShop, ShopService};
    use doc_store::InMemoryDocumentStore;

    fn at(rfc3339: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(rfc3339)
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn day_key_uses_shop_local_date() {
        assert_eq!(day_key(at("2024-05-01T16:59:00Z")), "2024-05-01");
        assert_eq!(day_key(at("2024-05-01T17:00:00Z")), "2024-05-02");
    }

    #[tokio::test]
    async fn create_defaults_party_size_and_lists_by_start() {
        let store = InMemoryDocumentStore::new();
        let shop = ShopService::new(store.clone())
            .register(RegisterShop::new("Grill").accepting_reservations())
            .await
            .unwrap();
        let service = ReservationService::new(store);

        let late = service
            .create(CreateReservation::new(shop.id.clone(), "u1", 0, at("2024-05-02T12:00:00Z")))
            .await
            .unwrap();
        service
            .create(CreateReservation::new(shop.id.clone(), "u2", 4, at("2024-05-01T12:00:00Z")))
            .await
            .unwrap();

        assert_eq!(late.people, 1);
        assert_eq!(late.day_key, "2024-05-02");

        let listed = service.list_by_shop(&shop.id).await.unwrap();
        let users: Vec<&str> = listed.iter().map(|r| r.user_id.as_str()).collect();
        assert_eq!(users, vec!["u2", "u1"]);
    }

    #[tokio::test]
    async fn user_listing_spans_shops() {
        let store = InMemoryDocumentStore::new();
        let shops = ShopService::new(store.clone());
        let grill = shops
            .register(RegisterShop::new("Grill").accepting_reservations())
            .await
            .unwrap();
        let cafe = shops
            .register(RegisterShop::new("Cafe").accepting_reservations())
            .await
            .unwrap();
        let service = ReservationService::new(store);

        for (shop, user, at_) in [
            (&cafe, "u1", "2024-05-03T12:00:00Z"),
            (&grill, "u1", "2024-05-01T12:00:00Z"),
            (&grill, "u2", "2024-05-02T12:00:00Z"),
        ] {
            service
                .create(CreateReservation::new(shop.id.clone(), user, 2, at(at_)))
                .await
                .unwrap();
        }

        let mine = service.list_by_user(&UserId::new("u1")).await.unwrap();
        let shop_ids: Vec<&ShopId> = mine.iter().map(|r| &r.shop_id).collect();
        assert_eq!(shop_ids, vec![&grill.id, &cafe.id]);

        let err = service.list_by_user(&UserId::new(" ")).await.unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));
    }

    #[tokio::test]
    async fn shop_must_accept_reservations() {
        let store = InMemoryDocumentStore::new();
        let shop = ShopService::new(store.clone())
            .register(RegisterShop::new("Cafe"))
            .await
            .unwrap();
        let service = ReservationService::new(store);

        let err = service
            .create(CreateReservation::new(shop.id, "u1", 2, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Validation(_)));

        let err = service
            .create(CreateReservation::new("ghost", "u1", 2, Utc::now()))
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::NotFound { entity: "shop", .. }));
    }

    #[tokio::test]
    async fn unknown_shop_lists_nothing() {
        let service = ReservationService::new(InMemoryDocumentStore::new());
        assert!(service.list_by_shop(&ShopId::new("none")).await.unwrap().is_empty());
    }
}
