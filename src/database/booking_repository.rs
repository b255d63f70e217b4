//! Booking ledger
//!
//! Durable record of booking attempts and their lifecycle. Bookings are
//! never deleted; every terminal outcome is a status transition applied
//! through a compare-and-set update so that webhook delivery and client
//! redirect confirmation can interleave safely.

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgRow;
use sqlx::{FromRow, PgPool, Row};
use thiserror::Error;
use uuid::Uuid;

use crate::database::error::DatabaseError;
use crate::database::tour_catalog::TourSummary;

/// Booking lifecycle status. `Confirmed` and `Canceled` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Canceled,
}

impl BookingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Canceled => "canceled",
        }
    }
}

impl std::str::FromStr for BookingStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "pending" => Ok(BookingStatus::Pending),
            "confirmed" => Ok(BookingStatus::Confirmed),
            "canceled" => Ok(BookingStatus::Canceled),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

/// Processor-side payment outcome, tracked independently of lifecycle
/// status but causally linked to it by the reconciliation engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Unpaid,
    Paid,
    Failed,
}

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentStatus::Unpaid => "unpaid",
            PaymentStatus::Paid => "paid",
            PaymentStatus::Failed => "failed",
        }
    }
}

impl std::str::FromStr for PaymentStatus {
    type Err = ParseStatusError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "unpaid" => Ok(PaymentStatus::Unpaid),
            "paid" => Ok(PaymentStatus::Paid),
            "failed" => Ok(PaymentStatus::Failed),
            other => Err(ParseStatusError(other.to_string())),
        }
    }
}

#[derive(Debug, Error)]
#[error("unknown status value: {0}")]
pub struct ParseStatusError(String);

/// Booking entity
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Booking {
    pub id: Uuid,
    pub user_id: Uuid,
    pub tour_id: Uuid,
    pub guests: i32,
    pub date: NaiveDate,
    pub status: BookingStatus,
    pub payment_status: PaymentStatus,
    pub payment_intent_id: String,
    pub amount_minor: i64,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for Booking {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        let status: String = row.try_get("status")?;
        let payment_status: String = row.try_get("payment_status")?;
        Ok(Booking {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            tour_id: row.try_get("tour_id")?,
            guests: row.try_get("guests")?,
            date: row.try_get("date")?,
            status: status.parse().map_err(|e: ParseStatusError| {
                sqlx::Error::ColumnDecode {
                    index: "status".to_string(),
                    source: Box::new(e),
                }
            })?,
            payment_status: payment_status.parse().map_err(|e: ParseStatusError| {
                sqlx::Error::ColumnDecode {
                    index: "payment_status".to_string(),
                    source: Box::new(e),
                }
            })?,
            payment_intent_id: row.try_get("payment_intent_id")?,
            amount_minor: row.try_get("amount_minor")?,
            currency: row.try_get("currency")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

/// A booking joined with the tour fields the client renders in listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BookingWithTour {
    #[serde(flatten)]
    pub booking: Booking,
    pub tour: TourSummary,
}

/// Input for persisting a new pending booking. Status and payment status
/// are not caller-supplied: every booking starts `pending`/`unpaid`.
#[derive(Debug, Clone)]
pub struct NewBooking {
    pub user_id: Uuid,
    pub tour_id: Uuid,
    pub guests: i32,
    pub date: NaiveDate,
    pub payment_intent_id: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// Persistence abstraction for booking records.
///
/// `transition` is the compare-and-set primitive: it applies the update only
/// when the row is still in `from`, and returns `None` when the precondition
/// no longer holds (someone else already moved the booking).
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn create(&self, new: NewBooking) -> Result<Booking, DatabaseError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError>;

    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Booking>, DatabaseError>;

    async fn find_by_owner(&self, user_id: Uuid) -> Result<Vec<BookingWithTour>, DatabaseError>;

    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        payment: PaymentStatus,
    ) -> Result<Option<Booking>, DatabaseError>;

    /// Unconditionally move a booking to `canceled`, leaving the payment
    /// status untouched. Idempotent by construction.
    async fn mark_canceled(&self, id: Uuid) -> Result<Booking, DatabaseError>;
}

const BOOKING_COLUMNS: &str = "id, user_id, tour_id, guests, date, status, payment_status, \
                               payment_intent_id, amount_minor, currency, created_at, updated_at";

/// Postgres-backed ledger. The `bookings.payment_intent_id` unique index
/// carries the at-most-one-booking-per-intent invariant.
pub struct PgBookingLedger {
    pool: PgPool,
}

impl PgBookingLedger {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl BookingLedger for PgBookingLedger {
    async fn create(&self, new: NewBooking) -> Result<Booking, DatabaseError> {
        sqlx::query_as::<_, Booking>(&format!(
            "INSERT INTO bookings \
             (user_id, tour_id, guests, date, status, payment_status, \
              payment_intent_id, amount_minor, currency) \
             VALUES ($1, $2, $3, $4, 'pending', 'unpaid', $5, $6, $7) \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(new.user_id)
        .bind(new.tour_id)
        .bind(new.guests)
        .bind(new.date)
        .bind(&new.payment_intent_id)
        .bind(new.amount_minor)
        .bind(&new.currency)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Booking>, DatabaseError> {
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_intent_id(&self, intent_id: &str) -> Result<Option<Booking>, DatabaseError> {
        // At most one row thanks to the unique index.
        sqlx::query_as::<_, Booking>(&format!(
            "SELECT {BOOKING_COLUMNS} FROM bookings WHERE payment_intent_id = $1"
        ))
        .bind(intent_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn find_by_owner(&self, user_id: Uuid) -> Result<Vec<BookingWithTour>, DatabaseError> {
        let rows = sqlx::query(
            "SELECT b.id, b.user_id, b.tour_id, b.guests, b.date, b.status, \
                    b.payment_status, b.payment_intent_id, b.amount_minor, b.currency, \
                    b.created_at, b.updated_at, \
                    t.id AS tour_pk, t.title, t.location, t.price_minor \
             FROM bookings b \
             JOIN tours t ON t.id = b.tour_id \
             WHERE b.user_id = $1 \
             ORDER BY b.created_at DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)?;

        rows.into_iter()
            .map(|row| {
                let booking = Booking::from_row(&row)?;
                let tour = TourSummary {
                    id: row.try_get("tour_pk")?,
                    title: row.try_get("title")?,
                    location: row.try_get("location")?,
                    price_minor: row.try_get("price_minor")?,
                };
                Ok(BookingWithTour { booking, tour })
            })
            .collect::<Result<Vec<_>, sqlx::Error>>()
            .map_err(DatabaseError::from_sqlx)
    }

    async fn transition(
        &self,
        id: Uuid,
        from: BookingStatus,
        to: BookingStatus,
        payment: PaymentStatus,
    ) -> Result<Option<Booking>, DatabaseError> {
        sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings \
             SET status = $3, payment_status = $4, updated_at = now() \
             WHERE id = $1 AND status = $2 \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .bind(from.as_str())
        .bind(to.as_str())
        .bind(payment.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }

    async fn mark_canceled(&self, id: Uuid) -> Result<Booking, DatabaseError> {
        sqlx::query_as::<_, Booking>(&format!(
            "UPDATE bookings \
             SET status = 'canceled', updated_at = now() \
             WHERE id = $1 \
             RETURNING {BOOKING_COLUMNS}"
        ))
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
