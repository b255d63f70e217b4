//! Tour catalog lookup
//!
//! The booking core treats the tour inventory as an external collaborator:
//! all it ever needs is price and display fields for a tour id. The trait
//! keeps the reconciliation engine testable without a database.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::database::error::DatabaseError;

/// The slice of a tour the booking workflow cares about.
/// `price_minor` is the per-guest price in minor currency units (cents).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TourSummary {
    pub id: Uuid,
    pub title: String,
    pub location: String,
    pub price_minor: i64,
}

#[async_trait]
pub trait TourCatalog: Send + Sync {
    async fn find_by_id(&self, tour_id: Uuid) -> Result<Option<TourSummary>, DatabaseError>;
}

pub struct PgTourCatalog {
    pool: PgPool,
}

impl PgTourCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TourCatalog for PgTourCatalog {
    async fn find_by_id(&self, tour_id: Uuid) -> Result<Option<TourSummary>, DatabaseError> {
        sqlx::query_as::<_, TourSummary>(
            "SELECT id, title, location, price_minor FROM tours WHERE id = $1",
        )
        .bind(tour_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(DatabaseError::from_sqlx)
    }
}
