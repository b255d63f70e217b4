//! Booking reconciliation engine
//!
//! Owns the booking lifecycle end to end: creating a payment intent and a
//! pending booking for it, applying processor notifications, accepting the
//! client's redirect report as a fallback confirmation path, and handling
//! cancellation. All state changes funnel through the ledger's
//! compare-and-set transition so concurrent webhook and redirect delivery
//! converge on the same terminal state.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::database::booking_repository::{
    Booking, BookingLedger, BookingStatus, BookingWithTour, NewBooking, PaymentStatus,
};
use crate::database::tour_catalog::TourCatalog;
use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::payments::{IntentMetadata, NotificationEvent, PaymentGateway};

const BOOKING_CURRENCY: &str = "usd";

/// What the client gets back from a booking request: the persisted pending
/// booking plus the client secret it needs to complete payment directly
/// with the processor.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingReceipt {
    pub booking: Booking,
    pub client_secret: String,
}

/// The outcome the client reports after returning from the payment UI.
/// Advisory only; a reported failure is never acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RedirectOutcome {
    Succeeded,
    Failed,
}

pub struct ReconciliationEngine {
    ledger: Arc<dyn BookingLedger>,
    catalog: Arc<dyn TourCatalog>,
    gateway: Arc<dyn PaymentGateway>,
}

impl ReconciliationEngine {
    pub fn new(
        ledger: Arc<dyn BookingLedger>,
        catalog: Arc<dyn TourCatalog>,
        gateway: Arc<dyn PaymentGateway>,
    ) -> Self {
        Self {
            ledger,
            catalog,
            gateway,
        }
    }

    /// Create a payment intent and persist a `pending`/`unpaid` booking
    /// keyed to it.
    ///
    /// The amount is always recomputed server-side from the catalog price,
    /// never taken from the request. If the processor call fails, nothing
    /// is persisted and the caller may simply retry.
    pub async fn request_booking(
        &self,
        user: &AuthUser,
        tour_id: Uuid,
        guests: i32,
        date: NaiveDate,
    ) -> AppResult<BookingReceipt> {
        if guests < 1 {
            return Err(AppError::validation("guests", "must be at least 1"));
        }
        if date < Utc::now().date_naive() {
            return Err(AppError::validation("date", "must not be in the past"));
        }

        let tour = self
            .catalog
            .find_by_id(tour_id)
            .await
            .map_err(AppError::from)?
            .ok_or_else(|| AppError::not_found("Tour", tour_id.to_string()))?;

        let amount_minor = tour.price_minor * i64::from(guests);

        let metadata = IntentMetadata {
            tour_id,
            user_id: user.id,
            guests,
            date,
        };
        let intent = self
            .gateway
            .create_intent(amount_minor, BOOKING_CURRENCY, &metadata)
            .await?;

        let booking = self
            .ledger
            .create(NewBooking {
                user_id: user.id,
                tour_id,
                guests,
                date,
                payment_intent_id: intent.intent_id.clone(),
                amount_minor,
                currency: BOOKING_CURRENCY.to_string(),
            })
            .await?;

        tracing::info!(
            booking_id = %booking.id,
            intent_id = %intent.intent_id,
            amount_minor,
            "Booking created, awaiting payment"
        );

        Ok(BookingReceipt {
            booking,
            client_secret: intent.client_secret,
        })
    }

    /// Verify and apply a processor webhook delivery.
    ///
    /// Only a failed signature check rejects the delivery. Everything past
    /// verification is acknowledged: the processor redelivers on non-2xx,
    /// and redelivering a notification we cannot act on (unknown intent,
    /// already-terminal booking, transient ledger failure) would only cause
    /// a retry storm. Transition application is idempotent, so acknowledging
    /// and letting the next delivery retry is always safe.
    pub async fn handle_notification(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> AppResult<()> {
        let event = self.gateway.verify_and_parse(payload, signature_header)?;

        match event {
            NotificationEvent::Succeeded { intent_id } => {
                self.apply_outcome(
                    &intent_id,
                    BookingStatus::Confirmed,
                    PaymentStatus::Paid,
                )
                .await;
            }
            NotificationEvent::Failed { intent_id } => {
                self.apply_outcome(
                    &intent_id,
                    BookingStatus::Canceled,
                    PaymentStatus::Failed,
                )
                .await;
            }
            NotificationEvent::Other { kind } => {
                tracing::info!(%kind, "Ignoring unhandled notification kind");
            }
        }

        Ok(())
    }

    /// Move the booking for `intent_id` from `pending` to the given terminal
    /// state. No-ops on unknown intents, already-terminal bookings and lost
    /// races; ledger errors are logged and swallowed so the delivery is
    /// still acknowledged.
    async fn apply_outcome(&self, intent_id: &str, to: BookingStatus, payment: PaymentStatus) {
        let booking = match self.ledger.find_by_intent_id(intent_id).await {
            Ok(Some(booking)) => booking,
            Ok(None) => {
                tracing::warn!(%intent_id, "Notification for unknown payment intent, ignoring");
                return;
            }
            Err(err) => {
                tracing::error!(%intent_id, error = %err, "Ledger lookup failed, acknowledging for redelivery");
                return;
            }
        };

        if booking.status != BookingStatus::Pending {
            tracing::debug!(
                booking_id = %booking.id,
                status = booking.status.as_str(),
                "Booking already in terminal state, notification is a no-op"
            );
            return;
        }

        match self
            .ledger
            .transition(booking.id, BookingStatus::Pending, to, payment)
            .await
        {
            Ok(Some(updated)) => {
                tracing::info!(
                    booking_id = %updated.id,
                    status = updated.status.as_str(),
                    payment_status = updated.payment_status.as_str(),
                    "Applied processor notification"
                );
            }
            Ok(None) => {
                tracing::debug!(
                    booking_id = %booking.id,
                    "Lost transition race, booking already moved"
                );
            }
            Err(err) => {
                tracing::error!(
                    booking_id = %booking.id,
                    error = %err,
                    "Transition failed, acknowledging for redelivery"
                );
            }
        }
    }

    /// Fallback confirmation when the client returns from the payment UI
    /// before the webhook lands.
    ///
    /// A reported success confirms a still-pending booking; a reported
    /// failure changes nothing, since a dropped connection can falsely look
    /// like a failed payment. Only the processor's own failure notification
    /// may cancel.
    pub async fn confirm_from_redirect(
        &self,
        user: &AuthUser,
        booking_id: Uuid,
        reported_intent_id: &str,
        outcome: RedirectOutcome,
    ) -> AppResult<Booking> {
        let booking = self.find_owned(user, booking_id).await?;

        if booking.payment_intent_id != reported_intent_id {
            return Err(AppError::forbidden(
                "Payment intent does not belong to this booking",
            ));
        }

        match outcome {
            RedirectOutcome::Failed => {
                tracing::info!(
                    booking_id = %booking.id,
                    "Client reported payment failure, leaving booking untouched"
                );
                Ok(booking)
            }
            RedirectOutcome::Succeeded if booking.status != BookingStatus::Pending => Ok(booking),
            RedirectOutcome::Succeeded => {
                match self
                    .ledger
                    .transition(
                        booking.id,
                        BookingStatus::Pending,
                        BookingStatus::Confirmed,
                        PaymentStatus::Paid,
                    )
                    .await?
                {
                    Some(updated) => Ok(updated),
                    // Webhook won the race; re-read whatever it wrote.
                    None => self
                        .ledger
                        .find_by_id(booking.id)
                        .await?
                        .ok_or_else(|| AppError::not_found("Booking", booking_id.to_string())),
                }
            }
        }
    }

    /// Cancel a booking on the owner's (or an admin's) behalf. Canceling an
    /// already-canceled booking is a no-op.
    pub async fn cancel_booking(&self, user: &AuthUser, booking_id: Uuid) -> AppResult<Booking> {
        let booking = self.find_owned(user, booking_id).await?;

        if booking.status == BookingStatus::Canceled {
            return Ok(booking);
        }

        let canceled = self.ledger.mark_canceled(booking.id).await?;
        tracing::info!(booking_id = %canceled.id, "Booking canceled");
        Ok(canceled)
    }

    pub async fn my_bookings(&self, user: &AuthUser) -> AppResult<Vec<BookingWithTour>> {
        self.ledger
            .find_by_owner(user.id)
            .await
            .map_err(AppError::from)
    }

    async fn find_owned(&self, user: &AuthUser, booking_id: Uuid) -> AppResult<Booking> {
        let booking = self
            .ledger
            .find_by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::not_found("Booking", booking_id.to_string()))?;

        if booking.user_id != user.id && !user.is_admin() {
            return Err(AppError::forbidden(
                "You do not have access to this booking",
            ));
        }

        Ok(booking)
    }
}
