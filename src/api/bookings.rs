//! Booking API
//!
//! Thin HTTP layer over the reconciliation engine. Handlers validate shape,
//! attach the request id for error correlation and delegate; all state
//! machine logic lives in the engine.

use axum::{
    body::Bytes,
    extract::{FromRef, Path, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{delete, get, post},
    Json, Router,
};
use chrono::NaiveDate;
use serde::Deserialize;
use std::sync::Arc;
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::middleware::auth::{AuthUser, JwtVerifier};
use crate::middleware::error::get_request_id_from_headers;
use crate::services::reconciliation::{ReconciliationEngine, RedirectOutcome};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
    pub verifier: JwtVerifier,
}

impl FromRef<AppState> for JwtVerifier {
    fn from_ref(state: &AppState) -> JwtVerifier {
        state.verifier.clone()
    }
}

pub fn router(state: AppState) -> Router {
    // The dynamic segment is a tour id for /book and a booking id for the
    // rest; the router requires one shared parameter name per position.
    Router::new()
        .route("/bookings/{id}/book", post(create_booking))
        .route("/bookings/myBookings", get(list_my_bookings))
        .route("/bookings/{id}/confirm", post(confirm_booking))
        .route("/bookings/{id}/cancel", delete(cancel_booking))
        .route("/bookings/webhook", post(payment_webhook))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBookingRequest {
    pub guests: i32,
    pub date: NaiveDate,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBookingRequest {
    pub payment_intent_id: String,
    pub outcome: RedirectOutcome,
}

/// POST /tours/{tour_id}/bookings
async fn create_booking(
    State(state): State<AppState>,
    Path(tour_id): Path<Uuid>,
    headers: HeaderMap,
    user: AuthUser,
    Json(request): Json<CreateBookingRequest>,
) -> AppResult<impl IntoResponse> {
    let receipt = state
        .engine
        .request_booking(&user, tour_id, request.guests, request.date)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;

    Ok((StatusCode::CREATED, Json(receipt)))
}

/// GET /bookings
async fn list_my_bookings(
    State(state): State<AppState>,
    headers: HeaderMap,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let bookings = state
        .engine
        .my_bookings(&user)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;

    Ok(Json(bookings))
}

/// POST /bookings/{booking_id}/confirm
///
/// Called by the client after it returns from the payment UI. Best-effort
/// fallback; the webhook remains authoritative.
async fn confirm_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    headers: HeaderMap,
    user: AuthUser,
    Json(request): Json<ConfirmBookingRequest>,
) -> AppResult<impl IntoResponse> {
    let booking = state
        .engine
        .confirm_from_redirect(
            &user,
            booking_id,
            &request.payment_intent_id,
            request.outcome,
        )
        .await
        .map_err(|e| tag_request_id(e, &headers))?;

    Ok(Json(booking))
}

/// DELETE /bookings/{booking_id}
async fn cancel_booking(
    State(state): State<AppState>,
    Path(booking_id): Path<Uuid>,
    headers: HeaderMap,
    user: AuthUser,
) -> AppResult<impl IntoResponse> {
    let booking = state
        .engine
        .cancel_booking(&user, booking_id)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;

    Ok(Json(booking))
}

/// POST /webhooks/payments
///
/// The body must stay raw bytes: signature verification runs over exactly
/// what the processor sent.
async fn payment_webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<impl IntoResponse> {
    let signature = headers
        .get("stripe-signature")
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| AppError::invalid_signature("Missing Stripe-Signature header"))
        .map_err(|e| tag_request_id(e, &headers))?;

    state
        .engine
        .handle_notification(&body, signature)
        .await
        .map_err(|e| tag_request_id(e, &headers))?;

    Ok(Json(serde_json::json!({ "received": true })))
}

fn tag_request_id(error: AppError, headers: &HeaderMap) -> AppError {
    match get_request_id_from_headers(headers) {
        Some(id) => error.with_request_id(id),
        None => error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_booking_request_accepts_camel_case() {
        let request: CreateBookingRequest =
            serde_json::from_str(r#"{"guests": 2, "date": "2026-09-01"}"#)
                .expect("deserialization should succeed");
        assert_eq!(request.guests, 2);
    }

    #[test]
    fn confirm_request_parses_outcome() {
        let request: ConfirmBookingRequest = serde_json::from_str(
            r#"{"paymentIntentId": "pi_123", "outcome": "succeeded"}"#,
        )
        .expect("deserialization should succeed");
        assert_eq!(request.outcome, RedirectOutcome::Succeeded);
        assert_eq!(request.payment_intent_id, "pi_123");
    }
}
