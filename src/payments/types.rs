use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The processor's view of a charge attempt, as far as this backend needs
/// it: an opaque id to key the booking on, and the client-facing secret the
/// browser uses to complete payment out-of-band. The authoritative amount
/// and status stay with the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentIntent {
    pub intent_id: String,
    pub client_secret: String,
}

/// Audit metadata echoed onto the intent so processor-side records can be
/// traced back to the booking request that produced them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentMetadata {
    pub tour_id: Uuid,
    pub user_id: Uuid,
    pub guests: i32,
    pub date: NaiveDate,
}

/// Parsed, authenticity-verified processor notification.
///
/// Closed set on purpose: the engine handles every variant exhaustively and
/// event kinds it has no business with land in `Other`, which is always
/// acknowledged so the processor stops redelivering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationEvent {
    Succeeded { intent_id: String },
    Failed { intent_id: String },
    Other { kind: String },
}
