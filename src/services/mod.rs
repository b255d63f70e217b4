pub mod reconciliation;

pub use reconciliation::{BookingReceipt, ReconciliationEngine, RedirectOutcome};
