//! Payment processor integration
//!
//! The gateway trait is the only seam to the processor; everything else in
//! the crate is wire-format agnostic.

pub mod error;
pub mod gateway;
pub mod providers;
pub mod types;
pub mod utils;

pub use error::{PaymentError, PaymentResult};
pub use gateway::PaymentGateway;
pub use types::{IntentMetadata, NotificationEvent, PaymentIntent};
