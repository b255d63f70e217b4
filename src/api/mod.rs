pub mod bookings;

pub use bookings::{router, AppState};
