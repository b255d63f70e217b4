pub mod auth;
pub mod error;
pub mod logging;

pub use auth::{AuthUser, JwtVerifier, Role};
pub use error::ErrorResponse;
