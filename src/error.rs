//! Unified error handling for the booking backend
//!
//! Every error that can reach the HTTP boundary is mapped onto a small,
//! closed taxonomy with proper status codes, machine-readable codes and
//! user-facing messages. Ledger and gateway internals never leak raw.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::database::error::DatabaseError;
use crate::payments::error::PaymentError;

/// Machine-readable error codes for client handling
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum ErrorCode {
    #[serde(rename = "NOT_FOUND")]
    NotFound,
    #[serde(rename = "UNAUTHORIZED")]
    Unauthorized,
    #[serde(rename = "FORBIDDEN")]
    Forbidden,
    #[serde(rename = "INVALID_SIGNATURE")]
    InvalidSignature,
    #[serde(rename = "UPSTREAM_UNAVAILABLE")]
    UpstreamUnavailable,
    #[serde(rename = "VALIDATION_ERROR")]
    ValidationError,
    #[serde(rename = "CONFLICT")]
    Conflict,
    #[serde(rename = "INTERNAL_ERROR")]
    InternalError,
}

/// Unified application error type
#[derive(Debug, Clone)]
pub struct AppError {
    pub kind: AppErrorKind,
    pub request_id: Option<String>,
}

#[derive(Debug, Clone)]
pub enum AppErrorKind {
    /// Tour or booking does not exist
    NotFound { resource: &'static str, id: String },
    /// Missing or invalid bearer credential
    Unauthorized { reason: String },
    /// Caller is authenticated but not allowed to act on this resource
    Forbidden { reason: String },
    /// Webhook payload failed authenticity verification
    InvalidSignature { reason: String },
    /// Payment processor call failed or timed out; nothing was persisted
    UpstreamUnavailable {
        service: &'static str,
        message: String,
        retryable: bool,
    },
    /// Bad request input (guest count, date, malformed ids)
    Validation { field: &'static str, message: String },
    /// Two bookings raced onto the same payment intent reference
    DuplicateIntent { intent_id: String },
    /// Persistence or other internal failure; detail stays server-side
    Internal { message: String },
}

impl AppError {
    pub fn new(kind: AppErrorKind) -> Self {
        Self {
            kind,
            request_id: None,
        }
    }

    pub fn not_found(resource: &'static str, id: impl Into<String>) -> Self {
        Self::new(AppErrorKind::NotFound {
            resource,
            id: id.into(),
        })
    }

    pub fn unauthorized(reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Unauthorized {
            reason: reason.into(),
        })
    }

    pub fn forbidden(reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Forbidden {
            reason: reason.into(),
        })
    }

    pub fn invalid_signature(reason: impl Into<String>) -> Self {
        Self::new(AppErrorKind::InvalidSignature {
            reason: reason.into(),
        })
    }

    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Validation {
            field,
            message: message.into(),
        })
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(AppErrorKind::Internal {
            message: message.into(),
        })
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Map error to HTTP status code
    pub fn status_code(&self) -> u16 {
        match &self.kind {
            AppErrorKind::NotFound { .. } => 404,
            AppErrorKind::Unauthorized { .. } => 401,
            AppErrorKind::Forbidden { .. } => 403,
            AppErrorKind::InvalidSignature { .. } => 400,
            AppErrorKind::UpstreamUnavailable { .. } => 502,
            AppErrorKind::Validation { .. } => 400,
            AppErrorKind::DuplicateIntent { .. } => 409,
            AppErrorKind::Internal { .. } => 500,
        }
    }

    /// Get error code for client handling
    pub fn error_code(&self) -> ErrorCode {
        match &self.kind {
            AppErrorKind::NotFound { .. } => ErrorCode::NotFound,
            AppErrorKind::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppErrorKind::Forbidden { .. } => ErrorCode::Forbidden,
            AppErrorKind::InvalidSignature { .. } => ErrorCode::InvalidSignature,
            AppErrorKind::UpstreamUnavailable { .. } => ErrorCode::UpstreamUnavailable,
            AppErrorKind::Validation { .. } => ErrorCode::ValidationError,
            AppErrorKind::DuplicateIntent { .. } => ErrorCode::Conflict,
            AppErrorKind::Internal { .. } => ErrorCode::InternalError,
        }
    }

    /// Get user-friendly error message
    pub fn user_message(&self) -> String {
        match &self.kind {
            AppErrorKind::NotFound { resource, id } => {
                format!("{} '{}' not found", resource, id)
            }
            AppErrorKind::Unauthorized { reason } => reason.clone(),
            AppErrorKind::Forbidden { reason } => reason.clone(),
            AppErrorKind::InvalidSignature { .. } => "Invalid webhook signature".to_string(),
            AppErrorKind::UpstreamUnavailable {
                service, retryable, ..
            } => {
                if *retryable {
                    format!("{} is temporarily unavailable. Please try again", service)
                } else {
                    format!("{} request failed. Please contact support", service)
                }
            }
            AppErrorKind::Validation { field, message } => {
                format!("Invalid value for '{}': {}", field, message)
            }
            AppErrorKind::DuplicateIntent { intent_id } => {
                format!("A booking already exists for payment intent '{}'", intent_id)
            }
            AppErrorKind::Internal { .. } => {
                "An internal server error occurred. Please try again later".to_string()
            }
        }
    }

    /// Check if the client may safely retry the request
    pub fn is_retryable(&self) -> bool {
        match &self.kind {
            AppErrorKind::UpstreamUnavailable { retryable, .. } => *retryable,
            AppErrorKind::Internal { .. } => false,
            _ => false,
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.user_message())
    }
}

impl std::error::Error for AppError {}

impl From<DatabaseError> for AppError {
    fn from(err: DatabaseError) -> Self {
        match err {
            DatabaseError::UniqueViolation { ref constraint } => {
                AppError::new(AppErrorKind::DuplicateIntent {
                    intent_id: constraint.clone(),
                })
            }
            other => AppError::internal(other.to_string()),
        }
    }
}

impl From<PaymentError> for AppError {
    fn from(err: PaymentError) -> Self {
        match err {
            PaymentError::WebhookVerification { message } => AppError::invalid_signature(message),
            other => {
                let retryable = other.is_retryable();
                AppError::new(AppErrorKind::UpstreamUnavailable {
                    service: "Payment processor",
                    message: other.to_string(),
                    retryable,
                })
            }
        }
    }
}

/// Result type for operations that can fail with AppError
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_maps_to_404() {
        let error = AppError::not_found("Tour", "t_123");
        assert_eq!(error.status_code(), 404);
        assert_eq!(error.error_code(), ErrorCode::NotFound);
        assert!(error.user_message().contains("t_123"));
        assert!(!error.is_retryable());
    }

    #[test]
    fn invalid_signature_maps_to_400() {
        let error = AppError::invalid_signature("bad hmac");
        assert_eq!(error.status_code(), 400);
        assert_eq!(error.error_code(), ErrorCode::InvalidSignature);
    }

    #[test]
    fn upstream_unavailable_is_retryable_when_flagged() {
        let error = AppError::from(PaymentError::Network {
            message: "connect timeout".to_string(),
        });
        assert_eq!(error.status_code(), 502);
        assert_eq!(error.error_code(), ErrorCode::UpstreamUnavailable);
        assert!(error.is_retryable());
    }

    #[test]
    fn webhook_verification_error_never_surfaces_as_upstream() {
        let error = AppError::from(PaymentError::WebhookVerification {
            message: "signature mismatch".to_string(),
        });
        assert_eq!(error.error_code(), ErrorCode::InvalidSignature);
        assert_eq!(error.status_code(), 400);
    }

    #[test]
    fn internal_error_hides_detail() {
        let error = AppError::internal("sqlx: connection reset");
        assert_eq!(error.status_code(), 500);
        assert!(!error.user_message().contains("sqlx"));
    }
}
