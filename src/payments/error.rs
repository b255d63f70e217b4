use thiserror::Error;

pub type PaymentResult<T> = Result<T, PaymentError>;

#[derive(Debug, Clone, Error)]
pub enum PaymentError {
    #[error("Validation error: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Rate limit exceeded: {message}")]
    RateLimit {
        message: String,
        retry_after_seconds: Option<u64>,
    },

    #[error("Webhook verification failed: {message}")]
    WebhookVerification { message: String },

    #[error("Processor error: {message}")]
    Processor {
        message: String,
        processor_code: Option<String>,
        retryable: bool,
    },
}

impl PaymentError {
    pub fn is_retryable(&self) -> bool {
        match self {
            PaymentError::Validation { .. } => false,
            PaymentError::Network { .. } => true,
            PaymentError::RateLimit { .. } => true,
            PaymentError::WebhookVerification { .. } => false,
            PaymentError::Processor { retryable, .. } => *retryable,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retryable_flags_are_set() {
        assert!(PaymentError::Network {
            message: "timeout".to_string()
        }
        .is_retryable());
        assert!(!PaymentError::WebhookVerification {
            message: "bad signature".to_string()
        }
        .is_retryable());
        assert!(PaymentError::Processor {
            message: "internal".to_string(),
            processor_code: Some("500".to_string()),
            retryable: true
        }
        .is_retryable());
    }
}
