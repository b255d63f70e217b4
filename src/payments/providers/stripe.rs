//! Stripe payment gateway
//!
//! Creates payment intents through the form-encoded REST API and verifies
//! webhook deliveries against the `Stripe-Signature` header scheme:
//! `t=<unix-ts>,v1=<hex hmac>` where the MAC is HMAC-SHA256 over
//! `"{t}.{raw body}"` keyed with the webhook signing secret.

use crate::payments::error::{PaymentError, PaymentResult};
use crate::payments::gateway::PaymentGateway;
use crate::payments::types::{IntentMetadata, NotificationEvent, PaymentIntent};
use crate::payments::utils::{hmac_sha256_hex, secure_eq, ProcessorHttpClient};
use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::info;

#[derive(Debug, Clone)]
pub struct StripeConfig {
    pub secret_key: String,
    pub webhook_secret: String,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    /// Maximum accepted age of a signed webhook, guarding against replay
    /// of captured deliveries.
    pub signature_tolerance_secs: i64,
}

impl Default for StripeConfig {
    fn default() -> Self {
        Self {
            secret_key: String::new(),
            webhook_secret: String::new(),
            base_url: "https://api.stripe.com".to_string(),
            timeout_secs: 30,
            max_retries: 2,
            signature_tolerance_secs: 300,
        }
    }
}

impl StripeConfig {
    /// Missing credentials are a startup-time fatal misconfiguration,
    /// never a per-request error.
    pub fn from_env() -> PaymentResult<Self> {
        let secret_key =
            std::env::var("STRIPE_SECRET_KEY").map_err(|_| PaymentError::Validation {
                message: "STRIPE_SECRET_KEY environment variable is required".to_string(),
                field: Some("STRIPE_SECRET_KEY".to_string()),
            })?;
        let webhook_secret =
            std::env::var("STRIPE_WEBHOOK_SECRET").map_err(|_| PaymentError::Validation {
                message: "STRIPE_WEBHOOK_SECRET environment variable is required".to_string(),
                field: Some("STRIPE_WEBHOOK_SECRET".to_string()),
            })?;

        Ok(Self {
            base_url: std::env::var("STRIPE_BASE_URL")
                .unwrap_or_else(|_| "https://api.stripe.com".to_string()),
            timeout_secs: std::env::var("STRIPE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse::<u64>().ok())
                .unwrap_or(30),
            max_retries: std::env::var("STRIPE_MAX_RETRIES")
                .ok()
                .and_then(|v| v.parse::<u32>().ok())
                .unwrap_or(2),
            signature_tolerance_secs: std::env::var("STRIPE_SIGNATURE_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse::<i64>().ok())
                .unwrap_or(300),
            secret_key,
            webhook_secret,
        })
    }
}

pub struct StripeGateway {
    config: StripeConfig,
    http: ProcessorHttpClient,
}

impl StripeGateway {
    pub fn new(config: StripeConfig) -> PaymentResult<Self> {
        let http =
            ProcessorHttpClient::new(Duration::from_secs(config.timeout_secs), config.max_retries)?;
        Ok(Self { config, http })
    }

    pub fn from_env() -> PaymentResult<Self> {
        Self::new(StripeConfig::from_env()?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url, path)
    }

    fn parse_signature_header(header: &str) -> Option<(i64, Vec<&str>)> {
        let mut timestamp = None;
        let mut signatures = Vec::new();
        for part in header.split(',') {
            let (key, value) = part.trim().split_once('=')?;
            match key {
                "t" => timestamp = value.parse::<i64>().ok(),
                "v1" => signatures.push(value),
                _ => {}
            }
        }
        timestamp.filter(|_| !signatures.is_empty()).map(|t| (t, signatures))
    }

    fn verify_signature(&self, payload: &[u8], signature_header: &str) -> PaymentResult<()> {
        let (timestamp, signatures) = Self::parse_signature_header(signature_header).ok_or(
            PaymentError::WebhookVerification {
                message: "malformed signature header".to_string(),
            },
        )?;

        let age = (chrono::Utc::now().timestamp() - timestamp).abs();
        if age > self.config.signature_tolerance_secs {
            return Err(PaymentError::WebhookVerification {
                message: format!("signature timestamp outside tolerance ({}s old)", age),
            });
        }

        let mut signed_payload = timestamp.to_string().into_bytes();
        signed_payload.push(b'.');
        signed_payload.extend_from_slice(payload);

        let expected = hmac_sha256_hex(&signed_payload, &self.config.webhook_secret).ok_or(
            PaymentError::WebhookVerification {
                message: "failed to compute expected signature".to_string(),
            },
        )?;

        if signatures
            .iter()
            .any(|sig| secure_eq(expected.as_bytes(), sig.trim().as_bytes()))
        {
            Ok(())
        } else {
            Err(PaymentError::WebhookVerification {
                message: "signature mismatch".to_string(),
            })
        }
    }
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> PaymentResult<PaymentIntent> {
        if amount_minor <= 0 {
            return Err(PaymentError::Validation {
                message: "amount must be greater than zero".to_string(),
                field: Some("amount".to_string()),
            });
        }

        let form = vec![
            ("amount".to_string(), amount_minor.to_string()),
            ("currency".to_string(), currency.to_string()),
            (
                "metadata[tourId]".to_string(),
                metadata.tour_id.to_string(),
            ),
            (
                "metadata[userId]".to_string(),
                metadata.user_id.to_string(),
            ),
            ("metadata[guests]".to_string(), metadata.guests.to_string()),
            ("metadata[date]".to_string(), metadata.date.to_string()),
        ];

        let raw: StripeIntentData = self
            .http
            .post_form(
                &self.endpoint("/v1/payment_intents"),
                &self.config.secret_key,
                &form,
            )
            .await?;

        let client_secret = raw.client_secret.ok_or(PaymentError::Processor {
            message: "intent response missing client_secret".to_string(),
            processor_code: None,
            retryable: false,
        })?;

        info!(intent_id = %raw.id, amount_minor, "payment intent created");

        Ok(PaymentIntent {
            intent_id: raw.id,
            client_secret,
        })
    }

    fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> PaymentResult<NotificationEvent> {
        self.verify_signature(payload, signature_header)?;

        let event: StripeEvent =
            serde_json::from_slice(payload).map_err(|e| PaymentError::WebhookVerification {
                message: format!("invalid webhook JSON payload: {}", e),
            })?;

        let intent_id = event.data.and_then(|d| d.object).map(|o| o.id);

        let parsed = match event.kind.as_str() {
            "payment_intent.succeeded" => {
                let intent_id = intent_id.ok_or(PaymentError::WebhookVerification {
                    message: "succeeded event missing intent id".to_string(),
                })?;
                NotificationEvent::Succeeded { intent_id }
            }
            "payment_intent.payment_failed" => {
                let intent_id = intent_id.ok_or(PaymentError::WebhookVerification {
                    message: "failed event missing intent id".to_string(),
                })?;
                NotificationEvent::Failed { intent_id }
            }
            other => NotificationEvent::Other {
                kind: other.to_string(),
            },
        };

        Ok(parsed)
    }
}

#[derive(Debug, Deserialize)]
struct StripeIntentData {
    id: String,
    #[serde(default)]
    client_secret: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StripeEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    data: Option<StripeEventData>,
}

#[derive(Debug, Deserialize)]
struct StripeEventData {
    #[serde(default)]
    object: Option<StripeEventObject>,
}

#[derive(Debug, Deserialize)]
struct StripeEventObject {
    id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gateway() -> StripeGateway {
        StripeGateway::new(StripeConfig {
            secret_key: "sk_test".to_string(),
            webhook_secret: "whsec_test".to_string(),
            ..StripeConfig::default()
        })
        .expect("gateway init should succeed")
    }

    fn sign(payload: &[u8], secret: &str, timestamp: i64) -> String {
        let mut signed = timestamp.to_string().into_bytes();
        signed.push(b'.');
        signed.extend_from_slice(payload);
        format!(
            "t={},v1={}",
            timestamp,
            hmac_sha256_hex(&signed, secret).unwrap()
        )
    }

    #[test]
    fn valid_signature_parses_succeeded_event() {
        let gateway = gateway();
        let payload =
            br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;
        let header = sign(payload, "whsec_test", chrono::Utc::now().timestamp());

        let event = gateway
            .verify_and_parse(payload, &header)
            .expect("verification should succeed");
        assert_eq!(
            event,
            NotificationEvent::Succeeded {
                intent_id: "pi_123".to_string()
            }
        );
    }

    #[test]
    fn tampered_payload_is_rejected() {
        let gateway = gateway();
        let payload =
            br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_123"}}}"#;
        let header = sign(payload, "whsec_test", chrono::Utc::now().timestamp());

        let tampered =
            br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_999"}}}"#;
        let result = gateway.verify_and_parse(tampered, &header);
        assert!(matches!(
            result,
            Err(PaymentError::WebhookVerification { .. })
        ));
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let gateway = gateway();
        let payload = br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;
        let header = sign(payload, "whsec_other", chrono::Utc::now().timestamp());
        assert!(gateway.verify_and_parse(payload, &header).is_err());
    }

    #[test]
    fn stale_timestamp_is_rejected() {
        let gateway = gateway();
        let payload = br#"{"type":"payment_intent.succeeded","data":{"object":{"id":"pi_1"}}}"#;
        let header = sign(
            payload,
            "whsec_test",
            chrono::Utc::now().timestamp() - 3600,
        );
        assert!(gateway.verify_and_parse(payload, &header).is_err());
    }

    #[test]
    fn unknown_event_kind_maps_to_other() {
        let gateway = gateway();
        let payload = br#"{"type":"charge.refunded","data":{"object":{"id":"ch_1"}}}"#;
        let header = sign(payload, "whsec_test", chrono::Utc::now().timestamp());

        let event = gateway
            .verify_and_parse(payload, &header)
            .expect("verification should succeed");
        assert_eq!(
            event,
            NotificationEvent::Other {
                kind: "charge.refunded".to_string()
            }
        );
    }

    #[test]
    fn malformed_signature_header_is_rejected() {
        let gateway = gateway();
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        assert!(gateway.verify_and_parse(payload, "not-a-header").is_err());
        assert!(gateway.verify_and_parse(payload, "t=abc,v1=").is_err());
    }
}
