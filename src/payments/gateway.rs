use crate::payments::error::PaymentResult;
use crate::payments::types::{IntentMetadata, NotificationEvent, PaymentIntent};
use async_trait::async_trait;

/// The sole seam to the external payment processor.
///
/// Nothing outside this trait's implementations may depend on the
/// processor's wire format; the engine only ever sees `PaymentIntent`
/// and `NotificationEvent`.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Create a payment intent for `amount_minor` units of `currency`,
    /// tagged with booking metadata for auditability.
    async fn create_intent(
        &self,
        amount_minor: i64,
        currency: &str,
        metadata: &IntentMetadata,
    ) -> PaymentResult<PaymentIntent>;

    /// Verify a webhook delivery against the shared signing secret and
    /// parse it into a notification event. The raw, unparsed body bytes
    /// must be passed in; verification runs over exactly what arrived.
    fn verify_and_parse(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> PaymentResult<NotificationEvent>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use uuid::Uuid;

    struct MockGateway;

    #[async_trait]
    impl PaymentGateway for MockGateway {
        async fn create_intent(
            &self,
            amount_minor: i64,
            currency: &str,
            _metadata: &IntentMetadata,
        ) -> PaymentResult<PaymentIntent> {
            Ok(PaymentIntent {
                intent_id: format!("pi_mock_{}_{}", currency, amount_minor),
                client_secret: "pi_mock_secret".to_string(),
            })
        }

        fn verify_and_parse(
            &self,
            _payload: &[u8],
            _signature_header: &str,
        ) -> PaymentResult<NotificationEvent> {
            Ok(NotificationEvent::Other {
                kind: "mock".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn trait_can_be_implemented_by_mock_gateway() {
        let gateway: Box<dyn PaymentGateway> = Box::new(MockGateway);
        let intent = gateway
            .create_intent(
                20000,
                "usd",
                &IntentMetadata {
                    tour_id: Uuid::nil(),
                    user_id: Uuid::nil(),
                    guests: 2,
                    date: NaiveDate::from_ymd_opt(2026, 9, 1).unwrap(),
                },
            )
            .await
            .expect("intent creation should succeed");
        assert!(!intent.intent_id.is_empty());
        assert!(!intent.client_secret.is_empty());
    }
}
