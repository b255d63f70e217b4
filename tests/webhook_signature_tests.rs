//! End-to-end verification of the webhook signature scheme, exercising the
//! gateway exactly as the webhook handler does: raw body bytes plus the
//! signature header string.

use tourbook_backend::payments::providers::stripe::{StripeConfig, StripeGateway};
use tourbook_backend::payments::types::NotificationEvent;
use tourbook_backend::payments::utils::hmac_sha256_hex;
use tourbook_backend::payments::PaymentGateway;

const WEBHOOK_SECRET: &str = "whsec_integration";

fn gateway() -> StripeGateway {
    StripeGateway::new(StripeConfig {
        secret_key: "sk_test_integration".to_string(),
        webhook_secret: WEBHOOK_SECRET.to_string(),
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
        hmac_sha256_hex(&signed, secret).expect("hmac should compute")
    )
}

fn event_body(kind: &str, intent_id: &str) -> Vec<u8> {
    serde_json::json!({
        "id": "evt_1",
        "type": kind,
        "data": { "object": { "id": intent_id } }
    })
    .to_string()
    .into_bytes()
}

#[test]
fn succeeded_event_round_trips_through_verification() {
    let gateway = gateway();
    let body = event_body("payment_intent.succeeded", "pi_abc");
    let header = sign(&body, WEBHOOK_SECRET, chrono::Utc::now().timestamp());

    let event = gateway
        .verify_and_parse(&body, &header)
        .expect("verification should succeed");
    assert_eq!(
        event,
        NotificationEvent::Succeeded {
            intent_id: "pi_abc".to_string()
        }
    );
}

#[test]
fn failed_event_round_trips_through_verification() {
    let gateway = gateway();
    let body = event_body("payment_intent.payment_failed", "pi_abc");
    let header = sign(&body, WEBHOOK_SECRET, chrono::Utc::now().timestamp());

    let event = gateway
        .verify_and_parse(&body, &header)
        .expect("verification should succeed");
    assert_eq!(
        event,
        NotificationEvent::Failed {
            intent_id: "pi_abc".to_string()
        }
    );
}

#[test]
fn signature_over_different_body_is_rejected() {
    let gateway = gateway();
    let body = event_body("payment_intent.succeeded", "pi_abc");
    let header = sign(&body, WEBHOOK_SECRET, chrono::Utc::now().timestamp());

    let other = event_body("payment_intent.succeeded", "pi_forged");
    assert!(gateway.verify_and_parse(&other, &header).is_err());
}

#[test]
fn signature_with_wrong_secret_is_rejected() {
    let gateway = gateway();
    let body = event_body("payment_intent.succeeded", "pi_abc");
    let header = sign(&body, "whsec_wrong", chrono::Utc::now().timestamp());
    assert!(gateway.verify_and_parse(&body, &header).is_err());
}

#[test]
fn replay_of_old_delivery_is_rejected() {
    let gateway = gateway();
    let body = event_body("payment_intent.succeeded", "pi_abc");
    let header = sign(
        &body,
        WEBHOOK_SECRET,
        chrono::Utc::now().timestamp() - 86400,
    );
    assert!(gateway.verify_and_parse(&body, &header).is_err());
}

#[test]
fn header_with_extra_signature_candidates_still_verifies() {
    let gateway = gateway();
    let body = event_body("payment_intent.succeeded", "pi_abc");
    let timestamp = chrono::Utc::now().timestamp();
    let valid = sign(&body, WEBHOOK_SECRET, timestamp);
    // Stripe sends multiple v1 entries during secret rotation.
    let header = format!("{},v1=deadbeef", valid);

    assert!(gateway.verify_and_parse(&body, &header).is_ok());
}

#[test]
fn unrelated_event_kinds_are_parsed_as_other() {
    let gateway = gateway();
    let body = event_body("charge.dispute.created", "dp_1");
    let header = sign(&body, WEBHOOK_SECRET, chrono::Utc::now().timestamp());

    let event = gateway
        .verify_and_parse(&body, &header)
        .expect("verification should succeed");
    assert!(matches!(event, NotificationEvent::Other { .. }));
}
