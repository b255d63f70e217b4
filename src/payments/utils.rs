use crate::payments::error::{PaymentError, PaymentResult};
use reqwest::Client;
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::warn;

/// Thin retrying HTTP client for processor calls.
///
/// Every request carries a bounded timeout so a slow processor can never
/// pin a worker; 429 and 5xx responses are retried with exponential
/// backoff up to `max_retries`.
#[derive(Clone)]
pub struct ProcessorHttpClient {
    client: Client,
    timeout: Duration,
    max_retries: u32,
}

impl ProcessorHttpClient {
    pub fn new(timeout: Duration, max_retries: u32) -> PaymentResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PaymentError::Network {
                message: format!("failed to initialize HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            timeout,
            max_retries,
        })
    }

    /// POST a form-encoded body and decode the JSON response.
    pub async fn post_form<T: DeserializeOwned>(
        &self,
        url: &str,
        bearer_token: &str,
        form: &[(String, String)],
    ) -> PaymentResult<T> {
        let mut last_error = None;
        for attempt in 0..=self.max_retries {
            let request = self
                .client
                .post(url)
                .timeout(self.timeout)
                .bearer_auth(bearer_token)
                .form(form);

            let response = request.send().await.map_err(|e| PaymentError::Network {
                message: format!("processor request failed: {}", e),
            });

            match response {
                Ok(resp) => {
                    let status = resp.status();
                    let text = resp.text().await.unwrap_or_default();
                    if status.is_success() {
                        return serde_json::from_str::<T>(&text).map_err(|e| {
                            PaymentError::Processor {
                                message: format!("invalid processor JSON response: {}", e),
                                processor_code: None,
                                retryable: false,
                            }
                        });
                    }

                    if status.as_u16() == 429 {
                        if attempt < self.max_retries {
                            tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                            continue;
                        }
                        return Err(PaymentError::RateLimit {
                            message: "processor rate limit exceeded".to_string(),
                            retry_after_seconds: None,
                        });
                    }

                    if status.is_server_error() && attempt < self.max_retries {
                        warn!(
                            status = %status,
                            attempt = attempt + 1,
                            "processor server error, retrying"
                        );
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }

                    return Err(PaymentError::Processor {
                        message: format!("HTTP {}: {}", status, text),
                        processor_code: Some(status.as_u16().to_string()),
                        retryable: status.is_server_error(),
                    });
                }
                Err(e) => {
                    last_error = Some(e);
                    if attempt < self.max_retries {
                        tokio::time::sleep(Duration::from_secs(1 << attempt)).await;
                        continue;
                    }
                }
            }
        }

        Err(last_error.unwrap_or(PaymentError::Network {
            message: "processor request failed".to_string(),
        }))
    }
}

pub fn hmac_sha256_hex(payload: &[u8], secret: &str) -> Option<String> {
    use hmac::{Hmac, Mac};
    use sha2::Sha256;

    type HmacSha256 = Hmac<Sha256>;
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(payload);
    Some(hex::encode(mac.finalize().into_bytes()))
}

pub fn secure_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter()
        .zip(b.iter())
        .fold(0_u8, |acc, (x, y)| acc | (x ^ y))
        == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn secure_eq_behaves_correctly() {
        assert!(secure_eq(b"abc", b"abc"));
        assert!(!secure_eq(b"abc", b"abd"));
        assert!(!secure_eq(b"abc", b"ab"));
    }

    #[test]
    fn hmac_is_deterministic_and_secret_dependent() {
        let payload = br#"{"type":"payment_intent.succeeded"}"#;
        let first = hmac_sha256_hex(payload, "whsec_a").unwrap();
        let second = hmac_sha256_hex(payload, "whsec_a").unwrap();
        let other = hmac_sha256_hex(payload, "whsec_b").unwrap();
        assert_eq!(first, second);
        assert_ne!(first, other);
    }
}
