//! Payment gateway client.
//!
//! The orchestrator talks to the card processor through the
//! [`PaymentGateway`] trait; [`SquarePaymentsClient`] is the production
//! implementation over Square's `/v2/payments` endpoint. The caller-supplied
//! idempotency key is passed through verbatim so a transport-level retry of
//! the same call can never double-charge.

use async_trait::async_trait;
use rand::distributions::Alphanumeric;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::config::AppConfig;
use crate::errors::ServiceError;

/// Idempotency token for one charge attempt. Unique per attempt: a client
/// retry after a definitive failure creates a fresh attempt with a fresh
/// key, while the gateway dedupes transport retries of the same attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdempotencyKey(String);

impl IdempotencyKey {
    pub fn generate(cart_id: Uuid) -> Self {
        let cart_prefix: String = cart_id.simple().to_string().chars().take(8).collect();
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(10)
            .map(char::from)
            .collect();
        let millis = chrono::Utc::now().timestamp_millis();
        Self(format!("chk_{}_{}_{}", cart_prefix, millis, suffix))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One charge request, denominated in integer cents.
#[derive(Debug, Clone)]
pub struct CreatePaymentRequest {
    pub amount_cents: i64,
    pub currency: String,
    pub source_id: String,
    pub idempotency_key: IdempotencyKey,
    pub location_id: String,
    pub reference_id: String,
    pub buyer_email: String,
    pub note: Option<String>,
}

/// A captured (or asynchronously settling) payment.
#[derive(Debug, Clone)]
pub struct GatewayPayment {
    pub payment_id: String,
    /// True when the gateway reports the capture complete; false when it
    /// settles asynchronously.
    pub completed: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    /// The card was declined or rejected; the customer can fix this.
    #[error("payment declined: {detail}")]
    Declined { code: String, detail: String },
    /// Credentials, location, or other operator-side misconfiguration.
    #[error("gateway configuration error: {0}")]
    Config(String),
    /// Network failure or timeout; the charge outcome is unknown to us.
    #[error("gateway transport error: {0}")]
    Transport(String),
    /// Any other non-2xx the gateway returned.
    #[error("gateway error ({status}): {detail}")]
    Api { status: u16, detail: String },
}

impl GatewayError {
    /// Declined cards are the client's problem (400); everything else is an
    /// upstream failure (502).
    pub fn into_service_error(self) -> ServiceError {
        match self {
            GatewayError::Declined { .. } => ServiceError::PaymentFailed(self.to_string()),
            other => ServiceError::ExternalServiceError(other.to_string()),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<GatewayPayment, GatewayError>;
}

/// Production client for Square's payments API.
pub struct SquarePaymentsClient {
    http: reqwest::Client,
    base_url: String,
    access_token: String,
}

impl SquarePaymentsClient {
    pub fn new(base_url: String, access_token: String, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("reqwest client construction cannot fail with static options");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            access_token,
        }
    }

    pub fn from_config(cfg: &AppConfig) -> Self {
        Self::new(
            cfg.square_api_base_url.clone(),
            cfg.square_access_token.clone(),
            Duration::from_secs(cfg.square_timeout_secs),
        )
    }
}

#[derive(Debug, Serialize)]
struct SquareCreatePaymentBody {
    source_id: String,
    idempotency_key: String,
    amount_money: SquareMoney,
    location_id: String,
    reference_id: String,
    buyer_email_address: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    note: Option<String>,
    autocomplete: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct SquareMoney {
    amount: i64,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct SquarePaymentEnvelope {
    payment: SquarePayment,
}

#[derive(Debug, Deserialize)]
struct SquarePayment {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize, Default)]
struct SquareErrorEnvelope {
    #[serde(default)]
    errors: Vec<SquareApiError>,
}

#[derive(Debug, Deserialize)]
struct SquareApiError {
    #[serde(default)]
    category: String,
    #[serde(default)]
    code: String,
    #[serde(default)]
    detail: Option<String>,
}

#[async_trait]
impl PaymentGateway for SquarePaymentsClient {
    #[instrument(skip(self, request), fields(reference_id = %request.reference_id))]
    async fn create_payment(
        &self,
        request: CreatePaymentRequest,
    ) -> Result<GatewayPayment, GatewayError> {
        if self.access_token.is_empty() {
            return Err(GatewayError::Config(
                "square access token is not configured".to_string(),
            ));
        }

        let body = SquareCreatePaymentBody {
            source_id: request.source_id,
            idempotency_key: request.idempotency_key.as_str().to_string(),
            amount_money: SquareMoney {
                amount: request.amount_cents,
                currency: request.currency,
            },
            location_id: request.location_id,
            reference_id: request.reference_id,
            buyer_email_address: request.buyer_email,
            note: request.note,
            autocomplete: true,
        };

        let response = self
            .http
            .post(format!("{}/v2/payments", self.base_url))
            .bearer_auth(&self.access_token)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    GatewayError::Transport("payment gateway timed out".to_string())
                } else {
                    GatewayError::Transport(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            let envelope: SquarePaymentEnvelope = response
                .json()
                .await
                .map_err(|e| GatewayError::Transport(format!("malformed gateway response: {e}")))?;
            let completed = envelope.payment.status == "COMPLETED";
            info!(
                payment_id = %envelope.payment.id,
                status = %envelope.payment.status,
                "gateway accepted payment"
            );
            return Ok(GatewayPayment {
                payment_id: envelope.payment.id,
                completed,
            });
        }

        let errors: SquareErrorEnvelope = response.json().await.unwrap_or_default();
        let first = errors.errors.into_iter().next();
        warn!(status = status.as_u16(), "gateway rejected payment");
        match first {
            Some(err) if err.category == "PAYMENT_METHOD_ERROR" => Err(GatewayError::Declined {
                detail: err.detail.unwrap_or_else(|| "card was declined".to_string()),
                code: err.code,
            }),
            Some(err)
                if err.category == "AUTHENTICATION_ERROR"
                    || err.code == "UNAUTHORIZED"
                    || err.code == "LOCATION_MISMATCH" =>
            {
                Err(GatewayError::Config(
                    err.detail.unwrap_or_else(|| err.code.clone()),
                ))
            }
            Some(err) => Err(GatewayError::Api {
                status: status.as_u16(),
                detail: err.detail.unwrap_or(err.code),
            }),
            None => Err(GatewayError::Api {
                status: status.as_u16(),
                detail: "unknown gateway error".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idempotency_keys_are_unique_per_attempt() {
        let cart_id = Uuid::new_v4();
        let a = IdempotencyKey::generate(cart_id);
        let b = IdempotencyKey::generate(cart_id);
        assert_ne!(a, b);
    }

    #[test]
    fn idempotency_key_embeds_cart_prefix() {
        let cart_id = Uuid::new_v4();
        let key = IdempotencyKey::generate(cart_id);
        let prefix: String = cart_id.simple().to_string().chars().take(8).collect();
        assert!(key.as_str().starts_with("chk_"));
        assert!(key.as_str().contains(&prefix));
    }

    #[test]
    fn declined_maps_to_client_error() {
        let err = GatewayError::Declined {
            code: "CARD_DECLINED".into(),
            detail: "Insufficient funds".into(),
        };
        match err.into_service_error() {
            ServiceError::PaymentFailed(msg) => assert!(msg.contains("Insufficient funds")),
            other => panic!("expected PaymentFailed, got {:?}", other),
        }
    }

    #[test]
    fn transport_maps_to_upstream_error() {
        let err = GatewayError::Transport("payment gateway timed out".into());
        match err.into_service_error() {
            ServiceError::ExternalServiceError(msg) => assert!(msg.contains("timed out")),
            other => panic!("expected ExternalServiceError, got {:?}", other),
        }
    }
}
