//! Payment gateway adapters.
//!
//! The lifecycle code only needs two things from a provider: a way to open a
//! payment intent for an amount in minor units, and a way to turn a signed
//! webhook delivery into a typed event. Both adapters share the signature
//! scheme in [`webhook`].

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{GatewayKind, PaymentSettings};

pub mod mock;
pub mod stripe;
pub mod webhook;

pub use mock::MockGateway;
pub use stripe::StripeGateway;
pub use webhook::{WebhookEvent, WebhookEventKind, WebhookVerifier, SIGNATURE_HEADER};

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("gateway timed out")]
    Timeout,

    #[error("gateway transport failure: {0}")]
    Transport(String),

    #[error("gateway rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("unexpected gateway response: {0}")]
    InvalidResponse(String),

    #[error("gateway misconfigured: {0}")]
    Misconfigured(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum WebhookError {
    #[error("{0}")]
    SignatureInvalid(String),

    #[error("{0}")]
    MalformedPayload(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntentRequest {
    /// Amount in the currency's minor unit (cents).
    pub amount_minor: i64,
    pub currency: String,
    pub metadata: BTreeMap<String, String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens an intent at the provider.
    ///
    /// Calls are bounded by the configured timeout; expiry surfaces as
    /// [`GatewayError::Timeout`].
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError>;

    /// Checks the signature header against the raw body and parses the event.
    fn verify_and_parse_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, WebhookError>;
}

pub fn build(settings: &PaymentSettings) -> Result<Arc<dyn PaymentGateway>, GatewayError> {
    let verifier = WebhookVerifier::new(
        settings.webhook_secret.clone(),
        settings.webhook_tolerance,
    );

    let gateway: Arc<dyn PaymentGateway> = match settings.gateway {
        GatewayKind::Stripe => {
            let secret_key = settings.secret_key.clone().ok_or_else(|| {
                GatewayError::Misconfigured("stripe gateway requires a secret key".to_string())
            })?;
            Arc::new(StripeGateway::new(
                settings.api_base.clone(),
                secret_key,
                settings.timeout,
                verifier,
            )?)
        }
        GatewayKind::Mock => Arc::new(MockGateway::new(verifier)),
    };

    tracing::info!(gateway = ?settings.gateway, currency = %settings.currency, "Payment gateway ready");
    Ok(gateway)
}
