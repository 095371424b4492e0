//! Signed webhook deliveries.
//!
//! The signature header has the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`.
//! Each `v1` is an HMAC-SHA256 over `"<t>.<raw body>"` keyed with the endpoint
//! secret; one matching entry is enough.

use std::time::Duration;

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use super::WebhookError;

pub const SIGNATURE_HEADER: &str = "stripe-signature";

pub const PAYMENT_SUCCEEDED: &str = "payment_intent.succeeded";
pub const PAYMENT_FAILED: &str = "payment_intent.payment_failed";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebhookEvent {
    pub id: String,
    pub kind: WebhookEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookEventKind {
    PaymentSucceeded { intent_id: String },
    PaymentFailed { intent_id: String },
    Other(String),
}

#[derive(Deserialize)]
struct RawEvent {
    id: String,
    #[serde(rename = "type")]
    event_type: String,
    #[serde(default)]
    data: Option<RawData>,
}

#[derive(Deserialize)]
struct RawData {
    object: RawObject,
}

#[derive(Deserialize)]
struct RawObject {
    #[serde(default)]
    id: Option<String>,
}

#[derive(Clone)]
pub struct WebhookVerifier {
    secret: String,
    tolerance: Duration,
}

impl std::fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("tolerance", &self.tolerance)
            .finish_non_exhaustive()
    }
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.into(),
            tolerance,
        }
    }

    pub fn verify(&self, payload: &[u8], header: &str) -> Result<WebhookEvent, WebhookError> {
        self.verify_at(payload, header, Utc::now())
    }

    pub fn verify_at(
        &self,
        payload: &[u8],
        header: &str,
        now: DateTime<Utc>,
    ) -> Result<WebhookEvent, WebhookError> {
        let (timestamp, signatures) = parse_header(header)?;

        let tolerance = i64::try_from(self.tolerance.as_secs()).unwrap_or(i64::MAX);
        let within_window = now
            .timestamp()
            .checked_sub(timestamp)
            .is_some_and(|age| age <= tolerance);
        if !within_window {
            return Err(WebhookError::SignatureInvalid(
                "signature timestamp outside the tolerance window".to_string(),
            ));
        }

        let mac = self.mac(timestamp, payload)?;
        let matched = signatures
            .iter()
            .filter_map(|candidate| hex::decode(candidate).ok())
            .any(|bytes| mac.clone().verify_slice(&bytes).is_ok());

        if !matched {
            return Err(WebhookError::SignatureInvalid(
                "no signature matches the payload".to_string(),
            ));
        }

        parse_event(payload)
    }

    /// Produces a header value the way the provider signs deliveries.
    pub fn sign(&self, payload: &[u8], timestamp: i64) -> Result<String, WebhookError> {
        let signature = hex::encode(self.mac(timestamp, payload)?.finalize().into_bytes());
        Ok(format!("t={timestamp},v1={signature}"))
    }

    fn mac(&self, timestamp: i64, payload: &[u8]) -> Result<HmacSha256, WebhookError> {
        let mut mac = HmacSha256::new_from_slice(self.secret.as_bytes())
            .map_err(|e| WebhookError::SignatureInvalid(format!("unusable signing secret: {e}")))?;
        mac.update(timestamp.to_string().as_bytes());
        mac.update(b".");
        mac.update(payload);
        Ok(mac)
    }
}

fn parse_header(header: &str) -> Result<(i64, Vec<&str>), WebhookError> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| {
                    WebhookError::SignatureInvalid("signature timestamp is not a number".to_string())
                })?);
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| {
        WebhookError::SignatureInvalid("signature header has no timestamp".to_string())
    })?;
    if signatures.is_empty() {
        return Err(WebhookError::SignatureInvalid(
            "signature header has no v1 signature".to_string(),
        ));
    }
    Ok((timestamp, signatures))
}

pub fn parse_event(payload: &[u8]) -> Result<WebhookEvent, WebhookError> {
    let raw: RawEvent = serde_json::from_slice(payload)
        .map_err(|e| WebhookError::MalformedPayload(format!("invalid event JSON: {e}")))?;

    let object_id = || {
        raw.data
            .as_ref()
            .and_then(|d| d.object.id.clone())
            .ok_or_else(|| {
                WebhookError::MalformedPayload(format!(
                    "{} event carries no payment intent id",
                    raw.event_type
                ))
            })
    };

    let kind = match raw.event_type.as_str() {
        PAYMENT_SUCCEEDED => WebhookEventKind::PaymentSucceeded {
            intent_id: object_id()?,
        },
        PAYMENT_FAILED => WebhookEventKind::PaymentFailed {
            intent_id: object_id()?,
        },
        other => WebhookEventKind::Other(other.to_string()),
    };

    Ok(WebhookEvent { id: raw.id, kind })
}
