use async_trait::async_trait;
use uuid::Uuid;

use super::{
    GatewayError, IntentRequest, PaymentGateway, PaymentIntent, WebhookError, WebhookEvent,
    WebhookVerifier,
};

/// Local gateway for development and tests.
///
/// Intents are minted in-process; webhooks are still checked against the
/// configured signing secret so the callback path behaves as in production.
#[derive(Debug, Clone)]
pub struct MockGateway {
    verifier: WebhookVerifier,
}

impl MockGateway {
    pub fn new(verifier: WebhookVerifier) -> Self {
        Self { verifier }
    }
}

#[async_trait]
impl PaymentGateway for MockGateway {
    async fn create_intent(&self, request: IntentRequest) -> Result<PaymentIntent, GatewayError> {
        if request.amount_minor <= 0 {
            return Err(GatewayError::Rejected {
                status: 400,
                message: "amount must be positive".to_string(),
            });
        }

        let id = format!("pi_mock_{}", Uuid::new_v4().simple());
        let client_secret = format!("{id}_secret_{}", Uuid::new_v4().simple());

        tracing::info!(
            intent_id = %id,
            amount = request.amount_minor,
            currency = %request.currency,
            "Mock payment intent created"
        );

        Ok(PaymentIntent { id, client_secret })
    }

    fn verify_and_parse_webhook(
        &self,
        payload: &[u8],
        signature_header: &str,
    ) -> Result<WebhookEvent, WebhookError> {
        self.verifier.verify(payload, signature_header)
    }
}
