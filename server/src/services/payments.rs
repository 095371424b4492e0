//! Payment lifecycle: lazily created payment rows, gateway intents and the
//! webhook-driven `pending -> completed` transition.

use std::collections::BTreeMap;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::auth::{authorize, Permission};
use crate::config::PaymentSettings;
use crate::gateway::{IntentRequest, PaymentGateway, WebhookEventKind};
use crate::models::{Payment, PaymentCompletion, ReservationDetails, User};
use crate::store::Store;
use crate::utils::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct PaymentPage {
    pub reservation: ReservationDetails,
    pub payment: Payment,
    pub publishable_key: String,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct CheckoutIntent {
    pub payment_id: Uuid,
    pub intent_id: String,
    pub client_secret: String,
    pub amount_minor: i64,
    pub currency: String,
}

/// What a verified webhook delivery did. Every variant is acknowledged to
/// the provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    Completed { payment_id: Uuid, reservation_id: Uuid },
    AlreadyCompleted { payment_id: Uuid },
    Unmatched { intent_id: String },
    Ignored(String),
}

impl WebhookOutcome {
    pub fn describe(&self) -> String {
        match self {
            WebhookOutcome::Completed { .. } => "Payment completed".to_string(),
            WebhookOutcome::AlreadyCompleted { .. } => "Payment already completed".to_string(),
            WebhookOutcome::Unmatched { .. } => "No payment for this intent".to_string(),
            WebhookOutcome::Ignored(kind) => format!("Event {kind} ignored"),
        }
    }
}

/// Amount in the currency's minor unit, halves rounded away from zero.
pub fn to_minor_units(amount: Decimal) -> Result<i64, AppError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| AppError::ValidationError(format!("amount {amount} is out of range")))
}

/// The caller's own reservation; anyone else's is reported as missing.
async fn own_reservation(
    store: &dyn Store,
    user: &User,
    reservation_id: Uuid,
) -> Result<ReservationDetails, AppError> {
    authorize(user, Permission::Reserve)?;
    store
        .find_reservation(reservation_id)
        .await?
        .filter(|d| d.reservation.user_id == user.id)
        .ok_or_else(|| AppError::NotFound("Reservation not found".to_string()))
}

/// Existing payment of the reservation, or a new pending one priced at
/// `unit price * quantity`.
pub async fn create_or_get_payment(
    store: &dyn Store,
    reservation: &ReservationDetails,
) -> Result<Payment, AppError> {
    store
        .ensure_payment(reservation.reservation.id, reservation.total_price())
        .await
}

pub async fn payment_page(
    store: &dyn Store,
    settings: &PaymentSettings,
    user: &User,
    reservation_id: Uuid,
) -> Result<PaymentPage, AppError> {
    let reservation = own_reservation(store, user, reservation_id).await?;
    let payment = create_or_get_payment(store, &reservation).await?;
    Ok(PaymentPage {
        reservation,
        payment,
        publishable_key: settings.publishable_key.clone(),
        currency: settings.currency.clone(),
    })
}

/// Opens a gateway intent for the reservation and stores its identifiers on
/// the reservation's single payment row, overwriting earlier ones.
pub async fn create_payment_intent(
    store: &dyn Store,
    gateway: &dyn PaymentGateway,
    currency: &str,
    user: &User,
    reservation_id: Uuid,
) -> Result<CheckoutIntent, AppError> {
    let reservation = own_reservation(store, user, reservation_id).await?;
    if let Some(existing) = store.find_payment_for_reservation(reservation_id).await? {
        if existing.is_completed() {
            return Err(AppError::ValidationError(
                "This reservation has already been paid".to_string(),
            ));
        }
    }

    let amount = reservation.total_price();
    let amount_minor = to_minor_units(amount)?;
    if amount_minor <= 0 {
        return Err(AppError::ValidationError(
            "Free tickets need no payment; the organizer confirms them".to_string(),
        ));
    }
    let metadata = BTreeMap::from([
        ("reservation_id".to_string(), reservation_id.to_string()),
        ("user_id".to_string(), user.id.to_string()),
    ]);

    let intent = gateway
        .create_intent(IntentRequest {
            amount_minor,
            currency: currency.to_string(),
            metadata,
        })
        .await?;
    let payment = store.attach_intent(reservation_id, amount, &intent).await?;

    info!(
        payment_id = %payment.id,
        reservation_id = %reservation_id,
        intent_id = %intent.id,
        amount_minor,
        "Payment intent created"
    );
    Ok(CheckoutIntent {
        payment_id: payment.id,
        intent_id: intent.id,
        client_secret: intent.client_secret,
        amount_minor,
        currency: currency.to_string(),
    })
}

/// Verifies a delivery and applies it. Verification failures are the only
/// errors; unknown intents and event types are acknowledged and dropped.
pub async fn handle_webhook(
    store: &dyn Store,
    gateway: &dyn PaymentGateway,
    payload: &[u8],
    signature_header: &str,
) -> Result<WebhookOutcome, AppError> {
    let event = gateway.verify_and_parse_webhook(payload, signature_header)?;

    let outcome = match event.kind {
        WebhookEventKind::PaymentSucceeded { intent_id } => {
            match store.complete_payment(&intent_id).await? {
                PaymentCompletion::Completed(payment) => WebhookOutcome::Completed {
                    payment_id: payment.id,
                    reservation_id: payment.reservation_id,
                },
                PaymentCompletion::AlreadyCompleted(payment) => {
                    WebhookOutcome::AlreadyCompleted {
                        payment_id: payment.id,
                    }
                }
                PaymentCompletion::Unmatched => WebhookOutcome::Unmatched { intent_id },
            }
        }
        WebhookEventKind::PaymentFailed { intent_id } => {
            warn!(event_id = %event.id, intent_id = %intent_id, "Payment failed at the gateway");
            WebhookOutcome::Ignored(crate::gateway::webhook::PAYMENT_FAILED.to_string())
        }
        WebhookEventKind::Other(kind) => WebhookOutcome::Ignored(kind),
    };

    info!(event_id = %event.id, outcome = ?outcome, "Webhook processed");
    Ok(outcome)
}
