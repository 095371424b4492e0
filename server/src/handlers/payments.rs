use axum::body::Bytes;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::gateway::SIGNATURE_HEADER;
use crate::services::payments;
use crate::state::AppState;
use crate::utils::response::{empty_success, success};
use crate::utils::{AppError, PathParam};

#[derive(Serialize)]
struct ClientSecret {
    client_secret: String,
}

pub async fn payment_page(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParam(reservation_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let page = payments::payment_page(
        state.store.as_ref(),
        &state.config.payment,
        &current.user,
        reservation_id,
    )
    .await?;
    Ok(success(page, "Payment details"))
}

pub async fn create_intent(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParam(reservation_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let intent = payments::create_payment_intent(
        state.store.as_ref(),
        state.gateway.as_ref(),
        &state.config.payment.currency,
        &current.user,
        reservation_id,
    )
    .await?;

    let body = ClientSecret {
        client_secret: intent.client_secret,
    };
    Ok(success(body, "Payment intent created"))
}

pub async fn payment_success() -> Response {
    empty_success("Payment submitted. Your reservation is confirmed once the provider reports it.")
}

pub async fn payment_cancel() -> Response {
    empty_success("Payment cancelled. Your reservation is kept until you cancel it.")
}

/// Provider callback. Reads the raw body so the signature can be checked
/// before anything is parsed.
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    let outcome =
        payments::handle_webhook(state.store.as_ref(), state.gateway.as_ref(), &body, signature)
            .await?;
    Ok(empty_success(outcome.describe()))
}
