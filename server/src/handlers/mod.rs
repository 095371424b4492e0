use axum::extract::State;
use axum::response::Response;
use serde::Serialize;

use crate::services::catalog;
use crate::state::AppState;
use crate::utils::response::success;
use crate::utils::AppError;

pub mod events;
pub mod payments;
pub mod reservations;
pub mod support;
pub mod users;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "marquee-api",
    };

    success(payload, "Health check successful")
}

/// Home page feed: the latest events.
pub async fn home(State(state): State<AppState>) -> Result<Response, AppError> {
    let events = catalog::home_feed(state.store.as_ref()).await?;
    Ok(success(events, "Latest events"))
}
