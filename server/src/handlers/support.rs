use axum::extract::State;
use axum::response::Response;

use crate::services::support::{self, ContactForm};
use crate::state::AppState;
use crate::utils::response::{created, success};
use crate::utils::{AppError, JsonBody};

pub async fn list_messages(State(state): State<AppState>) -> Result<Response, AppError> {
    let messages = support::list(state.store.as_ref()).await?;
    Ok(success(messages, "Support messages"))
}

pub async fn contact(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<ContactForm>,
) -> Result<Response, AppError> {
    let message = support::submit(state.store.as_ref(), form).await?;
    Ok(created(message, "Message sent"))
}
