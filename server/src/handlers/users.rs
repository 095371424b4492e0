use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{IntoResponse, Response};

use crate::auth::session::{expired_cookie, session_cookie};
use crate::auth::CurrentUser;
use crate::services::accounts::{self, LoginForm, RegisterForm};
use crate::state::AppState;
use crate::utils::response::{created, empty_success, success};
use crate::utils::{AppError, JsonBody};

pub async fn register(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<RegisterForm>,
) -> Result<Response, AppError> {
    let user = accounts::register(state.store.as_ref(), form).await?;
    Ok(created(user, "Registration successful"))
}

pub async fn login(
    State(state): State<AppState>,
    JsonBody(form): JsonBody<LoginForm>,
) -> Result<Response, AppError> {
    let ttl = state.config.session_ttl;
    let (user, session) = accounts::login(state.store.as_ref(), form, ttl).await?;
    let cookie = session_cookie(&session.token, ttl, state.config.production);

    Ok(([(SET_COOKIE, cookie)], success(user, "Logged in")).into_response())
}

pub async fn profile(current: CurrentUser) -> Response {
    success(current.user, "Profile retrieved")
}

pub async fn logout(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    accounts::logout(state.store.as_ref(), &current.token).await?;
    let cookie = expired_cookie(state.config.production);

    Ok(([(SET_COOKIE, cookie)], empty_success("Logged out")).into_response())
}
