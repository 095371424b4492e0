use axum::extract::{Query, State};
use axum::response::Response;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::models::Customization;
use crate::services::catalog::{self, EventForm, EventQuery};
use crate::state::AppState;
use crate::utils::response::{created, success};
use crate::utils::{AppError, JsonBody, PathParam};

pub async fn list_events(
    State(state): State<AppState>,
    Query(query): Query<EventQuery>,
) -> Result<Response, AppError> {
    let events = catalog::list_events(state.store.as_ref(), query).await?;
    Ok(success(events, "Events retrieved"))
}

pub async fn event_detail(
    State(state): State<AppState>,
    PathParam(event_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let detail = catalog::event_detail(state.store.as_ref(), event_id).await?;
    Ok(success(detail, "Event retrieved"))
}

pub async fn create_event(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(form): JsonBody<EventForm>,
) -> Result<Response, AppError> {
    let detail = catalog::create_event(state.store.as_ref(), &current.user, form).await?;
    Ok(created(detail, "Event created"))
}

/// Current values for the edit form, owner only.
pub async fn edit_form(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParam(event_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let store = state.store.as_ref();
    catalog::owned_event(store, &current.user, event_id).await?;
    let detail = catalog::event_detail(store, event_id).await?;
    Ok(success(detail, "Event retrieved"))
}

pub async fn edit_event(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParam(event_id): PathParam<Uuid>,
    JsonBody(form): JsonBody<EventForm>,
) -> Result<Response, AppError> {
    let detail = catalog::edit_event(state.store.as_ref(), &current.user, event_id, form).await?;
    Ok(success(detail, "Event updated"))
}

pub async fn my_events(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    let events = catalog::organizer_events(state.store.as_ref(), &current.user).await?;
    Ok(success(events, "Your events"))
}

pub async fn customize_form(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParam(event_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let event = catalog::owned_event(state.store.as_ref(), &current.user, event_id).await?;
    let customization = Customization {
        theme_color: event.theme_color,
        banner_text: event.banner_text,
        promo_message: event.promo_message,
    };
    Ok(success(customization, "Event customization"))
}

pub async fn customize_event(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParam(event_id): PathParam<Uuid>,
    JsonBody(form): JsonBody<Customization>,
) -> Result<Response, AppError> {
    let event =
        catalog::customize_event(state.store.as_ref(), &current.user, event_id, form).await?;
    Ok(success(event, "Event customized"))
}
