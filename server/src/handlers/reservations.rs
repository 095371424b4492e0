use axum::extract::State;
use axum::response::Response;
use uuid::Uuid;

use crate::auth::CurrentUser;
use crate::services::reservations::{self, CancelForm, ManageForm, ReservationAction, ReserveForm};
use crate::state::AppState;
use crate::utils::response::{created, empty_success, success};
use crate::utils::{AppError, JsonBody, PathParam};

pub async fn reserve(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParam(event_id): PathParam<Uuid>,
    JsonBody(form): JsonBody<ReserveForm>,
) -> Result<Response, AppError> {
    let reservation =
        reservations::reserve_at_event(state.store.as_ref(), &current.user, event_id, form).await?;
    Ok(created(reservation, "Tickets reserved"))
}

pub async fn my_tickets(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    let tickets =
        reservations::list_for_participant(state.store.as_ref(), &current.user, true).await?;
    Ok(success(tickets, "Your tickets"))
}

pub async fn my_reservations(
    State(state): State<AppState>,
    current: CurrentUser,
) -> Result<Response, AppError> {
    let all = reservations::list_for_participant(state.store.as_ref(), &current.user, false).await?;
    Ok(success(all, "Your reservations"))
}

pub async fn cancel_reservation(
    State(state): State<AppState>,
    current: CurrentUser,
    JsonBody(form): JsonBody<CancelForm>,
) -> Result<Response, AppError> {
    reservations::cancel(state.store.as_ref(), &current.user, form.reservation_id).await?;
    Ok(empty_success("Reservation cancelled"))
}

pub async fn event_reservations(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParam(event_id): PathParam<Uuid>,
) -> Result<Response, AppError> {
    let listed =
        reservations::list_for_event(state.store.as_ref(), &current.user, event_id).await?;
    Ok(success(listed, "Event reservations"))
}

pub async fn manage_reservation(
    State(state): State<AppState>,
    current: CurrentUser,
    PathParam(event_id): PathParam<Uuid>,
    JsonBody(form): JsonBody<ManageForm>,
) -> Result<Response, AppError> {
    let action = form.action;
    let result =
        reservations::manage(state.store.as_ref(), &current.user, event_id, form).await?;

    Ok(match (action, result) {
        (ReservationAction::Confirm, Some(reservation)) => {
            success(reservation, "Reservation confirmed")
        }
        _ => empty_success("Reservation deleted"),
    })
}
