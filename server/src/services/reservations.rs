use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::catalog;
use crate::auth::{authorize, Permission};
use crate::models::{Confirmation, Reservation, ReservationDetails, User};
use crate::store::Store;
use crate::utils::AppError;

#[derive(Debug, Clone, Deserialize)]
pub struct ReserveForm {
    pub ticket_id: Uuid,
    pub quantity: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReservationAction {
    Confirm,
    Delete,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ManageForm {
    pub reservation_id: Uuid,
    pub action: ReservationAction,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CancelForm {
    pub reservation_id: Uuid,
}

fn not_found() -> AppError {
    AppError::NotFound("Reservation not found".to_string())
}

/// Takes `quantity` units of a ticket type. The stock check and the
/// decrement happen in one store call, so concurrent callers cannot oversell.
pub async fn reserve(
    store: &dyn Store,
    participant: &User,
    ticket_type_id: Uuid,
    quantity: i32,
) -> Result<Reservation, AppError> {
    authorize(participant, Permission::Reserve)?;
    if quantity < 1 {
        return Err(AppError::ValidationError(
            "quantity must be at least 1".to_string(),
        ));
    }

    let reservation = store.reserve(participant.id, ticket_type_id, quantity).await?;
    info!(
        reservation_id = %reservation.id,
        ticket_type_id = %ticket_type_id,
        quantity,
        "Reservation created"
    );
    Ok(reservation)
}

/// Reservation submitted from an event page; the ticket type must belong to
/// that event.
pub async fn reserve_at_event(
    store: &dyn Store,
    participant: &User,
    event_id: Uuid,
    form: ReserveForm,
) -> Result<Reservation, AppError> {
    authorize(participant, Permission::Reserve)?;
    let ticket = catalog::ticket_of_event(store, event_id, form.ticket_id).await?;
    reserve(store, participant, ticket.id, form.quantity).await
}

/// The reservation, if `actor` owns it or organizes its event.
async fn in_scope(
    store: &dyn Store,
    actor: &User,
    reservation_id: Uuid,
) -> Result<ReservationDetails, AppError> {
    store
        .find_reservation(reservation_id)
        .await?
        .filter(|d| {
            d.reservation.user_id == actor.id
                || (d.organizer_id == actor.id
                    && authorize(actor, Permission::ManageEvents).is_ok())
        })
        .ok_or_else(not_found)
}

/// Deletes the reservation and returns its units to stock.
pub async fn cancel(
    store: &dyn Store,
    actor: &User,
    reservation_id: Uuid,
) -> Result<Reservation, AppError> {
    in_scope(store, actor, reservation_id).await?;
    let reservation = store.cancel_reservation(reservation_id).await?;
    info!(
        reservation_id = %reservation.id,
        actor_id = %actor.id,
        restocked = reservation.quantity,
        "Reservation cancelled"
    );
    Ok(reservation)
}

/// Manual confirmation by the event's organizer. Repeating it is harmless.
pub async fn confirm(
    store: &dyn Store,
    organizer: &User,
    reservation_id: Uuid,
) -> Result<Reservation, AppError> {
    authorize(organizer, Permission::ManageEvents)?;
    let details = store
        .find_reservation(reservation_id)
        .await?
        .filter(|d| d.organizer_id == organizer.id)
        .ok_or_else(not_found)?;

    let reservation = store
        .confirm_reservation(details.reservation.id, Confirmation::Organizer)
        .await?;
    info!(
        reservation_id = %reservation.id,
        confirmation = ?reservation.confirmation,
        "Reservation confirmed"
    );
    Ok(reservation)
}

pub async fn list_for_participant(
    store: &dyn Store,
    user: &User,
    confirmed_only: bool,
) -> Result<Vec<ReservationDetails>, AppError> {
    store.list_reservations_for_user(user.id, confirmed_only).await
}

pub async fn list_for_event(
    store: &dyn Store,
    organizer: &User,
    event_id: Uuid,
) -> Result<Vec<ReservationDetails>, AppError> {
    catalog::owned_event(store, organizer, event_id).await?;
    store.list_reservations_for_event(event_id).await
}

/// Organizer action on one of an event's reservations. `None` after a delete.
pub async fn manage(
    store: &dyn Store,
    organizer: &User,
    event_id: Uuid,
    form: ManageForm,
) -> Result<Option<Reservation>, AppError> {
    catalog::owned_event(store, organizer, event_id).await?;
    let belongs = store
        .find_reservation(form.reservation_id)
        .await?
        .is_some_and(|d| d.event_id == event_id);
    if !belongs {
        return Err(not_found());
    }

    match form.action {
        ReservationAction::Confirm => confirm(store, organizer, form.reservation_id)
            .await
            .map(Some),
        ReservationAction::Delete => cancel(store, organizer, form.reservation_id)
            .await
            .map(|_| None),
    }
}
