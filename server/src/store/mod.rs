//! Persistence.
//!
//! Every method that reads `available_quantity` and then writes it, and the
//! payment completion, is a single atomic unit in each implementation. Callers
//! never do the check themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::gateway::PaymentIntent;
use crate::models::{
    Confirmation, Customization, Event, EventEdit, EventFilter, EventSummary, NewEvent,
    NewSupportMessage, NewTicketType, NewUser, Payment, PaymentCompletion, Reservation,
    ReservationDetails, Session, SupportMessage, TicketType, User,
};
use crate::utils::AppError;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait Store: Send + Sync {
    /// Fails with `ValidationError` when the username is taken.
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError>;
    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError>;

    async fn insert_session(&self, session: Session) -> Result<(), AppError>;
    /// The user behind an unexpired session.
    async fn find_session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError>;
    async fn delete_session(&self, token: &str) -> Result<(), AppError>;

    /// Inserts the event and its ticket types together.
    async fn insert_event(
        &self,
        event: NewEvent,
        tickets: Vec<NewTicketType>,
    ) -> Result<Event, AppError>;
    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError>;
    /// Applies an edit as one unit. Every update is checked first: `NotFound`
    /// when a ticket type belongs to another event, `ValidationError` when a
    /// new total undercuts reservations. On error nothing is written.
    async fn apply_event_edit(&self, event_id: Uuid, edit: EventEdit) -> Result<Event, AppError>;
    async fn update_customization(
        &self,
        id: Uuid,
        customization: Customization,
    ) -> Result<Event, AppError>;
    /// Ascending by start date.
    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventSummary>, AppError>;
    async fn list_events_by_organizer(
        &self,
        organizer_id: Uuid,
    ) -> Result<Vec<EventSummary>, AppError>;
    /// The `limit` events with the latest start date, latest first.
    async fn latest_events(&self, limit: i64) -> Result<Vec<EventSummary>, AppError>;

    async fn list_ticket_types(&self, event_id: Uuid) -> Result<Vec<TicketType>, AppError>;

    /// Checks stock and takes `quantity` units in one step.
    async fn reserve(
        &self,
        user_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> Result<Reservation, AppError>;
    async fn find_reservation(&self, id: Uuid) -> Result<Option<ReservationDetails>, AppError>;
    /// Returns the units to stock and deletes the reservation (and its payment).
    async fn cancel_reservation(&self, id: Uuid) -> Result<Reservation, AppError>;
    async fn confirm_reservation(
        &self,
        id: Uuid,
        by: Confirmation,
    ) -> Result<Reservation, AppError>;
    /// Newest first.
    async fn list_reservations_for_user(
        &self,
        user_id: Uuid,
        confirmed_only: bool,
    ) -> Result<Vec<ReservationDetails>, AppError>;
    /// Newest first.
    async fn list_reservations_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<ReservationDetails>, AppError>;

    async fn find_payment_for_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Payment>, AppError>;
    /// Returns the reservation's payment, creating a pending one for `amount`
    /// if there is none.
    async fn ensure_payment(
        &self,
        reservation_id: Uuid,
        amount: Decimal,
    ) -> Result<Payment, AppError>;
    /// Creates or updates the reservation's payment with fresh intent values.
    async fn attach_intent(
        &self,
        reservation_id: Uuid,
        amount: Decimal,
        intent: &PaymentIntent,
    ) -> Result<Payment, AppError>;
    /// pending -> completed for the payment carrying `intent_id`, confirming its
    /// reservation in the same step.
    async fn complete_payment(&self, intent_id: &str) -> Result<PaymentCompletion, AppError>;

    async fn insert_support_message(
        &self,
        message: NewSupportMessage,
    ) -> Result<SupportMessage, AppError>;
    /// Newest first.
    async fn list_support_messages(&self) -> Result<Vec<SupportMessage>, AppError>;
}

pub(crate) fn undercut_error(ticket: &TicketType, new_total: i32) -> AppError {
    AppError::ValidationError(format!(
        "'{}' already has {} reserved ticket(s); the quantity cannot drop to {}",
        ticket.name,
        ticket.reserved_quantity(),
        new_total
    ))
}
