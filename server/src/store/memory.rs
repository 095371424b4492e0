use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::{undercut_error, Store};
use crate::gateway::PaymentIntent;
use crate::models::{
    Confirmation, Customization, Event, EventEdit, EventFilter, EventSummary, NewEvent,
    NewSupportMessage, NewTicketType, NewUser, Payment, PaymentCompletion, PaymentStatus,
    Reservation, ReservationDetails, Session, SupportMessage, TicketType, User,
};
use crate::utils::AppError;

#[derive(Default)]
struct Tables {
    users: HashMap<Uuid, User>,
    sessions: HashMap<String, Session>,
    events: HashMap<Uuid, Event>,
    ticket_types: HashMap<Uuid, TicketType>,
    reservations: HashMap<Uuid, Reservation>,
    payments: HashMap<Uuid, Payment>,
    support_messages: Vec<SupportMessage>,
}

impl Tables {
    fn summary(&self, event: &Event) -> EventSummary {
        let available_tickets = self
            .ticket_types
            .values()
            .filter(|t| t.event_id == event.id)
            .map(|t| i64::from(t.available_quantity))
            .sum();
        EventSummary {
            event: event.clone(),
            available_tickets,
        }
    }

    fn summaries<P>(&self, keep: P) -> Vec<EventSummary>
    where
        P: Fn(&Event) -> bool,
    {
        let mut events: Vec<EventSummary> = self
            .events
            .values()
            .filter(|e| keep(e))
            .map(|e| self.summary(e))
            .collect();
        events.sort_by_key(|s| s.event.start_date);
        events
    }

    fn details(&self, reservation: &Reservation) -> Option<ReservationDetails> {
        let ticket = self.ticket_types.get(&reservation.ticket_type_id)?;
        let event = self.events.get(&ticket.event_id)?;
        Some(ReservationDetails {
            reservation: reservation.clone(),
            ticket_name: ticket.name.clone(),
            unit_price: ticket.price,
            event_id: event.id,
            event_title: event.title.clone(),
            organizer_id: event.organizer_id,
        })
    }

    fn reservation_details<P>(&self, keep: P) -> Vec<ReservationDetails>
    where
        P: Fn(&Reservation) -> bool,
    {
        let mut rows: Vec<ReservationDetails> = self
            .reservations
            .values()
            .filter(|r| keep(r))
            .filter_map(|r| self.details(r))
            .collect();
        rows.sort_by(|a, b| b.reservation.created_at.cmp(&a.reservation.created_at));
        rows
    }

    fn payment_for(&self, reservation_id: Uuid) -> Option<&Payment> {
        self.payments
            .values()
            .find(|p| p.reservation_id == reservation_id)
    }
}

/// Everything in one mutex: each trait call is atomic with respect to every
/// other, which is what the stock checks rely on.
#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn new_ticket(event_id: Uuid, ticket: NewTicketType) -> TicketType {
    TicketType {
        id: Uuid::new_v4(),
        event_id,
        name: ticket.name,
        price: ticket.price,
        total_quantity: ticket.quantity,
        available_quantity: ticket.quantity,
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == user.username) {
            return Err(AppError::ValidationError("username already exists".to_string()));
        }
        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email,
            password_hash: user.password_hash,
            is_participant: user.capabilities.participant,
            is_organizer: user.capabilities.organizer,
            created_at: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        Ok(self.tables.lock().await.users.get(&id).cloned())
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.username == username)
            .cloned())
    }

    async fn insert_session(&self, session: Session) -> Result<(), AppError> {
        let mut tables = self.tables.lock().await;
        tables.sessions.insert(session.token.clone(), session);
        Ok(())
    }

    async fn find_session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .sessions
            .get(token)
            .filter(|s| s.is_live(now))
            .and_then(|s| tables.users.get(&s.user_id))
            .cloned())
    }

    async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        self.tables.lock().await.sessions.remove(token);
        Ok(())
    }

    async fn insert_event(
        &self,
        event: NewEvent,
        tickets: Vec<NewTicketType>,
    ) -> Result<Event, AppError> {
        let mut tables = self.tables.lock().await;
        let fields = event.fields;
        let created = Event {
            id: Uuid::new_v4(),
            organizer_id: event.organizer_id,
            title: fields.title,
            description: fields.description,
            location: fields.location,
            start_date: fields.start_date,
            end_date: fields.end_date,
            image: fields.image,
            theme_color: None,
            banner_text: None,
            promo_message: None,
            created_at: Utc::now(),
        };
        for ticket in tickets {
            let ticket = new_ticket(created.id, ticket);
            tables.ticket_types.insert(ticket.id, ticket);
        }
        tables.events.insert(created.id, created.clone());
        Ok(created)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        Ok(self.tables.lock().await.events.get(&id).cloned())
    }

    async fn apply_event_edit(&self, event_id: Uuid, edit: EventEdit) -> Result<Event, AppError> {
        let mut tables = self.tables.lock().await;
        if !tables.events.contains_key(&event_id) {
            return Err(AppError::NotFound("Event not found".to_string()));
        }

        let mut resized = Vec::with_capacity(edit.updates.len());
        for update in &edit.updates {
            let ticket = tables
                .ticket_types
                .get(&update.id)
                .filter(|t| t.event_id == event_id)
                .ok_or_else(|| {
                    AppError::NotFound(format!(
                        "Ticket type {} does not belong to this event",
                        update.id
                    ))
                })?;
            let available = ticket
                .resized_available(update.total_quantity)
                .ok_or_else(|| undercut_error(ticket, update.total_quantity))?;
            resized.push(available);
        }

        for (update, available) in edit.updates.into_iter().zip(resized) {
            if let Some(ticket) = tables.ticket_types.get_mut(&update.id) {
                ticket.name = update.name;
                ticket.price = update.price;
                ticket.total_quantity = update.total_quantity;
                ticket.available_quantity = available;
            }
        }
        for ticket in edit.additions {
            let ticket = new_ticket(event_id, ticket);
            tables.ticket_types.insert(ticket.id, ticket);
        }

        let event = tables
            .events
            .get_mut(&event_id)
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        let fields = edit.fields;
        event.title = fields.title;
        event.description = fields.description;
        event.location = fields.location;
        event.start_date = fields.start_date;
        event.end_date = fields.end_date;
        if fields.image.is_some() {
            event.image = fields.image;
        }
        Ok(event.clone())
    }

    async fn update_customization(
        &self,
        id: Uuid,
        customization: Customization,
    ) -> Result<Event, AppError> {
        let mut tables = self.tables.lock().await;
        let event = tables
            .events
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
        event.theme_color = customization.theme_color;
        event.banner_text = customization.banner_text;
        event.promo_message = customization.promo_message;
        Ok(event.clone())
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventSummary>, AppError> {
        Ok(self.tables.lock().await.summaries(|e| filter.matches(e)))
    }

    async fn list_events_by_organizer(
        &self,
        organizer_id: Uuid,
    ) -> Result<Vec<EventSummary>, AppError> {
        Ok(self
            .tables
            .lock()
            .await
            .summaries(|e| e.organizer_id == organizer_id))
    }

    async fn latest_events(&self, limit: i64) -> Result<Vec<EventSummary>, AppError> {
        let mut events = self.tables.lock().await.summaries(|_| true);
        events.reverse();
        events.truncate(usize::try_from(limit).unwrap_or(0));
        Ok(events)
    }

    async fn list_ticket_types(&self, event_id: Uuid) -> Result<Vec<TicketType>, AppError> {
        let tables = self.tables.lock().await;
        let mut tickets: Vec<TicketType> = tables
            .ticket_types
            .values()
            .filter(|t| t.event_id == event_id)
            .cloned()
            .collect();
        tickets.sort_by(|a, b| a.price.cmp(&b.price).then_with(|| a.name.cmp(&b.name)));
        Ok(tickets)
    }

    async fn reserve(
        &self,
        user_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> Result<Reservation, AppError> {
        let mut tables = self.tables.lock().await;
        let ticket = tables
            .ticket_types
            .get_mut(&ticket_type_id)
            .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

        if quantity > ticket.available_quantity {
            return Err(AppError::InsufficientStock {
                requested: quantity,
                available: ticket.available_quantity,
            });
        }
        ticket.available_quantity -= quantity;

        let reservation = Reservation {
            id: Uuid::new_v4(),
            user_id,
            ticket_type_id,
            quantity,
            confirmation: Confirmation::Unconfirmed,
            created_at: Utc::now(),
        };
        tables
            .reservations
            .insert(reservation.id, reservation.clone());
        Ok(reservation)
    }

    async fn find_reservation(&self, id: Uuid) -> Result<Option<ReservationDetails>, AppError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .reservations
            .get(&id)
            .and_then(|r| tables.details(r)))
    }

    async fn cancel_reservation(&self, id: Uuid) -> Result<Reservation, AppError> {
        let mut tables = self.tables.lock().await;
        let reservation = tables
            .reservations
            .remove(&id)
            .ok_or_else(|| AppError::NotFound("Reservation not found".to_string()))?;

        if let Some(ticket) = tables.ticket_types.get_mut(&reservation.ticket_type_id) {
            ticket.available_quantity = ticket.restocked_available(reservation.quantity);
        }
        tables.payments.retain(|_, p| p.reservation_id != id);
        Ok(reservation)
    }

    async fn confirm_reservation(
        &self,
        id: Uuid,
        by: Confirmation,
    ) -> Result<Reservation, AppError> {
        let mut tables = self.tables.lock().await;
        let reservation = tables
            .reservations
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound("Reservation not found".to_string()))?;
        reservation.confirmation = reservation.confirmation.merge(by);
        Ok(reservation.clone())
    }

    async fn list_reservations_for_user(
        &self,
        user_id: Uuid,
        confirmed_only: bool,
    ) -> Result<Vec<ReservationDetails>, AppError> {
        Ok(self
            .tables
            .lock()
            .await
            .reservation_details(|r| r.user_id == user_id && (!confirmed_only || r.confirmed())))
    }

    async fn list_reservations_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<ReservationDetails>, AppError> {
        let tables = self.tables.lock().await;
        let mut rows = tables.reservation_details(|_| true);
        rows.retain(|d| d.event_id == event_id);
        Ok(rows)
    }

    async fn find_payment_for_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        Ok(self.tables.lock().await.payment_for(reservation_id).cloned())
    }

    async fn ensure_payment(
        &self,
        reservation_id: Uuid,
        amount: Decimal,
    ) -> Result<Payment, AppError> {
        let mut tables = self.tables.lock().await;
        if let Some(existing) = tables.payment_for(reservation_id) {
            return Ok(existing.clone());
        }
        if !tables.reservations.contains_key(&reservation_id) {
            return Err(AppError::NotFound("Reservation not found".to_string()));
        }
        let payment = Payment {
            id: Uuid::new_v4(),
            reservation_id,
            amount,
            status: PaymentStatus::Pending,
            intent_id: None,
            client_secret: None,
            created_at: Utc::now(),
        };
        tables.payments.insert(payment.id, payment.clone());
        Ok(payment)
    }

    async fn attach_intent(
        &self,
        reservation_id: Uuid,
        amount: Decimal,
        intent: &PaymentIntent,
    ) -> Result<Payment, AppError> {
        let mut tables = self.tables.lock().await;
        if !tables.reservations.contains_key(&reservation_id) {
            return Err(AppError::NotFound("Reservation not found".to_string()));
        }

        let existing = tables.payment_for(reservation_id).map(|p| p.id);
        let payment = match existing.and_then(|id| tables.payments.get_mut(&id)) {
            Some(payment) if payment.status != PaymentStatus::Pending => {
                return Err(AppError::ValidationError(
                    "This reservation has already been paid".to_string(),
                ));
            }
            Some(payment) => {
                payment.amount = amount;
                payment.intent_id = Some(intent.id.clone());
                payment.client_secret = Some(intent.client_secret.clone());
                payment.clone()
            }
            None => {
                let payment = Payment {
                    id: Uuid::new_v4(),
                    reservation_id,
                    amount,
                    status: PaymentStatus::Pending,
                    intent_id: Some(intent.id.clone()),
                    client_secret: Some(intent.client_secret.clone()),
                    created_at: Utc::now(),
                };
                tables.payments.insert(payment.id, payment.clone());
                payment
            }
        };
        Ok(payment)
    }

    async fn complete_payment(&self, intent_id: &str) -> Result<PaymentCompletion, AppError> {
        let mut tables = self.tables.lock().await;
        let Some(payment) = tables
            .payments
            .values_mut()
            .find(|p| p.intent_id.as_deref() == Some(intent_id))
        else {
            return Ok(PaymentCompletion::Unmatched);
        };

        if payment.is_completed() {
            return Ok(PaymentCompletion::AlreadyCompleted(payment.clone()));
        }
        payment.status = PaymentStatus::Completed;
        let completed = payment.clone();

        if let Some(reservation) = tables.reservations.get_mut(&completed.reservation_id) {
            reservation.confirmation = reservation.confirmation.merge(Confirmation::Payment);
        }
        Ok(PaymentCompletion::Completed(completed))
    }

    async fn insert_support_message(
        &self,
        message: NewSupportMessage,
    ) -> Result<SupportMessage, AppError> {
        let created = SupportMessage {
            id: Uuid::new_v4(),
            name: message.name,
            email: message.email,
            message: message.message,
            response: None,
            is_support: false,
            created_at: Utc::now(),
        };
        self.tables
            .lock()
            .await
            .support_messages
            .push(created.clone());
        Ok(created)
    }

    async fn list_support_messages(&self) -> Result<Vec<SupportMessage>, AppError> {
        let tables = self.tables.lock().await;
        let mut messages = tables.support_messages.clone();
        messages.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(messages)
    }
}
