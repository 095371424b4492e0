use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use super::{undercut_error, Store};
use crate::gateway::PaymentIntent;
use crate::models::{
    Confirmation, Customization, Event, EventEdit, EventFilter, EventSummary, NewEvent,
    NewSupportMessage, NewTicketType, NewUser, Payment, PaymentCompletion, Reservation,
    ReservationDetails, Session, SupportMessage, TicketType, User,
};
use crate::utils::AppError;

const USER_COLUMNS: &str =
    "id, username, email, password_hash, is_participant, is_organizer, created_at";

const EVENT_COLUMNS: &str = "e.id, e.organizer_id, e.title, e.description, e.location, \
    e.start_date, e.end_date, e.image, e.theme_color, e.banner_text, e.promo_message, e.created_at";

const TICKET_COLUMNS: &str = "id, event_id, name, price, total_quantity, available_quantity";

const RESERVATION_COLUMNS: &str = "id, user_id, ticket_type_id, quantity, confirmation, created_at";

const PAYMENT_COLUMNS: &str =
    "id, reservation_id, amount, status, intent_id, client_secret, created_at";

const SUPPORT_COLUMNS: &str = "id, name, email, message, response, is_support, created_at";

const RESERVATION_DETAILS: &str = "SELECT r.id, r.user_id, r.ticket_type_id, r.quantity, \
    r.confirmation, r.created_at, t.name AS ticket_name, t.price AS unit_price, \
    e.id AS event_id, e.title AS event_title, e.organizer_id \
    FROM reservations r \
    JOIN ticket_types t ON t.id = r.ticket_type_id \
    JOIN events e ON e.id = t.event_id";

fn event_summaries(condition: &str, order: &str) -> String {
    format!(
        "SELECT {EVENT_COLUMNS}, \
            COALESCE((SELECT SUM(t.available_quantity) FROM ticket_types t WHERE t.event_id = e.id), 0)::BIGINT \
            AS available_tickets \
         FROM events e WHERE {condition} ORDER BY {order}"
    )
}

/// A payment row whose reservation vanished mid-request reads as a missing reservation.
fn missing_reservation(err: sqlx::Error) -> AppError {
    match err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
            AppError::NotFound("Reservation not found".to_string())
        }
        other => other.into(),
    }
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, AppError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;
        info!("Successfully connected to database");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<(), AppError> {
        sqlx::migrate!()
            .run(&self.pool)
            .await
            .map_err(|e| AppError::InternalServerError(format!("migration failed: {e}")))?;
        info!("Migrations run successfully");
        Ok(())
    }
}

#[async_trait]
impl Store for PgStore {
    async fn insert_user(&self, user: NewUser) -> Result<User, AppError> {
        let sql = format!(
            "INSERT INTO users (id, username, email, password_hash, is_participant, is_organizer) \
             VALUES ($1, $2, $3, $4, $5, $6) \
             ON CONFLICT (username) DO NOTHING \
             RETURNING {USER_COLUMNS}"
        );
        sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(&user.username)
            .bind(&user.email)
            .bind(&user.password_hash)
            .bind(user.capabilities.participant)
            .bind(user.capabilities.organizer)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::ValidationError("username already exists".to_string()))
    }

    async fn find_user(&self, id: Uuid) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn find_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1");
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(username)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn insert_session(&self, session: Session) -> Result<(), AppError> {
        sqlx::query(
            "INSERT INTO sessions (token, user_id, created_at, expires_at) VALUES ($1, $2, $3, $4)",
        )
        .bind(&session.token)
        .bind(session.user_id)
        .bind(session.created_at)
        .bind(session.expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_session_user(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Result<Option<User>, AppError> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = \
             (SELECT user_id FROM sessions WHERE token = $1 AND expires_at > $2)"
        );
        Ok(sqlx::query_as::<_, User>(&sql)
            .bind(token)
            .bind(now)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM sessions WHERE token = $1")
            .bind(token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_event(
        &self,
        event: NewEvent,
        tickets: Vec<NewTicketType>,
    ) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "INSERT INTO events AS e (id, organizer_id, title, description, location, start_date, end_date, image) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8) \
             RETURNING {EVENT_COLUMNS}"
        );
        let fields = &event.fields;
        let created = sqlx::query_as::<_, Event>(&sql)
            .bind(Uuid::new_v4())
            .bind(event.organizer_id)
            .bind(&fields.title)
            .bind(&fields.description)
            .bind(&fields.location)
            .bind(fields.start_date)
            .bind(fields.end_date)
            .bind(&fields.image)
            .fetch_one(&mut *tx)
            .await?;

        for ticket in tickets {
            sqlx::query(
                "INSERT INTO ticket_types (id, event_id, name, price, total_quantity, available_quantity) \
                 VALUES ($1, $2, $3, $4, $5, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(created.id)
            .bind(&ticket.name)
            .bind(ticket.price)
            .bind(ticket.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(created)
    }

    async fn find_event(&self, id: Uuid) -> Result<Option<Event>, AppError> {
        let sql = format!("SELECT {EVENT_COLUMNS} FROM events e WHERE e.id = $1");
        Ok(sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn apply_event_edit(&self, event_id: Uuid, edit: EventEdit) -> Result<Event, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM ticket_types WHERE event_id = $1 FOR UPDATE"
        );
        let current: HashMap<Uuid, TicketType> = sqlx::query_as::<_, TicketType>(&sql)
            .bind(event_id)
            .fetch_all(&mut *tx)
            .await?
            .into_iter()
            .map(|ticket| (ticket.id, ticket))
            .collect();

        let mut resized = Vec::with_capacity(edit.updates.len());
        for update in &edit.updates {
            let ticket = current.get(&update.id).ok_or_else(|| {
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

        let fields = edit.fields;
        let sql = format!(
            "UPDATE events AS e SET title = $2, description = $3, location = $4, \
             start_date = $5, end_date = $6, image = COALESCE($7, e.image) \
             WHERE e.id = $1 RETURNING {EVENT_COLUMNS}"
        );
        let event = sqlx::query_as::<_, Event>(&sql)
            .bind(event_id)
            .bind(&fields.title)
            .bind(&fields.description)
            .bind(&fields.location)
            .bind(fields.start_date)
            .bind(fields.end_date)
            .bind(&fields.image)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;

        for (update, available) in edit.updates.iter().zip(resized) {
            sqlx::query(
                "UPDATE ticket_types SET name = $2, price = $3, total_quantity = $4, \
                 available_quantity = $5 WHERE id = $1",
            )
            .bind(update.id)
            .bind(&update.name)
            .bind(update.price)
            .bind(update.total_quantity)
            .bind(available)
            .execute(&mut *tx)
            .await?;
        }

        for ticket in &edit.additions {
            sqlx::query(
                "INSERT INTO ticket_types \
                 (id, event_id, name, price, total_quantity, available_quantity) \
                 VALUES ($1, $2, $3, $4, $5, $5)",
            )
            .bind(Uuid::new_v4())
            .bind(event_id)
            .bind(&ticket.name)
            .bind(ticket.price)
            .bind(ticket.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(event)
    }

    async fn update_customization(
        &self,
        id: Uuid,
        customization: Customization,
    ) -> Result<Event, AppError> {
        let sql = format!(
            "UPDATE events AS e SET theme_color = $2, banner_text = $3, promo_message = $4 \
             WHERE e.id = $1 RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&sql)
            .bind(id)
            .bind(&customization.theme_color)
            .bind(&customization.banner_text)
            .bind(&customization.promo_message)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
    }

    async fn list_events(&self, filter: &EventFilter) -> Result<Vec<EventSummary>, AppError> {
        let sql = event_summaries(
            "($1::TEXT IS NULL \
                OR strpos(lower(e.title), lower($1)) > 0 \
                OR strpos(lower(e.location), lower($1)) > 0) \
             AND ($2::DATE IS NULL OR (e.start_date AT TIME ZONE 'UTC')::DATE = $2)",
            "e.start_date ASC",
        );
        Ok(sqlx::query_as::<_, EventSummary>(&sql)
            .bind(&filter.text)
            .bind(filter.date)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_events_by_organizer(
        &self,
        organizer_id: Uuid,
    ) -> Result<Vec<EventSummary>, AppError> {
        let sql = event_summaries("e.organizer_id = $1", "e.start_date ASC");
        Ok(sqlx::query_as::<_, EventSummary>(&sql)
            .bind(organizer_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn latest_events(&self, limit: i64) -> Result<Vec<EventSummary>, AppError> {
        let sql = format!("{} LIMIT $1", event_summaries("TRUE", "e.start_date DESC"));
        Ok(sqlx::query_as::<_, EventSummary>(&sql)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_ticket_types(&self, event_id: Uuid) -> Result<Vec<TicketType>, AppError> {
        let sql = format!(
            "SELECT {TICKET_COLUMNS} FROM ticket_types WHERE event_id = $1 ORDER BY price, name"
        );
        Ok(sqlx::query_as::<_, TicketType>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn reserve(
        &self,
        user_id: Uuid,
        ticket_type_id: Uuid,
        quantity: i32,
    ) -> Result<Reservation, AppError> {
        let mut tx = self.pool.begin().await?;

        // The row lock serialises concurrent reservers of the same ticket type.
        let available: i32 = sqlx::query_scalar(
            "SELECT available_quantity FROM ticket_types WHERE id = $1 FOR UPDATE",
        )
        .bind(ticket_type_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Ticket type not found".to_string()))?;

        if quantity > available {
            return Err(AppError::InsufficientStock {
                requested: quantity,
                available,
            });
        }

        sqlx::query("UPDATE ticket_types SET available_quantity = available_quantity - $2 WHERE id = $1")
            .bind(ticket_type_id)
            .bind(quantity)
            .execute(&mut *tx)
            .await?;

        let sql = format!(
            "INSERT INTO reservations (id, user_id, ticket_type_id, quantity, confirmation) \
             VALUES ($1, $2, $3, $4, $5) RETURNING {RESERVATION_COLUMNS}"
        );
        let reservation = sqlx::query_as::<_, Reservation>(&sql)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(ticket_type_id)
            .bind(quantity)
            .bind(Confirmation::Unconfirmed)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(reservation)
    }

    async fn find_reservation(&self, id: Uuid) -> Result<Option<ReservationDetails>, AppError> {
        let sql = format!("{RESERVATION_DETAILS} WHERE r.id = $1");
        Ok(sqlx::query_as::<_, ReservationDetails>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn cancel_reservation(&self, id: Uuid) -> Result<Reservation, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE");
        let reservation = sqlx::query_as::<_, Reservation>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Reservation not found".to_string()))?;

        sqlx::query(
            "UPDATE ticket_types \
             SET available_quantity = LEAST(available_quantity + $2, total_quantity) \
             WHERE id = $1",
        )
        .bind(reservation.ticket_type_id)
        .bind(reservation.quantity)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM reservations WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(reservation)
    }

    async fn confirm_reservation(
        &self,
        id: Uuid,
        by: Confirmation,
    ) -> Result<Reservation, AppError> {
        let mut tx = self.pool.begin().await?;

        let sql = format!("SELECT {RESERVATION_COLUMNS} FROM reservations WHERE id = $1 FOR UPDATE");
        let current = sqlx::query_as::<_, Reservation>(&sql)
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| AppError::NotFound("Reservation not found".to_string()))?;

        let sql = format!(
            "UPDATE reservations SET confirmation = $2 WHERE id = $1 RETURNING {RESERVATION_COLUMNS}"
        );
        let updated = sqlx::query_as::<_, Reservation>(&sql)
            .bind(id)
            .bind(current.confirmation.merge(by))
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(updated)
    }

    async fn list_reservations_for_user(
        &self,
        user_id: Uuid,
        confirmed_only: bool,
    ) -> Result<Vec<ReservationDetails>, AppError> {
        let sql = format!(
            "{RESERVATION_DETAILS} WHERE r.user_id = $1 \
             AND (NOT $2 OR r.confirmation <> 'unconfirmed') \
             ORDER BY r.created_at DESC"
        );
        Ok(sqlx::query_as::<_, ReservationDetails>(&sql)
            .bind(user_id)
            .bind(confirmed_only)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn list_reservations_for_event(
        &self,
        event_id: Uuid,
    ) -> Result<Vec<ReservationDetails>, AppError> {
        let sql = format!("{RESERVATION_DETAILS} WHERE e.id = $1 ORDER BY r.created_at DESC");
        Ok(sqlx::query_as::<_, ReservationDetails>(&sql)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn find_payment_for_reservation(
        &self,
        reservation_id: Uuid,
    ) -> Result<Option<Payment>, AppError> {
        let sql = format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE reservation_id = $1");
        Ok(sqlx::query_as::<_, Payment>(&sql)
            .bind(reservation_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn ensure_payment(
        &self,
        reservation_id: Uuid,
        amount: Decimal,
    ) -> Result<Payment, AppError> {
        sqlx::query(
            "INSERT INTO payments (id, reservation_id, amount, status) \
             SELECT $1, $2, $3, 'pending' \
             WHERE EXISTS (SELECT 1 FROM reservations WHERE id = $2) \
             ON CONFLICT (reservation_id) DO NOTHING",
        )
        .bind(Uuid::new_v4())
        .bind(reservation_id)
        .bind(amount)
        .execute(&self.pool)
        .await
        .map_err(missing_reservation)?;

        self.find_payment_for_reservation(reservation_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Reservation not found".to_string()))
    }

    async fn attach_intent(
        &self,
        reservation_id: Uuid,
        amount: Decimal,
        intent: &PaymentIntent,
    ) -> Result<Payment, AppError> {
        let sql = format!(
            "INSERT INTO payments AS p (id, reservation_id, amount, status, intent_id, client_secret) \
             VALUES ($1, $2, $3, 'pending', $4, $5) \
             ON CONFLICT (reservation_id) DO UPDATE \
                SET amount = EXCLUDED.amount, intent_id = EXCLUDED.intent_id, \
                    client_secret = EXCLUDED.client_secret \
                WHERE p.status = 'pending' \
             RETURNING {PAYMENT_COLUMNS}"
        );
        sqlx::query_as::<_, Payment>(&sql)
            .bind(Uuid::new_v4())
            .bind(reservation_id)
            .bind(amount)
            .bind(&intent.id)
            .bind(&intent.client_secret)
            .fetch_optional(&self.pool)
            .await
            .map_err(missing_reservation)?
            .ok_or_else(|| {
                AppError::ValidationError("This reservation has already been paid".to_string())
            })
    }

    async fn complete_payment(&self, intent_id: &str) -> Result<PaymentCompletion, AppError> {
        let mut tx = self.pool.begin().await?;

        let reservation_id: Option<Uuid> =
            sqlx::query_scalar("SELECT reservation_id FROM payments WHERE intent_id = $1")
                .bind(intent_id)
                .fetch_optional(&mut *tx)
                .await?;
        let Some(reservation_id) = reservation_id else {
            return Ok(PaymentCompletion::Unmatched);
        };

        // Same lock order as cancellation: reservation first, then its payment.
        let locked: Option<Uuid> =
            sqlx::query_scalar("SELECT id FROM reservations WHERE id = $1 FOR UPDATE")
                .bind(reservation_id)
                .fetch_optional(&mut *tx)
                .await?;
        if locked.is_none() {
            return Ok(PaymentCompletion::Unmatched);
        }

        let sql = format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE intent_id = $1 AND reservation_id = $2 FOR UPDATE"
        );
        let Some(payment) = sqlx::query_as::<_, Payment>(&sql)
            .bind(intent_id)
            .bind(reservation_id)
            .fetch_optional(&mut *tx)
            .await?
        else {
            return Ok(PaymentCompletion::Unmatched);
        };

        if payment.is_completed() {
            return Ok(PaymentCompletion::AlreadyCompleted(payment));
        }

        let sql = format!(
            "UPDATE payments SET status = 'completed' WHERE id = $1 RETURNING {PAYMENT_COLUMNS}"
        );
        let completed = sqlx::query_as::<_, Payment>(&sql)
            .bind(payment.id)
            .fetch_one(&mut *tx)
            .await?;

        sqlx::query("UPDATE reservations SET confirmation = $2 WHERE id = $1")
            .bind(reservation_id)
            .bind(Confirmation::Payment)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(PaymentCompletion::Completed(completed))
    }

    async fn insert_support_message(
        &self,
        message: NewSupportMessage,
    ) -> Result<SupportMessage, AppError> {
        let sql = format!(
            "INSERT INTO support_messages (id, name, email, message) VALUES ($1, $2, $3, $4) \
             RETURNING {SUPPORT_COLUMNS}"
        );
        Ok(sqlx::query_as::<_, SupportMessage>(&sql)
            .bind(Uuid::new_v4())
            .bind(&message.name)
            .bind(&message.email)
            .bind(&message.message)
            .fetch_one(&self.pool)
            .await?)
    }

    async fn list_support_messages(&self) -> Result<Vec<SupportMessage>, AppError> {
        let sql = format!("SELECT {SUPPORT_COLUMNS} FROM support_messages ORDER BY created_at DESC");
        Ok(sqlx::query_as::<_, SupportMessage>(&sql)
            .fetch_all(&self.pool)
            .await?)
    }
}
