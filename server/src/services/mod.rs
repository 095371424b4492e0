//! Request-independent operations. Handlers parse input, call one of these,
//! and wrap the result; every rule about who may do what lives here.

pub mod accounts;
pub mod catalog;
pub mod payments;
pub mod reservations;
pub mod support;

use crate::utils::AppError;

/// Trimmed, non-empty value of a required text field.
pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, AppError> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| AppError::ValidationError(format!("{field} is required")))
}

/// Trimmed value, with blank treated as absent.
pub(crate) fn optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;
    use std::time::Duration;

    use rust_decimal::Decimal;

    use super::catalog::{self, EventDetail, EventForm, TicketRow};
    use crate::gateway::{MockGateway, PaymentGateway, WebhookVerifier};
    use crate::models::{NewUser, Role, User};
    use crate::store::{MemoryStore, Store};

    pub const WEBHOOK_SECRET: &str = "whsec_test";

    pub fn store() -> Arc<dyn Store> {
        Arc::new(MemoryStore::new())
    }

    pub fn verifier() -> WebhookVerifier {
        WebhookVerifier::new(WEBHOOK_SECRET, Duration::from_secs(300))
    }

    pub fn gateway() -> Arc<dyn PaymentGateway> {
        Arc::new(MockGateway::new(verifier()))
    }

    pub async fn user(store: &dyn Store, username: &str, role: Role) -> User {
        store
            .insert_user(NewUser {
                username: username.to_string(),
                email: format!("{username}@example.com"),
                password_hash: String::new(),
                capabilities: role.capabilities(),
            })
            .await
            .unwrap()
    }

    pub fn ticket_row(name: &str, price: Decimal, quantity: i32) -> TicketRow {
        TicketRow {
            ticket_id: None,
            name: Some(name.to_string()),
            price: Some(price),
            quantity: Some(quantity),
        }
    }

    pub fn event_form(title: &str, tickets: Vec<TicketRow>) -> EventForm {
        EventForm {
            title: Some(title.to_string()),
            description: Some("An evening of music".to_string()),
            location: Some("Cluj-Napoca".to_string()),
            start_date: Some("2026-06-01T19:00".to_string()),
            end_date: Some("2026-06-01T23:00".to_string()),
            image: None,
            tickets,
        }
    }

    /// An event with a single ticket type of 50 units at 25.00.
    pub async fn concert(store: &dyn Store, organizer: &User) -> EventDetail {
        catalog::create_event(
            store,
            organizer,
            event_form("Concert", vec![ticket_row("Standard", Decimal::new(2500, 2), 50)]),
        )
        .await
        .unwrap()
    }
}
