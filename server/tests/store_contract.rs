//! Behaviour every `Store` must share. Runs against the memory store always
//! and against Postgres when `DATABASE_URL` is set.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use marquee_server::gateway::PaymentIntent;
use marquee_server::models::{
    Capabilities, Confirmation, EventEdit, EventFields, NewEvent, NewTicketType, NewUser,
    PaymentCompletion, PaymentStatus, TicketType, TicketTypeUpdate, User,
};
use marquee_server::store::{MemoryStore, PgStore, Store};
use marquee_server::utils::AppError;

async fn stores() -> Vec<(&'static str, Arc<dyn Store>)> {
    let mut stores: Vec<(&'static str, Arc<dyn Store>)> =
        vec![("memory", Arc::new(MemoryStore::new()))];
    match std::env::var("DATABASE_URL") {
        Ok(url) => {
            let pg = PgStore::connect(&url, 5).await.unwrap();
            pg.migrate().await.unwrap();
            stores.push(("postgres", Arc::new(pg)));
        }
        Err(_) => eprintln!("DATABASE_URL not set; checking the memory store only"),
    }
    stores
}

async fn user(store: &dyn Store, role: &str) -> User {
    let username = format!("{role}_{}", Uuid::new_v4().simple());
    store
        .insert_user(NewUser {
            email: format!("{username}@example.com"),
            username,
            password_hash: "unused".to_string(),
            capabilities: Capabilities {
                participant: true,
                organizer: true,
            },
        })
        .await
        .unwrap()
}

fn fields(title: &str) -> EventFields {
    let start = Utc::now() + Duration::days(30);
    EventFields {
        title: title.to_string(),
        description: "Store contract".to_string(),
        location: "Cluj-Napoca".to_string(),
        start_date: start,
        end_date: start + Duration::hours(4),
        image: None,
    }
}

/// An event with one ticket type of `quantity` units at 25.00.
async fn event_with_stock(store: &dyn Store, organizer: &User, quantity: i32) -> (Uuid, TicketType) {
    let event = store
        .insert_event(
            NewEvent {
                organizer_id: organizer.id,
                fields: fields("Concert"),
            },
            vec![NewTicketType {
                name: "Standard".to_string(),
                price: Decimal::new(2500, 2),
                quantity,
            }],
        )
        .await
        .unwrap();
    let ticket = store.list_ticket_types(event.id).await.unwrap().remove(0);
    (event.id, ticket)
}

async fn ticket(store: &dyn Store, event_id: Uuid) -> TicketType {
    store.list_ticket_types(event_id).await.unwrap().remove(0)
}

fn intent() -> PaymentIntent {
    let id = Uuid::new_v4().simple();
    PaymentIntent {
        id: format!("pi_{id}"),
        client_secret: format!("pi_{id}_secret"),
    }
}

#[tokio::test]
async fn test_reserve_then_cancel_returns_stock() {
    for (name, store) in stores().await {
        let org = user(store.as_ref(), "org").await;
        let pat = user(store.as_ref(), "pat").await;
        let (event_id, standard) = event_with_stock(store.as_ref(), &org, 10).await;

        let reservation = store.reserve(pat.id, standard.id, 4).await.unwrap();
        assert_eq!(ticket(store.as_ref(), event_id).await.available_quantity, 6, "{name}");

        let err = store.reserve(pat.id, standard.id, 7).await.unwrap_err();
        assert!(
            matches!(err, AppError::InsufficientStock { requested: 7, available: 6 }),
            "{name}: {err:?}"
        );

        store.cancel_reservation(reservation.id).await.unwrap();
        assert_eq!(ticket(store.as_ref(), event_id).await.available_quantity, 10, "{name}");
        assert!(store.find_reservation(reservation.id).await.unwrap().is_none(), "{name}");

        let err = store.cancel_reservation(reservation.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{name}: {err:?}");
    }
}

#[tokio::test]
async fn test_last_seat_goes_to_exactly_one_caller() {
    for (name, store) in stores().await {
        let org = user(store.as_ref(), "org").await;
        let pat = user(store.as_ref(), "pat").await;
        let (event_id, standard) = event_with_stock(store.as_ref(), &org, 1).await;

        let attempts: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.reserve(pat.id, standard.id, 1).await })
            })
            .collect();

        let mut won = 0;
        for attempt in attempts {
            match attempt.await.unwrap() {
                Ok(_) => won += 1,
                Err(AppError::InsufficientStock { .. }) => {}
                Err(other) => panic!("{name}: unexpected error {other:?}"),
            }
        }
        assert_eq!(won, 1, "{name}");
        assert_eq!(ticket(store.as_ref(), event_id).await.available_quantity, 0, "{name}");
    }
}

#[tokio::test]
async fn test_undercutting_edit_writes_nothing() {
    for (name, store) in stores().await {
        let org = user(store.as_ref(), "org").await;
        let pat = user(store.as_ref(), "pat").await;
        let (event_id, standard) = event_with_stock(store.as_ref(), &org, 50).await;
        store.reserve(pat.id, standard.id, 3).await.unwrap();

        let err = store
            .apply_event_edit(
                event_id,
                EventEdit {
                    fields: fields("Renamed"),
                    updates: vec![TicketTypeUpdate {
                        id: standard.id,
                        name: "Standard".to_string(),
                        price: standard.price,
                        total_quantity: 2,
                    }],
                    additions: vec![NewTicketType {
                        name: "Added".to_string(),
                        price: Decimal::new(1000, 2),
                        quantity: 10,
                    }],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)), "{name}: {err:?}");

        let event = store.find_event(event_id).await.unwrap().unwrap();
        assert_eq!(event.title, "Concert", "{name}");
        let tickets = store.list_ticket_types(event_id).await.unwrap();
        assert_eq!(tickets.len(), 1, "{name}");
        assert_eq!(tickets[0].total_quantity, 50, "{name}");
        assert_eq!(tickets[0].available_quantity, 47, "{name}");
    }
}

#[tokio::test]
async fn test_resize_moves_available_by_the_delta() {
    for (name, store) in stores().await {
        let org = user(store.as_ref(), "org").await;
        let pat = user(store.as_ref(), "pat").await;
        let (event_id, standard) = event_with_stock(store.as_ref(), &org, 50).await;
        store.reserve(pat.id, standard.id, 3).await.unwrap();

        let event = store
            .apply_event_edit(
                event_id,
                EventEdit {
                    fields: fields("Renamed"),
                    updates: vec![TicketTypeUpdate {
                        id: standard.id,
                        name: "Standard+".to_string(),
                        price: Decimal::new(3000, 2),
                        total_quantity: 40,
                    }],
                    additions: vec![],
                },
            )
            .await
            .unwrap();
        assert_eq!(event.title, "Renamed", "{name}");

        let resized = ticket(store.as_ref(), event_id).await;
        assert_eq!(resized.name, "Standard+", "{name}");
        assert_eq!(resized.total_quantity, 40, "{name}");
        assert_eq!(resized.available_quantity, 37, "{name}");
    }
}

#[tokio::test]
async fn test_new_intent_reuses_the_pending_payment_row() {
    for (name, store) in stores().await {
        let org = user(store.as_ref(), "org").await;
        let pat = user(store.as_ref(), "pat").await;
        let (_, standard) = event_with_stock(store.as_ref(), &org, 10).await;
        let reservation = store.reserve(pat.id, standard.id, 2).await.unwrap();
        let amount = Decimal::new(5000, 2);

        let pending = store.ensure_payment(reservation.id, amount).await.unwrap();
        let again = store.ensure_payment(reservation.id, amount).await.unwrap();
        assert_eq!(pending.id, again.id, "{name}");

        let first = store.attach_intent(reservation.id, amount, &intent()).await.unwrap();
        let fresh = intent();
        let second = store.attach_intent(reservation.id, amount, &fresh).await.unwrap();
        assert_eq!(first.id, pending.id, "{name}");
        assert_eq!(second.id, pending.id, "{name}");
        assert_eq!(second.intent_id.as_deref(), Some(fresh.id.as_str()), "{name}");
        assert_eq!(second.status, PaymentStatus::Pending, "{name}");
    }
}

#[tokio::test]
async fn test_redelivered_completion_changes_nothing() {
    for (name, store) in stores().await {
        let org = user(store.as_ref(), "org").await;
        let pat = user(store.as_ref(), "pat").await;
        let (_, standard) = event_with_stock(store.as_ref(), &org, 10).await;
        let reservation = store.reserve(pat.id, standard.id, 2).await.unwrap();
        let amount = Decimal::new(5000, 2);
        let paid = intent();
        store.attach_intent(reservation.id, amount, &paid).await.unwrap();

        let completed = store.complete_payment(&paid.id).await.unwrap();
        assert!(matches!(completed, PaymentCompletion::Completed(_)), "{name}");
        let details = store.find_reservation(reservation.id).await.unwrap().unwrap();
        assert_eq!(details.reservation.confirmation, Confirmation::Payment, "{name}");

        let again = store.complete_payment(&paid.id).await.unwrap();
        assert!(matches!(again, PaymentCompletion::AlreadyCompleted(_)), "{name}");

        let unknown = store.complete_payment(&intent().id).await.unwrap();
        assert!(matches!(unknown, PaymentCompletion::Unmatched), "{name}");

        let err = store
            .attach_intent(reservation.id, amount, &intent())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)), "{name}: {err:?}");

        // A manual confirmation never replaces the payment reason.
        let confirmed = store
            .confirm_reservation(reservation.id, Confirmation::Organizer)
            .await
            .unwrap();
        assert_eq!(confirmed.confirmation, Confirmation::Payment, "{name}");
    }
}

#[tokio::test]
async fn test_payment_for_a_missing_reservation_is_not_found() {
    for (name, store) in stores().await {
        let amount = Decimal::new(2500, 2);

        let err = store.ensure_payment(Uuid::new_v4(), amount).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{name}: {err:?}");

        let err = store
            .attach_intent(Uuid::new_v4(), amount, &intent())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)), "{name}: {err:?}");
    }
}

#[tokio::test]
async fn test_cancelled_reservation_takes_its_payment_along() {
    for (name, store) in stores().await {
        let org = user(store.as_ref(), "org").await;
        let pat = user(store.as_ref(), "pat").await;
        let (_, standard) = event_with_stock(store.as_ref(), &org, 10).await;
        let reservation = store.reserve(pat.id, standard.id, 1).await.unwrap();
        store
            .ensure_payment(reservation.id, Decimal::new(2500, 2))
            .await
            .unwrap();

        store.cancel_reservation(reservation.id).await.unwrap();
        let payment = store.find_payment_for_reservation(reservation.id).await.unwrap();
        assert!(payment.is_none(), "{name}");
    }
}
