use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{self, events, payments, reservations, support, users};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let cors = create_cors_layer(&state.config.cors_allowed_origins, state.config.production);
    let security_headers = create_security_headers_layer(state.config.production);

    Router::new()
        .route("/", get(handlers::home))
        .route("/health", get(handlers::health_check))
        .route(
            "/contact",
            get(support::list_messages).post(support::contact),
        )
        .nest("/events", event_routes())
        .nest("/users", user_routes())
        .layer(security_headers)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route("/list", get(events::list_events))
        .route("/create", post(events::create_event))
        .route(
            "/edit/:id",
            get(events::edit_form).post(events::edit_event),
        )
        .route("/my-events", get(events::my_events))
        .route("/my-tickets", get(reservations::my_tickets))
        .route(
            "/my-reservations",
            get(reservations::my_reservations).post(reservations::cancel_reservation),
        )
        .route("/payment/success", get(payments::payment_success))
        .route("/payment/cancel", get(payments::payment_cancel))
        .route("/payment/:id", get(payments::payment_page))
        .route("/payment/create-intent/:id", post(payments::create_intent))
        .route("/webhook", post(payments::webhook))
        .route("/webhook/", post(payments::webhook))
        .route(
            "/:id",
            get(events::event_detail).post(reservations::reserve),
        )
        .route(
            "/:id/tickets",
            get(reservations::event_reservations).post(reservations::manage_reservation),
        )
        .route(
            "/:id/customize",
            get(events::customize_form).post(events::customize_event),
        )
}

fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/profile", get(users::profile))
        .route("/logout", get(users::logout))
}
