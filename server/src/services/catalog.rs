use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::{optional, required};
use crate::auth::{authorize, Permission};
use crate::models::{
    Customization, Event, EventEdit, EventFields, EventFilter, EventSummary, NewEvent,
    NewTicketType, TicketType, TicketTypeUpdate, User,
};
use crate::store::Store;
use crate::utils::AppError;

const HOME_FEED_SIZE: i64 = 3;

/// Event form as submitted on create and edit. Every field is optional at
/// this level so missing input can be reported as a validation error.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventForm {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub image: Option<String>,
    #[serde(default)]
    pub tickets: Vec<TicketRow>,
}

/// One row of the ticket sub-form. `ticket_id` is only meaningful on edit.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TicketRow {
    pub ticket_id: Option<Uuid>,
    pub name: Option<String>,
    pub price: Option<Decimal>,
    pub quantity: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventQuery {
    pub q: Option<String>,
    pub date: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EventDetail {
    #[serde(flatten)]
    pub event: Event,
    pub ticket_types: Vec<TicketType>,
    pub available_tickets: i64,
}

/// Sum of the remaining stock over an event's ticket types.
pub fn available_tickets(ticket_types: &[TicketType]) -> i64 {
    ticket_types
        .iter()
        .map(|t| i64::from(t.available_quantity))
        .sum()
}

/// Accepts RFC 3339 or the `datetime-local` form shape, which is read as UTC.
pub fn parse_timestamp(raw: &str, field: &str) -> Result<DateTime<Utc>, AppError> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .map(|naive| naive.and_utc())
        .ok_or_else(|| AppError::ValidationError(format!("{field} is not a valid date and time")))
}

fn event_fields(form: &EventForm) -> Result<EventFields, AppError> {
    let title = required(form.title.clone(), "title")?;
    let description = required(form.description.clone(), "description")?;
    let location = required(form.location.clone(), "location")?;
    let start_date = parse_timestamp(&required(form.start_date.clone(), "start_date")?, "start_date")?;
    let end_date = parse_timestamp(&required(form.end_date.clone(), "end_date")?, "end_date")?;

    if end_date < start_date {
        return Err(AppError::ValidationError(
            "end_date cannot be before start_date".to_string(),
        ));
    }

    Ok(EventFields {
        title,
        description,
        location,
        start_date,
        end_date,
        image: optional(form.image.clone()),
    })
}

/// `None` for rows missing a name, price or quantity; those are skipped.
fn complete_row(row: &TicketRow) -> Result<Option<NewTicketType>, AppError> {
    let (Some(name), Some(price), Some(quantity)) =
        (optional(row.name.clone()), row.price, row.quantity)
    else {
        return Ok(None);
    };

    if price.is_sign_negative() {
        return Err(AppError::ValidationError(format!(
            "price for '{name}' cannot be negative"
        )));
    }
    if quantity < 0 {
        return Err(AppError::ValidationError(format!(
            "quantity for '{name}' cannot be negative"
        )));
    }

    Ok(Some(NewTicketType {
        name,
        price: price.round_dp(2),
        quantity,
    }))
}

async fn detail(store: &dyn Store, event: Event) -> Result<EventDetail, AppError> {
    let ticket_types = store.list_ticket_types(event.id).await?;
    Ok(EventDetail {
        available_tickets: available_tickets(&ticket_types),
        event,
        ticket_types,
    })
}

/// The event, provided `user` organizes it. Anyone else's event is reported
/// as missing rather than forbidden.
pub async fn owned_event(store: &dyn Store, user: &User, event_id: Uuid) -> Result<Event, AppError> {
    authorize(user, Permission::ManageEvents)?;
    store
        .find_event(event_id)
        .await?
        .filter(|event| event.organizer_id == user.id)
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))
}

pub async fn create_event(
    store: &dyn Store,
    organizer: &User,
    form: EventForm,
) -> Result<EventDetail, AppError> {
    authorize(organizer, Permission::ManageEvents)?;
    let fields = event_fields(&form)?;

    let mut tickets = Vec::new();
    for row in &form.tickets {
        if let Some(ticket) = complete_row(row)? {
            tickets.push(ticket);
        }
    }

    let event = store
        .insert_event(
            NewEvent {
                organizer_id: organizer.id,
                fields,
            },
            tickets,
        )
        .await?;

    info!(event_id = %event.id, organizer_id = %organizer.id, "Event created");
    detail(store, event).await
}

/// Updates the scalar fields, resizes existing ticket types and adds rows
/// without an id as new ticket types. Resizing keeps reserved units.
pub async fn edit_event(
    store: &dyn Store,
    organizer: &User,
    event_id: Uuid,
    form: EventForm,
) -> Result<EventDetail, AppError> {
    owned_event(store, organizer, event_id).await?;
    let fields = event_fields(&form)?;

    let mut updates = Vec::new();
    let mut additions = Vec::new();
    for row in &form.tickets {
        let Some(ticket) = complete_row(row)? else {
            continue;
        };
        match row.ticket_id {
            Some(id) => updates.push(TicketTypeUpdate {
                id,
                name: ticket.name,
                price: ticket.price,
                total_quantity: ticket.quantity,
            }),
            None => additions.push(ticket),
        }
    }

    let resized = updates.len();
    let event = store
        .apply_event_edit(
            event_id,
            EventEdit {
                fields,
                updates,
                additions,
            },
        )
        .await?;

    info!(event_id = %event.id, resized, "Event updated");
    detail(store, event).await
}

pub async fn event_detail(store: &dyn Store, event_id: Uuid) -> Result<EventDetail, AppError> {
    let event = store
        .find_event(event_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Event not found".to_string()))?;
    detail(store, event).await
}

/// The ticket type, provided it is sold under `event_id`.
pub async fn ticket_of_event(
    store: &dyn Store,
    event_id: Uuid,
    ticket_type_id: Uuid,
) -> Result<TicketType, AppError> {
    store
        .list_ticket_types(event_id)
        .await?
        .into_iter()
        .find(|t| t.id == ticket_type_id)
        .ok_or_else(|| AppError::NotFound("Ticket type not found for this event".to_string()))
}

pub async fn list_events(
    store: &dyn Store,
    query: EventQuery,
) -> Result<Vec<EventSummary>, AppError> {
    let date = optional(query.date)
        .map(|raw| {
            NaiveDate::parse_from_str(&raw, "%Y-%m-%d")
                .map_err(|_| AppError::ValidationError("date must look like YYYY-MM-DD".to_string()))
        })
        .transpose()?;

    let filter = EventFilter {
        text: optional(query.q),
        date,
    };
    store.list_events(&filter).await
}

pub async fn home_feed(store: &dyn Store) -> Result<Vec<EventSummary>, AppError> {
    store.latest_events(HOME_FEED_SIZE).await
}

pub async fn organizer_events(
    store: &dyn Store,
    organizer: &User,
) -> Result<Vec<EventSummary>, AppError> {
    authorize(organizer, Permission::ManageEvents)?;
    store.list_events_by_organizer(organizer.id).await
}

fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

pub async fn customize_event(
    store: &dyn Store,
    organizer: &User,
    event_id: Uuid,
    form: Customization,
) -> Result<Event, AppError> {
    owned_event(store, organizer, event_id).await?;

    let customization = Customization {
        theme_color: optional(form.theme_color),
        banner_text: optional(form.banner_text),
        promo_message: optional(form.promo_message),
    };
    if let Some(color) = &customization.theme_color {
        if !is_hex_color(color) {
            return Err(AppError::ValidationError(
                "theme_color must look like #rrggbb".to_string(),
            ));
        }
    }

    let event = store.update_customization(event_id, customization).await?;
    info!(event_id = %event.id, "Event customized");
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Role;
    use crate::services::reservations;
    use crate::services::testing::{concert, event_form, store, ticket_row, user};

    #[test]
    fn test_timestamp_formats() {
        let a = parse_timestamp("2026-06-01T19:00", "start").unwrap();
        let b = parse_timestamp("2026-06-01T19:00:00Z", "start").unwrap();
        let c = parse_timestamp("2026-06-01T21:00:00+02:00", "start").unwrap();
        assert_eq!(a, b);
        assert_eq!(b, c);
        assert!(parse_timestamp("next friday", "start").is_err());
    }

    #[tokio::test]
    async fn test_create_event_seeds_stock_and_skips_incomplete_rows() {
        let store = store();
        let org = user(store.as_ref(), "org", Role::Organizer).await;
        let mut rows = vec![
            ticket_row("VIP", Decimal::new(10000, 2), 10),
            ticket_row("Standard", Decimal::new(2500, 2), 50),
        ];
        rows.push(TicketRow {
            ticket_id: None,
            name: Some("Half".into()),
            price: None,
            quantity: Some(5),
        });
        rows.push(TicketRow {
            name: Some("   ".into()),
            price: Some(Decimal::ONE),
            quantity: Some(1),
            ..Default::default()
        });

        let detail = create_event(store.as_ref(), &org, event_form("Gala", rows))
            .await
            .unwrap();

        assert_eq!(detail.ticket_types.len(), 2);
        assert_eq!(detail.available_tickets, 60);
        for t in &detail.ticket_types {
            assert_eq!(t.total_quantity, t.available_quantity);
        }
        assert_eq!(detail.event.organizer_id, org.id);
    }

    #[tokio::test]
    async fn test_create_event_requires_organizer_and_fields() {
        let store = store();
        let participant = user(store.as_ref(), "pat", Role::Participant).await;
        let org = user(store.as_ref(), "org", Role::Organizer).await;

        let err = create_event(store.as_ref(), &participant, event_form("Gala", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Forbidden(_)));

        let mut form = event_form("Gala", vec![]);
        form.location = None;
        let err = create_event(store.as_ref(), &org, form).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let mut form = event_form("Gala", vec![]);
        form.start_date = Some("tomorrow".into());
        assert!(create_event(store.as_ref(), &org, form).await.is_err());

        let mut form = event_form("Gala", vec![]);
        form.end_date = Some("2026-05-01T10:00".into());
        assert!(create_event(store.as_ref(), &org, form).await.is_err());

        let form = event_form("Gala", vec![ticket_row("Bad", Decimal::new(-1, 0), 3)]);
        assert!(create_event(store.as_ref(), &org, form).await.is_err());
    }

    #[tokio::test]
    async fn test_edit_resizes_without_discarding_reservations() {
        let store = store();
        let org = user(store.as_ref(), "org", Role::Organizer).await;
        let pat = user(store.as_ref(), "pat", Role::Participant).await;
        let event = concert(store.as_ref(), &org).await;
        let ticket = &event.ticket_types[0];

        reservations::reserve(store.as_ref(), &pat, ticket.id, 3).await.unwrap();

        let mut row = ticket_row("Standard+", Decimal::new(3000, 2), 40);
        row.ticket_id = Some(ticket.id);
        let edited = edit_event(store.as_ref(), &org, event.event.id, event_form("Concert II", vec![row]))
            .await
            .unwrap();

        let resized = &edited.ticket_types[0];
        assert_eq!(edited.event.title, "Concert II");
        assert_eq!(resized.name, "Standard+");
        assert_eq!(resized.total_quantity, 40);
        assert_eq!(resized.available_quantity, 37);

        let mut undercut = ticket_row("Standard+", Decimal::new(3000, 2), 2);
        undercut.ticket_id = Some(ticket.id);
        let err = edit_event(store.as_ref(), &org, event.event.id, event_form("Concert II", vec![undercut]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn test_rejected_edit_leaves_event_and_tickets_untouched() {
        let store = store();
        let org = user(store.as_ref(), "org", Role::Organizer).await;
        let pat = user(store.as_ref(), "pat", Role::Participant).await;
        let event = concert(store.as_ref(), &org).await;
        let ticket = &event.ticket_types[0];

        reservations::reserve(store.as_ref(), &pat, ticket.id, 3).await.unwrap();

        let mut undercut = ticket_row("Standard", Decimal::new(2500, 2), 2);
        undercut.ticket_id = Some(ticket.id);
        let added = ticket_row("Added", Decimal::new(1000, 2), 10);
        let err = edit_event(
            store.as_ref(),
            &org,
            event.event.id,
            event_form("Renamed", vec![undercut, added]),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));

        let unchanged = event_detail(store.as_ref(), event.event.id).await.unwrap();
        assert_eq!(unchanged.event.title, "Concert");
        assert_eq!(unchanged.ticket_types.len(), 1);
        assert_eq!(unchanged.ticket_types[0].total_quantity, 50);
        assert_eq!(unchanged.ticket_types[0].available_quantity, 47);
        assert!(unchanged.ticket_types.iter().all(|t| t.name != "Added"));
    }

    #[tokio::test]
    async fn test_edit_adds_new_rows_and_rejects_foreign_ticket_ids() {
        let store = store();
        let org = user(store.as_ref(), "org", Role::Organizer).await;
        let event = concert(store.as_ref(), &org).await;
        let other = concert(store.as_ref(), &org).await;

        let detail = edit_event(
            store.as_ref(),
            &org,
            event.event.id,
            event_form("Concert", vec![ticket_row("Balcony", Decimal::new(1500, 2), 20)]),
        )
        .await
        .unwrap();
        assert_eq!(detail.ticket_types.len(), 2);
        assert_eq!(detail.available_tickets, 70);

        let mut foreign = ticket_row("Standard", Decimal::new(2500, 2), 10);
        foreign.ticket_id = Some(other.ticket_types[0].id);
        let err = edit_event(store.as_ref(), &org, event.event.id, event_form("Hijack", vec![foreign]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        // Nothing was written by the rejected edit.
        let unchanged = event_detail(store.as_ref(), event.event.id).await.unwrap();
        assert_eq!(unchanged.event.title, "Concert");
    }

    #[tokio::test]
    async fn test_other_organizers_events_look_absent() {
        let store = store();
        let owner = user(store.as_ref(), "owner", Role::Organizer).await;
        let rival = user(store.as_ref(), "rival", Role::Organizer).await;
        let event = concert(store.as_ref(), &owner).await;

        let err = edit_event(store.as_ref(), &rival, event.event.id, event_form("Mine", vec![]))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));

        let err = customize_event(store.as_ref(), &rival, event.event.id, Customization::default())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_listing_filters_and_orders() {
        let store = store();
        let org = user(store.as_ref(), "org", Role::Organizer).await;
        let mut late = event_form("Rock in the Park", vec![]);
        late.start_date = Some("2026-07-10T18:00".into());
        late.end_date = Some("2026-07-10T23:00".into());
        let mut early = event_form("Jazz Evening", vec![]);
        early.location = Some("Iasi".into());
        early.start_date = Some("2026-05-02T18:00".into());
        early.end_date = Some("2026-05-02T22:00".into());
        create_event(store.as_ref(), &org, late).await.unwrap();
        create_event(store.as_ref(), &org, early).await.unwrap();

        let all = list_events(store.as_ref(), EventQuery::default()).await.unwrap();
        let titles: Vec<_> = all.iter().map(|e| e.event.title.as_str()).collect();
        assert_eq!(titles, ["Jazz Evening", "Rock in the Park"]);

        let by_place = list_events(
            store.as_ref(),
            EventQuery {
                q: Some("iAsI".into()),
                date: None,
            },
        )
        .await
        .unwrap();
        assert_eq!(by_place.len(), 1);

        let by_day = list_events(
            store.as_ref(),
            EventQuery {
                q: Some("".into()),
                date: Some("2026-07-10".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(by_day[0].event.title, "Rock in the Park");

        let bad = list_events(
            store.as_ref(),
            EventQuery {
                q: None,
                date: Some("10/07/2026".into()),
            },
        )
        .await;
        assert!(matches!(bad, Err(AppError::ValidationError(_))));

        let feed = home_feed(store.as_ref()).await.unwrap();
        assert_eq!(feed[0].event.title, "Rock in the Park");
    }

    #[tokio::test]
    async fn test_customization_validates_color_and_clears_blanks() {
        let store = store();
        let org = user(store.as_ref(), "org", Role::Organizer).await;
        let event = concert(store.as_ref(), &org).await;

        let updated = customize_event(
            store.as_ref(),
            &org,
            event.event.id,
            Customization {
                theme_color: Some("#1a2B3c".into()),
                banner_text: Some("Last tickets!".into()),
                promo_message: Some("  ".into()),
            },
        )
        .await
        .unwrap();
        assert_eq!(updated.theme_color.as_deref(), Some("#1a2B3c"));
        assert_eq!(updated.banner_text.as_deref(), Some("Last tickets!"));
        assert!(updated.promo_message.is_none());

        let err = customize_event(
            store.as_ref(),
            &org,
            event.event.id,
            Customization {
                theme_color: Some("red".into()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }
}
