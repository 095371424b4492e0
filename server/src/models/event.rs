use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::ticket::{NewTicketType, TicketTypeUpdate};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub organizer_id: Uuid,
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub image: Option<String>,
    pub theme_color: Option<String>,
    pub banner_text: Option<String>,
    pub promo_message: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Case-insensitive substring match on title or location.
    pub fn matches_text(&self, needle: &str) -> bool {
        let needle = needle.to_lowercase();
        self.title.to_lowercase().contains(&needle)
            || self.location.to_lowercase().contains(&needle)
    }

    pub fn starts_on(&self, date: NaiveDate) -> bool {
        self.start_date.date_naive() == date
    }
}

/// An event row with its live ticket count, summed over its ticket types at read time.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct EventSummary {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub event: Event,
    pub available_tickets: i64,
}

/// Scalar fields an organizer sets on create and edit.
#[derive(Debug, Clone)]
pub struct EventFields {
    pub title: String,
    pub description: String,
    pub location: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub image: Option<String>,
}

#[derive(Debug, Clone)]
pub struct NewEvent {
    pub organizer_id: Uuid,
    pub fields: EventFields,
}

/// Everything one submission of the edit form changes, applied as a unit.
#[derive(Debug, Clone)]
pub struct EventEdit {
    pub fields: EventFields,
    /// Existing ticket types to rename, reprice and resize.
    pub updates: Vec<TicketTypeUpdate>,
    pub additions: Vec<NewTicketType>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Customization {
    pub theme_color: Option<String>,
    pub banner_text: Option<String>,
    pub promo_message: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    pub text: Option<String>,
    pub date: Option<NaiveDate>,
}

impl EventFilter {
    pub fn matches(&self, event: &Event) -> bool {
        self.text.as_deref().map_or(true, |t| event.matches_text(t))
            && self.date.map_or(true, |d| event.starts_on(d))
    }
}
