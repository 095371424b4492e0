use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub is_participant: bool,
    pub is_organizer: bool,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn capabilities(&self) -> Capabilities {
        Capabilities {
            participant: self.is_participant,
            organizer: self.is_organizer,
        }
    }
}

/// Independent capability flags; a user may hold both, one or neither.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    pub participant: bool,
    pub organizer: bool,
}

/// Role picked at registration. Each role sets exactly one capability flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Participant,
    Organizer,
}

impl Role {
    pub fn capabilities(self) -> Capabilities {
        match self {
            Role::Participant => Capabilities {
                participant: true,
                organizer: false,
            },
            Role::Organizer => Capabilities {
                participant: false,
                organizer: true,
            },
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub capabilities: Capabilities,
}

#[derive(Debug, Clone, FromRow)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}
