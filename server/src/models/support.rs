use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SupportMessage {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub message: String,
    pub response: Option<String>,
    pub is_support: bool,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewSupportMessage {
    pub name: String,
    pub email: String,
    pub message: String,
}
