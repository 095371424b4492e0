use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// `failed` exists in the schema but nothing transitions into it yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "payment_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Completed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Payment {
    pub id: Uuid,
    pub reservation_id: Uuid,
    pub amount: Decimal,
    pub status: PaymentStatus,
    pub intent_id: Option<String>,
    pub client_secret: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_completed(&self) -> bool {
        self.status == PaymentStatus::Completed
    }
}

/// What applying a "payment succeeded" notification did.
#[derive(Debug, Clone)]
pub enum PaymentCompletion {
    /// pending -> completed, reservation confirmed.
    Completed(Payment),
    /// Redelivery for a payment that was already completed; nothing changed.
    AlreadyCompleted(Payment),
    /// No payment carries that intent id.
    Unmatched,
}
