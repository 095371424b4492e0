use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TicketType {
    pub id: Uuid,
    pub event_id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub total_quantity: i32,
    pub available_quantity: i32,
}

impl TicketType {
    /// Units currently held by reservations.
    pub fn reserved_quantity(&self) -> i32 {
        self.total_quantity - self.available_quantity
    }

    /// Available count after resizing the stock to `new_total`, keeping every
    /// reserved unit. `None` when the new total would undercut reservations.
    pub fn resized_available(&self, new_total: i32) -> Option<i32> {
        let reserved = self.reserved_quantity();
        (new_total >= reserved).then(|| new_total - reserved)
    }

    /// Available count after returning `quantity` units, never above the total.
    pub fn restocked_available(&self, quantity: i32) -> i32 {
        (self.available_quantity + quantity).min(self.total_quantity)
    }
}

#[derive(Debug, Clone)]
pub struct NewTicketType {
    pub name: String,
    pub price: Decimal,
    pub quantity: i32,
}

#[derive(Debug, Clone)]
pub struct TicketTypeUpdate {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub total_quantity: i32,
}
