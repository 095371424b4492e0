use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::ser::{Serialize, SerializeStruct, Serializer};
use serde::Deserialize;
use sqlx::FromRow;
use uuid::Uuid;

/// Why a reservation counts as confirmed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "reservation_confirmation", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Confirmation {
    Unconfirmed,
    /// The payment gateway reported a completed payment.
    Payment,
    /// The event's organizer confirmed it by hand.
    Organizer,
}

impl Confirmation {
    pub fn is_confirmed(self) -> bool {
        !matches!(self, Confirmation::Unconfirmed)
    }

    /// Result of confirming again with `by`. A payment confirmation is never
    /// replaced by a manual one.
    pub fn merge(self, by: Confirmation) -> Confirmation {
        match (self, by) {
            (_, Confirmation::Payment) => Confirmation::Payment,
            (Confirmation::Unconfirmed, other) => other,
            (current, _) => current,
        }
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct Reservation {
    pub id: Uuid,
    pub user_id: Uuid,
    pub ticket_type_id: Uuid,
    pub quantity: i32,
    pub confirmation: Confirmation,
    pub created_at: DateTime<Utc>,
}

impl Reservation {
    pub fn confirmed(&self) -> bool {
        self.confirmation.is_confirmed()
    }
}

impl Serialize for Reservation {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Reservation", 7)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("user_id", &self.user_id)?;
        s.serialize_field("ticket_type_id", &self.ticket_type_id)?;
        s.serialize_field("quantity", &self.quantity)?;
        s.serialize_field("confirmed", &self.confirmed())?;
        s.serialize_field("confirmation", &self.confirmation)?;
        s.serialize_field("created_at", &self.created_at)?;
        s.end()
    }
}

/// A reservation joined with its ticket type and event, as listings show it.
#[derive(Debug, Clone, serde::Serialize, FromRow)]
pub struct ReservationDetails {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub reservation: Reservation,
    pub ticket_name: String,
    pub unit_price: Decimal,
    pub event_id: Uuid,
    pub event_title: String,
    pub organizer_id: Uuid,
}

impl ReservationDetails {
    pub fn total_price(&self) -> Decimal {
        self.unit_price * Decimal::from(self.reservation.quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_confirmation_wins_over_manual() {
        use Confirmation::*;
        assert_eq!(Unconfirmed.merge(Organizer), Organizer);
        assert_eq!(Organizer.merge(Organizer), Organizer);
        assert_eq!(Payment.merge(Organizer), Payment);
        assert_eq!(Organizer.merge(Payment), Payment);
        assert!(!Unconfirmed.is_confirmed());
    }

    #[test]
    fn test_serialized_reservation_carries_derived_flag() {
        let r = Reservation {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            ticket_type_id: Uuid::new_v4(),
            quantity: 3,
            confirmation: Confirmation::Organizer,
            created_at: Utc::now(),
        };
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["confirmed"], true);
        assert_eq!(json["confirmation"], "organizer");
        assert_eq!(json["quantity"], 3);
    }
}
