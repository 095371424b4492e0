pub mod event;
pub mod payment;
pub mod reservation;
pub mod support;
pub mod ticket;
pub mod user;

pub use event::{
    Customization, Event, EventEdit, EventFields, EventFilter, EventSummary, NewEvent,
};
pub use payment::{Payment, PaymentCompletion, PaymentStatus};
pub use reservation::{Confirmation, Reservation, ReservationDetails};
pub use support::{NewSupportMessage, SupportMessage};
pub use ticket::{NewTicketType, TicketType, TicketTypeUpdate};
pub use user::{Capabilities, NewUser, Role, Session, User};
