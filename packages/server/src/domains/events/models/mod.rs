pub mod event;

pub use event::{default_booking_ttl, max_booking_ttl, Event, NewEvent, SeatAudit};
