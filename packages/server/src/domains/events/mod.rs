//! Events: the seat inventory an organizer publishes.

pub mod models;

pub use models::{default_booking_ttl, max_booking_ttl, Event, NewEvent, SeatAudit};
