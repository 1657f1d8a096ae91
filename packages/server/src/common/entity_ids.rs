//! Typed ID definitions for the booking domain.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for events (things with seats).
pub struct Event;

/// Marker type for bookings (a seat held by a user).
pub struct Booking;

/// Marker type for users.
pub struct User;

// ============================================================================
// Type aliases
// ============================================================================

pub type EventId = Id<Event>;

pub type BookingId = Id<Booking>;

pub type UserId = Id<User>;
