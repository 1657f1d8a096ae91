//! Booking lifecycle.
//!
//! ```text
//!             ┌──► confirmed   (user pays, any time while pending)
//!   pending ──┼──► cancelled   (user cancels, before expires_at)
//!             └──► expired     (reconciler, after expires_at)
//! ```
//!
//! The table below is the reference for the guards written into the SQL of
//! [`super::models::booking`]. Every guarded `UPDATE` matches `status = 'pending'`,
//! which is exactly the set of states with outgoing edges.

use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "booking_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum BookingStatus {
    Pending,
    Confirmed,
    Cancelled,
    Expired,
}

impl BookingStatus {
    pub const ALL: [BookingStatus; 4] = [
        BookingStatus::Pending,
        BookingStatus::Confirmed,
        BookingStatus::Cancelled,
        BookingStatus::Expired,
    ];

    /// Whether `self -> next` is a legal edge.
    pub fn can_transition_to(self, next: BookingStatus) -> bool {
        matches!(
            (self, next),
            (
                BookingStatus::Pending,
                BookingStatus::Confirmed | BookingStatus::Cancelled | BookingStatus::Expired
            )
        )
    }

    pub fn is_terminal(self) -> bool {
        !matches!(self, BookingStatus::Pending)
    }

    /// A booking occupies one seat of its event while pending or confirmed.
    pub fn holds_seat(self) -> bool {
        matches!(self, BookingStatus::Pending | BookingStatus::Confirmed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            BookingStatus::Pending => "pending",
            BookingStatus::Confirmed => "confirmed",
            BookingStatus::Cancelled => "cancelled",
            BookingStatus::Expired => "expired",
        }
    }
}

impl fmt::Display for BookingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
