// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// Booking rules live in domains/bookings and use these traits.
//
// Naming convention: Base* for trait names (e.g., BaseClock, BaseNotifier)

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

// =============================================================================
// Clock Trait (Infrastructure)
// =============================================================================

/// Source of "now" for deadlines and expiry checks.
///
/// The instant is bound into SQL rather than using `NOW()`, so tests can move
/// time forward without sleeping.
pub trait BaseClock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

// =============================================================================
// Notification Trait (Infrastructure - email or any other channel)
// =============================================================================

#[async_trait]
pub trait BaseNotifier: Send + Sync {
    /// Deliver `message` to `recipient` (an email address)
    async fn send(&self, recipient: &str, message: &str) -> Result<()>;
}
