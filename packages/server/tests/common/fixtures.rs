//! Test fixtures for creating test data.

use anyhow::Result;
use booking_core::domains::bookings::BookingService;
use booking_core::domains::events::{Event, NewEvent};
use booking_core::domains::users::User;
use chrono::{Duration, Utc};
use sqlx::PgPool;
use uuid::Uuid;

/// Create a user with a unique email derived from `name`
pub async fn create_test_user(pool: &PgPool, name: &str) -> Result<User> {
    let email = format!("{}-{}@example.com", name, Uuid::new_v4().simple());
    Ok(User::create(&email, name, None, pool).await?)
}

/// Create an event next week with `seats` seats and the given reservation window
pub async fn create_test_event(
    service: &BookingService,
    seats: i32,
    ttl: Duration,
) -> Result<Event> {
    let new = NewEvent::builder()
        .title(format!("Event {}", Uuid::new_v4().simple()))
        .date(Utc::now() + Duration::days(7))
        .total_seats(seats)
        .booking_ttl(ttl)
        .build();

    Ok(service.create_event(new).await?)
}

/// Current seat counter straight from the table
pub async fn available_seats(pool: &PgPool, event: &Event) -> Result<i32> {
    let seats = sqlx::query_scalar::<_, i32>("SELECT available_seats FROM events WHERE id = $1")
        .bind(event.id)
        .fetch_one(pool)
        .await?;
    Ok(seats)
}
