use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use sqlx::PgExecutor;
use typed_builder::TypedBuilder;

use crate::common::EventId;

/// Reservation window used when an organizer does not pick one.
pub fn default_booking_ttl() -> Duration {
    Duration::minutes(30)
}

/// Longest reservation window an event may ask for.
pub fn max_booking_ttl() -> Duration {
    Duration::days(365)
}

/// Event model - SQL persistence layer
///
/// `available_seats` is only ever changed by guarded single-statement updates
/// (see `take_seat` / `release_seat` and the booking reconciler), never by a
/// read-modify-write from Rust.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Event {
    pub id: EventId,
    pub title: String,
    pub date: DateTime<Utc>,
    pub total_seats: i32,
    pub available_seats: i32,
    pub booking_ttl_seconds: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Organizer input for a new event.
#[derive(Debug, Clone, TypedBuilder)]
#[builder(field_defaults(setter(into)))]
pub struct NewEvent {
    pub title: String,
    pub date: DateTime<Utc>,
    pub total_seats: i32,
    /// Defaults to `total_seats`.
    #[builder(default, setter(strip_option))]
    pub available_seats: Option<i32>,
    #[builder(default = default_booking_ttl())]
    pub booking_ttl: Duration,
}

impl NewEvent {
    pub fn available_seats(&self) -> i32 {
        self.available_seats.unwrap_or(self.total_seats)
    }

    /// Checks the seat bounds the `events` table enforces, plus a usable title and TTL.
    pub fn validate(&self) -> Result<(), String> {
        if self.title.trim().is_empty() {
            return Err("title must not be empty".to_string());
        }
        if self.total_seats <= 0 {
            return Err("total_seats must be positive".to_string());
        }
        let available = self.available_seats();
        if available < 0 {
            return Err("available_seats must not be negative".to_string());
        }
        if available > self.total_seats {
            return Err(format!(
                "available_seats ({}) exceeds total_seats ({})",
                available, self.total_seats
            ));
        }
        if self.booking_ttl.num_seconds() <= 0 {
            return Err("booking_ttl must be at least one second".to_string());
        }
        if self.booking_ttl > max_booking_ttl() {
            return Err(format!(
                "booking_ttl must not exceed {} days",
                max_booking_ttl().num_days()
            ));
        }
        Ok(())
    }
}

impl Event {
    /// Insert a new event
    pub async fn insert<'e>(
        new: &NewEvent,
        now: DateTime<Utc>,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO events (
                id,
                title,
                date,
                total_seats,
                available_seats,
                booking_ttl_seconds,
                created_at,
                updated_at
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING *",
        )
        .bind(EventId::new())
        .bind(new.title.trim())
        .bind(new.date)
        .bind(new.total_seats)
        .bind(new.available_seats())
        .bind(new.booking_ttl.num_seconds())
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Find event by ID
    pub async fn find_by_id<'e>(
        id: EventId,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// List events by start time
    pub async fn find_page<'e>(
        limit: i64,
        offset: i64,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM events
             ORDER BY date ASC, id ASC
             LIMIT $1 OFFSET $2",
        )
        .bind(limit)
        .bind(offset)
        .fetch_all(executor)
        .await
    }

    pub async fn exists<'e>(id: EventId, executor: impl PgExecutor<'e>) -> sqlx::Result<bool> {
        sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM events WHERE id = $1)")
            .bind(id)
            .fetch_one(executor)
            .await
    }

    /// Take one seat if any is left.
    ///
    /// The `available_seats > 0` guard lives in the same statement as the
    /// decrement, so concurrent callers serialize on the row lock and only as
    /// many succeed as there were seats. Returns the event's booking TTL in
    /// seconds on success, `None` when the event is full or missing.
    pub async fn take_seat<'e>(
        id: EventId,
        now: DateTime<Utc>,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Option<i64>> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE events
             SET available_seats = available_seats - 1,
                 updated_at = $2
             WHERE id = $1
               AND available_seats > 0
             RETURNING booking_ttl_seconds",
        )
        .bind(id)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// Give one seat back. Only called in the transaction that moved a booking out of pending.
    pub async fn release_seat<'e>(
        id: EventId,
        now: DateTime<Utc>,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<u64> {
        let result = sqlx::query(
            "UPDATE events
             SET available_seats = available_seats + 1,
                 updated_at = $2
             WHERE id = $1",
        )
        .bind(id)
        .bind(now)
        .execute(executor)
        .await?;

        Ok(result.rows_affected())
    }

    /// Events whose counter disagrees with their live bookings.
    ///
    /// Should always be empty; used by the audit command and the test suite.
    pub async fn find_inconsistent<'e>(
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Vec<SeatAudit>> {
        sqlx::query_as::<_, SeatAudit>(
            "SELECT e.id AS event_id,
                    e.total_seats,
                    e.available_seats,
                    COUNT(b.id) AS held_seats
             FROM events e
             LEFT JOIN bookings b
               ON b.event_id = e.id
              AND b.status IN ('pending', 'confirmed')
             GROUP BY e.id
             HAVING e.available_seats + COUNT(b.id) <> e.total_seats",
        )
        .fetch_all(executor)
        .await
    }
}

/// Seat accounting for one event.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct SeatAudit {
    pub event_id: EventId,
    pub total_seats: i32,
    pub available_seats: i32,
    pub held_seats: i64,
}
