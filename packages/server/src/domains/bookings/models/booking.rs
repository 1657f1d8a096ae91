use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgExecutor;

use crate::common::{BookingId, EventId, UserId};
use crate::domains::bookings::status::BookingStatus;

/// Booking model - SQL persistence layer
///
/// Every status change below is a single `UPDATE ... WHERE status = 'pending'`.
/// The guard and the write are one statement, so a booking can leave pending
/// at most once no matter how many callers race for it.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct Booking {
    pub id: BookingId,
    pub event_id: EventId,
    pub user_id: UserId,
    pub status: BookingStatus,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A booking moved to `expired` by a reconciliation pass.
#[derive(sqlx::FromRow, Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ExpiredBooking {
    pub id: BookingId,
    pub event_id: EventId,
    pub user_id: UserId,
}

impl Booking {
    /// Insert a pending booking. Caller must already hold the seat.
    pub async fn insert_pending<'e>(
        event_id: EventId,
        user_id: UserId,
        expires_at: DateTime<Utc>,
        now: DateTime<Utc>,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO bookings (id, event_id, user_id, status, expires_at, created_at, updated_at)
             VALUES ($1, $2, $3, 'pending', $4, $5, $5)
             RETURNING *",
        )
        .bind(BookingId::new())
        .bind(event_id)
        .bind(user_id)
        .bind(expires_at)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// Find booking by ID
    pub async fn find_by_id<'e>(
        id: BookingId,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(executor)
            .await
    }

    /// pending -> confirmed, only for the owning user on the given event.
    ///
    /// Returns `None` when nothing matched (unknown, not owned, or no longer pending).
    pub async fn confirm<'e>(
        id: BookingId,
        event_id: EventId,
        user_id: UserId,
        now: DateTime<Utc>,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE bookings
             SET status = 'confirmed',
                 updated_at = $4
             WHERE id = $1
               AND event_id = $2
               AND user_id = $3
               AND status = 'pending'
             RETURNING *",
        )
        .bind(id)
        .bind(event_id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// pending -> cancelled, only while the deadline is still ahead.
    ///
    /// `expires_at > now` keeps this edge disjoint from expiry, which requires
    /// `expires_at < now`. The seat is released by the caller in the same
    /// transaction.
    pub async fn cancel_before_deadline<'e>(
        id: BookingId,
        event_id: EventId,
        user_id: UserId,
        now: DateTime<Utc>,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>(
            "UPDATE bookings
             SET status = 'cancelled',
                 updated_at = $4
             WHERE id = $1
               AND event_id = $2
               AND user_id = $3
               AND status = 'pending'
               AND expires_at > $4
             RETURNING *",
        )
        .bind(id)
        .bind(event_id)
        .bind(user_id)
        .bind(now)
        .fetch_optional(executor)
        .await
    }

    /// Expire every overdue pending booking and release its seat, in one statement.
    ///
    /// Both updates run inside a single data-modifying CTE, so the set of rows
    /// expired and the seats given back can never disagree. A booking already
    /// moved out of pending by a concurrent cancel or reconciliation no longer
    /// matches after the row lock is released and is skipped.
    pub async fn expire_overdue<'e>(
        now: DateTime<Utc>,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Vec<ExpiredBooking>> {
        sqlx::query_as::<_, ExpiredBooking>(
            "WITH expired AS (
                UPDATE bookings
                SET status = 'expired',
                    updated_at = $1
                WHERE status = 'pending'
                  AND expires_at < $1
                RETURNING id, event_id, user_id
             ),
             released AS (
                UPDATE events e
                SET available_seats = e.available_seats + per_event.seats,
                    updated_at = $1
                FROM (
                    SELECT event_id, COUNT(*)::INTEGER AS seats
                    FROM expired
                    GROUP BY event_id
                ) per_event
                WHERE e.id = per_event.event_id
                RETURNING e.id
             )
             SELECT id, event_id, user_id
             FROM expired
             ORDER BY id",
        )
        .bind(now)
        .fetch_all(executor)
        .await
    }

    /// One page of overdue pending bookings, keyset-paginated by id.
    pub async fn find_overdue_pending_page<'e>(
        now: DateTime<Utc>,
        after: Option<BookingId>,
        limit: i64,
        executor: impl PgExecutor<'e>,
    ) -> sqlx::Result<Vec<Self>> {
        sqlx::query_as::<_, Self>(
            "SELECT * FROM bookings
             WHERE status = 'pending'
               AND expires_at < $1
               AND ($2::UUID IS NULL OR id > $2)
             ORDER BY id
             LIMIT $3",
        )
        .bind(now)
        .bind(after)
        .bind(limit)
        .fetch_all(executor)
        .await
    }
}
