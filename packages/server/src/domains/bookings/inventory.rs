//! Inventory store: the only place seat counts and booking states change.
//!
//! Every operation is one transaction (or one statement). Guards are part of
//! the `WHERE` clause of the write they protect, and the affected-row count
//! decides the outcome, so nothing here reads a value and then acts on it.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};
use sqlx::PgPool;
use tracing::{debug, info};

use crate::common::{BookingId, EventId, UserId};
use crate::domains::bookings::errors::{is_unknown_user, BookingError, PersistenceContext};
use crate::domains::bookings::models::{Booking, ExpiredBooking};
use crate::domains::events::{Event, NewEvent, SeatAudit};
use crate::kernel::BaseClock;

/// Page size used when streaming overdue bookings.
pub const DEFAULT_SCAN_PAGE_SIZE: u32 = 500;

#[derive(Clone)]
pub struct InventoryStore {
    pool: PgPool,
    clock: Arc<dyn BaseClock>,
}

impl InventoryStore {
    pub fn new(pool: PgPool, clock: Arc<dyn BaseClock>) -> Self {
        Self { pool, clock }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    pub async fn create_event(&self, new: &NewEvent) -> Result<Event, BookingError> {
        let event = Event::insert(new, self.now(), &self.pool)
            .await
            .during("create event")?;

        info!(
            event_id = %event.id,
            total_seats = event.total_seats,
            available_seats = event.available_seats,
            "Event created"
        );
        Ok(event)
    }

    pub async fn get_event(&self, event_id: EventId) -> Result<Event, BookingError> {
        Event::find_by_id(event_id, &self.pool)
            .await
            .during("load event")?
            .ok_or(BookingError::EventNotFound)
    }

    pub async fn list_events(&self, limit: i64, offset: i64) -> Result<Vec<Event>, BookingError> {
        Event::find_page(limit, offset, &self.pool)
            .await
            .during("list events")
    }

    /// Take a seat and create a pending booking, atomically.
    ///
    /// The conditional decrement runs first; if it matches nothing the
    /// transaction is dropped (rolled back) before any booking row exists.
    pub async fn reserve_seat(
        &self,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Booking, BookingError> {
        let now = self.now();
        let mut tx = self.pool.begin().await.during("begin reservation")?;

        let Some(ttl_seconds) = Event::take_seat(event_id, now, &mut *tx)
            .await
            .during("reserve seat")?
        else {
            let exists = Event::exists(event_id, &mut *tx)
                .await
                .during("reserve seat")?;
            debug!(event_id = %event_id, exists, "Reservation rejected");
            return Err(if exists {
                BookingError::NoSeatsAvailable
            } else {
                BookingError::EventNotFound
            });
        };

        let expires_at = reservation_deadline(now, ttl_seconds)?;
        let booking = Booking::insert_pending(event_id, user_id, expires_at, now, &mut *tx)
            .await
            .map_err(|e| {
                if is_unknown_user(&e) {
                    BookingError::UserNotFound
                } else {
                    BookingError::persistence("reserve seat", e)
                }
            })?;

        tx.commit().await.during("commit reservation")?;

        info!(
            booking_id = %booking.id,
            event_id = %event_id,
            user_id = %user_id,
            expires_at = %booking.expires_at,
            "Seat reserved"
        );
        Ok(booking)
    }

    /// pending -> confirmed. No seat change: the seat is already held.
    pub async fn confirm_booking(
        &self,
        user_id: UserId,
        event_id: EventId,
        booking_id: BookingId,
    ) -> Result<Booking, BookingError> {
        let booking = Booking::confirm(booking_id, event_id, user_id, self.now(), &self.pool)
            .await
            .during("confirm booking")?
            .ok_or(BookingError::BookingNotConfirmable)?;

        info!(booking_id = %booking_id, event_id = %event_id, "Booking confirmed");
        Ok(booking)
    }

    /// pending -> cancelled before the deadline, releasing the seat in the same transaction.
    pub async fn cancel_booking(
        &self,
        user_id: UserId,
        event_id: EventId,
        booking_id: BookingId,
    ) -> Result<Booking, BookingError> {
        let now = self.now();
        let mut tx = self.pool.begin().await.during("begin cancellation")?;

        let booking = Booking::cancel_before_deadline(booking_id, event_id, user_id, now, &mut *tx)
            .await
            .during("cancel booking")?
            .ok_or(BookingError::BookingNotCancellable)?;

        Event::release_seat(booking.event_id, now, &mut *tx)
            .await
            .during("release seat")?;

        tx.commit().await.during("commit cancellation")?;

        info!(booking_id = %booking_id, event_id = %event_id, "Booking cancelled");
        Ok(booking)
    }

    /// Expire all overdue pending bookings and release their seats in one statement.
    ///
    /// Idempotent: a second call with nothing newly overdue returns an empty list.
    pub async fn reconcile_expired(&self) -> Result<Vec<ExpiredBooking>, BookingError> {
        let expired = Booking::expire_overdue(self.now(), &self.pool)
            .await
            .during("expire overdue bookings")?;

        if !expired.is_empty() {
            info!(count = expired.len(), "Expired overdue bookings");
        }
        Ok(expired)
    }

    /// Lazily stream overdue pending bookings, one page per round trip.
    ///
    /// The cut-off instant is fixed when the stream is created. No cursor is
    /// kept between calls; a new call starts from the beginning.
    pub fn expired_pending_bookings(
        &self,
        page_size: u32,
    ) -> BoxStream<'static, Result<Booking, BookingError>> {
        let now = self.now();
        let pool = self.pool.clone();
        let limit = i64::from(page_size.max(1));

        stream::try_unfold(Some(None::<BookingId>), move |cursor| {
            let pool = pool.clone();
            async move {
                match cursor {
                    Some(after) => overdue_page(&pool, now, after, limit).await,
                    None => Ok(None),
                }
            }
        })
        .try_flatten()
        .boxed()
    }

    /// Events whose `available_seats` disagrees with their live bookings.
    pub async fn audit_seats(&self) -> Result<Vec<SeatAudit>, BookingError> {
        Event::find_inconsistent(&self.pool)
            .await
            .during("audit seats")
    }
}

/// `now + ttl`, or an error when the stored window cannot be represented.
fn reservation_deadline(
    now: DateTime<Utc>,
    ttl_seconds: i64,
) -> Result<DateTime<Utc>, BookingError> {
    Duration::try_seconds(ttl_seconds)
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| {
            BookingError::InvalidEvent(format!("booking TTL out of range: {}s", ttl_seconds))
        })
}

type OverduePage = stream::Iter<std::vec::IntoIter<Result<Booking, BookingError>>>;

/// Fetch one page and compute the next cursor. `None` as the next state ends the stream.
async fn overdue_page(
    pool: &PgPool,
    now: DateTime<Utc>,
    after: Option<BookingId>,
    limit: i64,
) -> Result<Option<(OverduePage, Option<Option<BookingId>>)>, BookingError> {
    let page = Booking::find_overdue_pending_page(now, after, limit, pool)
        .await
        .during("list expired bookings")?;

    if page.is_empty() {
        return Ok(None);
    }

    let next = match page.last() {
        Some(last) if page.len() as i64 == limit => Some(Some(last.id)),
        _ => None,
    };
    let items: Vec<_> = page.into_iter().map(Ok).collect();

    Ok(Some((stream::iter(items), next)))
}
