//! Booking service: the entry point routes, the scheduler and the CLI call.
//!
//! Stateless. Each call is delegated to the [`InventoryStore`]; error kinds
//! pass through unchanged. With a timeout configured, a store call that runs
//! past it is abandoned (its transaction is dropped and rolled back) and
//! reported as [`BookingError::Timeout`]. Reconciliation applies the same
//! limit itself, per step.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::BoxStream;
use sqlx::PgPool;

use crate::common::{BookingId, EventId, UserId};
use crate::domains::bookings::errors::{with_timeout, BookingError};
use crate::domains::bookings::inventory::InventoryStore;
use crate::domains::bookings::models::Booking;
use crate::domains::bookings::reconciler::{ExpirationReconciler, ReconcileReport};
use crate::domains::events::{Event, NewEvent, SeatAudit};
use crate::kernel::{BaseClock, BaseNotifier};

#[derive(Clone)]
pub struct BookingService {
    store: InventoryStore,
    reconciler: ExpirationReconciler,
    timeout: Option<Duration>,
}

impl BookingService {
    pub fn new(
        pool: PgPool,
        clock: Arc<dyn BaseClock>,
        notifier: Arc<dyn BaseNotifier>,
        timeout: Option<Duration>,
    ) -> Self {
        let store = InventoryStore::new(pool, clock);
        let reconciler = ExpirationReconciler::new(store.clone(), notifier, timeout);
        Self {
            store,
            reconciler,
            timeout,
        }
    }

    pub async fn create_event(&self, new: NewEvent) -> Result<Event, BookingError> {
        new.validate().map_err(BookingError::InvalidEvent)?;
        self.bounded("create event", self.store.create_event(&new))
            .await
    }

    pub async fn get_event(&self, event_id: EventId) -> Result<Event, BookingError> {
        self.bounded("load event", self.store.get_event(event_id))
            .await
    }

    pub async fn list_events(&self, limit: i64, offset: i64) -> Result<Vec<Event>, BookingError> {
        self.bounded("list events", self.store.list_events(limit, offset))
            .await
    }

    pub async fn reserve_seat(
        &self,
        user_id: UserId,
        event_id: EventId,
    ) -> Result<Booking, BookingError> {
        self.bounded("reserve seat", self.store.reserve_seat(event_id, user_id))
            .await
    }

    pub async fn confirm_booking(
        &self,
        user_id: UserId,
        event_id: EventId,
        booking_id: BookingId,
    ) -> Result<Booking, BookingError> {
        self.bounded(
            "confirm booking",
            self.store.confirm_booking(user_id, event_id, booking_id),
        )
        .await
    }

    pub async fn cancel_booking(
        &self,
        user_id: UserId,
        event_id: EventId,
        booking_id: BookingId,
    ) -> Result<Booking, BookingError> {
        self.bounded(
            "cancel booking",
            self.store.cancel_booking(user_id, event_id, booking_id),
        )
        .await
    }

    /// One reconciliation pass. Safe to call concurrently with itself.
    pub async fn run_reconciliation(&self) -> Result<ReconcileReport, BookingError> {
        self.reconciler.run().await
    }

    /// Overdue pending bookings, streamed lazily. Not bounded by the timeout:
    /// each page is its own short query and the consumer controls the pace.
    pub fn expired_pending_bookings(
        &self,
        page_size: u32,
    ) -> BoxStream<'static, Result<Booking, BookingError>> {
        self.store.expired_pending_bookings(page_size)
    }

    pub async fn audit_seats(&self) -> Result<Vec<SeatAudit>, BookingError> {
        self.bounded("audit seats", self.store.audit_seats()).await
    }

    async fn bounded<T, F>(&self, operation: &'static str, fut: F) -> Result<T, BookingError>
    where
        F: Future<Output = Result<T, BookingError>>,
    {
        with_timeout(self.timeout, operation, fut).await
    }
}
