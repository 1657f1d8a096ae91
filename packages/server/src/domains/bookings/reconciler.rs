use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::anyhow;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::common::EventId;
use crate::domains::bookings::errors::{with_timeout, BookingError};
use crate::domains::bookings::inventory::InventoryStore;
use crate::domains::bookings::models::ExpiredBooking;
use crate::domains::events::Event;
use crate::domains::users::User;
use crate::kernel::BaseNotifier;

/// Notices in flight at once during one pass.
const NOTIFY_CONCURRENCY: usize = 8;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileReport {
    pub expired: usize,
    pub notified: usize,
    pub failed: usize,
}

/// Expires overdue bookings and tells their owners.
///
/// The state change happens entirely inside [`InventoryStore::reconcile_expired`];
/// notifications are best effort and run after the commit, so a failed send
/// never un-expires a booking. The timeout applies to the expiry statement and
/// to each notice separately: a slow recipient counts as one failure and the
/// rest of the batch is still told.
#[derive(Clone)]
pub struct ExpirationReconciler {
    store: InventoryStore,
    notifier: Arc<dyn BaseNotifier>,
    timeout: Option<Duration>,
}

type TitleCache = Mutex<HashMap<EventId, String>>;

impl ExpirationReconciler {
    pub fn new(
        store: InventoryStore,
        notifier: Arc<dyn BaseNotifier>,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            store,
            notifier,
            timeout,
        }
    }

    pub async fn run(&self) -> Result<ReconcileReport, BookingError> {
        let expired = with_timeout(
            self.timeout,
            "reconcile expired bookings",
            self.store.reconcile_expired(),
        )
        .await?;

        let mut report = ReconcileReport {
            expired: expired.len(),
            ..Default::default()
        };
        if expired.is_empty() {
            debug!("No overdue bookings");
            return Ok(report);
        }

        let titles = TitleCache::default();
        let notices: Vec<_> = expired
            .iter()
            .map(|booking| self.deliver(booking, &titles))
            .collect();
        let delivered: Vec<bool> = stream::iter(notices)
            .buffer_unordered(NOTIFY_CONCURRENCY)
            .collect()
            .await;

        report.notified = delivered.iter().filter(|ok| **ok).count();
        report.failed = delivered.len() - report.notified;

        info!(
            expired = report.expired,
            notified = report.notified,
            failed = report.failed,
            "Reconciliation pass complete"
        );
        Ok(report)
    }

    /// Send one notice; failures are logged here and reported as `false`.
    async fn deliver(&self, booking: &ExpiredBooking, titles: &TitleCache) -> bool {
        let outcome = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.notify(booking, titles))
                .await
                .unwrap_or_else(|_| Err(anyhow!("notice timed out after {:?}", limit))),
            None => self.notify(booking, titles).await,
        };

        match outcome {
            Ok(()) => true,
            Err(e) => {
                warn!(
                    booking_id = %booking.id,
                    user_id = %booking.user_id,
                    error = %e,
                    "Failed to send expiration notice"
                );
                false
            }
        }
    }

    async fn notify(&self, booking: &ExpiredBooking, titles: &TitleCache) -> anyhow::Result<()> {
        let pool = self.store.pool();
        let user = User::find_by_id(booking.user_id, pool).await?;

        let cached = titles
            .lock()
            .ok()
            .and_then(|titles| titles.get(&booking.event_id).cloned());
        let title = match cached {
            Some(title) => title,
            None => {
                let event = Event::find_by_id(booking.event_id, pool)
                    .await?
                    .ok_or_else(|| anyhow!("event {} not found", booking.event_id))?;
                if let Ok(mut titles) = titles.lock() {
                    titles.insert(event.id, event.title.clone());
                }
                event.title
            }
        };

        self.notifier
            .send(&user.email, &expiration_message(&title))
            .await
    }
}

pub fn expiration_message(event_title: &str) -> String {
    format!(
        "Your booking for the event \"{}\" has been canceled due to expiration.",
        event_title
    )
}
