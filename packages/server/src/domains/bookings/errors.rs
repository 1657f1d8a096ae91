use std::future::Future;
use std::time::{Duration, Instant};

use thiserror::Error;
use tracing::warn;

/// Outcome kinds of inventory and booking operations.
///
/// "Not confirmable" and "not cancellable" cover a missing booking, another
/// user's booking, a booking no longer pending and (for cancel) a passed
/// deadline alike.
#[derive(Error, Debug)]
pub enum BookingError {
    #[error("event not found")]
    EventNotFound,

    #[error("no seats available")]
    NoSeatsAvailable,

    #[error("user not found")]
    UserNotFound,

    #[error("booking not found or not confirmable")]
    BookingNotConfirmable,

    #[error("booking not found or not cancellable")]
    BookingNotCancellable,

    #[error("invalid event: {0}")]
    InvalidEvent(String),

    #[error("{operation} timed out after {elapsed:?}")]
    Timeout {
        operation: &'static str,
        elapsed: Duration,
    },

    #[error("failed to {operation}: {source}")]
    Persistence {
        operation: &'static str,
        #[source]
        source: sqlx::Error,
    },
}

impl BookingError {
    pub fn persistence(operation: &'static str, source: sqlx::Error) -> Self {
        Self::Persistence { operation, source }
    }

    /// Storage failures may succeed on a later attempt; domain outcomes will not.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence { .. } | Self::Timeout { .. })
    }
}

/// Booking rows reference `users`; a write naming an unknown user trips this key.
pub(crate) const BOOKING_USER_FK: &str = "bookings_user_id_fkey";

pub(crate) fn is_unknown_user(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db) => {
            db.is_foreign_key_violation() && db.constraint() == Some(BOOKING_USER_FK)
        }
        _ => false,
    }
}

/// Attaches the failing operation to a raw sqlx result.
pub(crate) trait PersistenceContext<T> {
    fn during(self, operation: &'static str) -> Result<T, BookingError>;
}

impl<T> PersistenceContext<T> for Result<T, sqlx::Error> {
    fn during(self, operation: &'static str) -> Result<T, BookingError> {
        self.map_err(|e| BookingError::persistence(operation, e))
    }
}

/// Await `fut`, giving up after `limit` if one is set.
///
/// Dropping the future rolls back any transaction it had open.
pub(crate) async fn with_timeout<T, F>(
    limit: Option<Duration>,
    operation: &'static str,
    fut: F,
) -> Result<T, BookingError>
where
    F: Future<Output = Result<T, BookingError>>,
{
    let Some(limit) = limit else {
        return fut.await;
    };

    let started = Instant::now();
    match tokio::time::timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            let elapsed = started.elapsed();
            warn!(operation, ?elapsed, "Store operation timed out");
            Err(BookingError::Timeout { operation, elapsed })
        }
    }
}
