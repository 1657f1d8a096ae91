//! Scheduled background tasks using tokio-cron-scheduler.
//!
//! ```text
//! Scheduler (RECONCILE_SCHEDULE, default every 30s)
//!     │
//!     └─► BookingService::run_reconciliation()
//!             ├─► expire overdue pending bookings + release seats (one statement)
//!             └─► notify each owner (best effort)
//! ```
//!
//! Overlapping runs are harmless: a booking can only be expired once.

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::domains::bookings::BookingService;

/// Start all scheduled tasks
pub async fn start_scheduler(service: BookingService, schedule: &str) -> Result<JobScheduler> {
    let scheduler = JobScheduler::new().await?;

    let reconcile_job = Job::new_async(schedule, move |_uuid, _lock| {
        let service = service.clone();
        Box::pin(async move {
            if let Err(e) = service.run_reconciliation().await {
                tracing::error!(
                    error = %e,
                    retryable = e.is_retryable(),
                    "Reconciliation task failed"
                );
            }
        })
    })
    .with_context(|| format!("Invalid reconcile schedule: {schedule}"))?;

    scheduler.add(reconcile_job).await?;
    scheduler.start().await?;

    tracing::info!(schedule, "Scheduled tasks started (booking reconciliation)");
    Ok(scheduler)
}
