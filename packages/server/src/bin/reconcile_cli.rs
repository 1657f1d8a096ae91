//! Operator CLI for booking reconciliation
//!
//! Runs against the same database as the server. Every command prints JSON:
//! one object for `run` and `audit`, one object per line for `expired`.

use std::sync::Arc;

use anyhow::{Context, Result};
use booking_core::domains::bookings::{BookingService, DEFAULT_SCAN_PAGE_SIZE};
use booking_core::kernel::{BaseNotifier, LogNotifier, SmtpNotifier, SystemClock};
use booking_core::SmtpConfig;
use clap::{Parser, Subcommand};
use futures::TryStreamExt;
use serde::Serialize;
use sqlx::PgPool;

#[derive(Parser)]
#[command(name = "reconcile_cli")]
#[command(about = "Expire overdue bookings and inspect seat accounting")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one reconciliation pass (expire, release seats, notify)
    Run,

    /// List pending bookings past their deadline without changing them
    Expired {
        #[arg(long, default_value_t = DEFAULT_SCAN_PAGE_SIZE)]
        page_size: u32,
    },

    /// Report events whose seat counter disagrees with their bookings
    Audit,
}

fn output<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "warn".into()),
        )
        .with_writer(std::io::stderr)
        .try_init();

    let cli = Cli::parse();
    let service = get_service().await?;

    match cli.command {
        Commands::Run => cmd_run(&service).await,
        Commands::Expired { page_size } => cmd_expired(&service, page_size).await,
        Commands::Audit => cmd_audit(&service).await,
    }
}

async fn get_service() -> Result<BookingService> {
    let _ = dotenvy::dotenv();
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPool::connect(&database_url)
        .await
        .context("Failed to connect to database")?;

    // Same mail settings as the server, so `run` sends real notices too
    let notifier: Arc<dyn BaseNotifier> =
        match SmtpConfig::from_lookup(|key| std::env::var(key).ok())? {
            Some(smtp) => Arc::new(SmtpNotifier::new(&smtp)?),
            None => Arc::new(LogNotifier),
        };

    Ok(BookingService::new(
        pool,
        Arc::new(SystemClock),
        notifier,
        None,
    ))
}

async fn cmd_run(service: &BookingService) -> Result<()> {
    let report = service
        .run_reconciliation()
        .await
        .context("Reconciliation failed")?;
    output(&report)
}

async fn cmd_expired(service: &BookingService, page_size: u32) -> Result<()> {
    let mut bookings = service.expired_pending_bookings(page_size);
    while let Some(booking) = bookings
        .try_next()
        .await
        .context("Failed to list expired bookings")?
    {
        output(&booking)?;
    }
    Ok(())
}

async fn cmd_audit(service: &BookingService) -> Result<()> {
    #[derive(Serialize)]
    struct AuditReport {
        consistent: bool,
        events: Vec<booking_core::domains::events::SeatAudit>,
    }

    let events = service.audit_seats().await.context("Audit failed")?;
    output(&AuditReport {
        consistent: events.is_empty(),
        events,
    })
}
