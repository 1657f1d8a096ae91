// Main entry point for API server

use std::sync::Arc;

use anyhow::{Context, Result};
use booking_core::domains::auth::{AuthService, JwtService};
use booking_core::domains::bookings::BookingService;
use booking_core::kernel::{
    scheduled_tasks::start_scheduler, BaseNotifier, LogNotifier, SmtpNotifier, SystemClock,
};
use booking_core::server::{build_app, AppState};
use booking_core::Config;
use sqlx::postgres::PgPoolOptions;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,booking_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Event Booker API");

    // Load configuration
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Configuration loaded");

    // Connect to database
    tracing::info!("Connecting to database...");
    let pool = PgPoolOptions::new()
        .max_connections(config.database_max_connections)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    tracing::info!("Database connected");

    // Run migrations
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    tracing::info!("Migrations complete");

    let notifier: Arc<dyn BaseNotifier> = match &config.smtp {
        Some(smtp) => {
            tracing::info!(host = %smtp.host, port = smtp.port, "Sending notices over SMTP");
            Arc::new(SmtpNotifier::new(smtp).context("Failed to configure SMTP")?)
        }
        None => {
            tracing::warn!("SMTP_HOST not set, expiry notices will only be logged");
            Arc::new(LogNotifier)
        }
    };

    let bookings = BookingService::new(
        pool.clone(),
        Arc::new(SystemClock),
        notifier,
        config.store_timeout,
    );

    let mut scheduler = start_scheduler(bookings.clone(), &config.reconcile_schedule)
        .await
        .context("Failed to start scheduler")?;

    let jwt_service = Arc::new(JwtService::new(&config.jwt_secret, config.jwt_issuer.clone()));
    let state = AppState {
        db_pool: pool.clone(),
        bookings,
        auth: AuthService::new(pool.clone(), jwt_service.clone(), config.jwt_ttl),
        jwt_service,
    };
    let app = build_app(state, &config.allowed_origins);

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    tracing::info!("Starting server on {}", addr);
    tracing::info!("Health check: http://localhost:{}/health", config.port);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    tracing::info!("Server stopped, shutting down scheduler");
    scheduler
        .shutdown()
        .await
        .context("Failed to stop scheduler")?;
    pool.close().await;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
