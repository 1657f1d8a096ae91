//! Test harness with testcontainers for integration testing.
//!
//! One Postgres container is shared by the whole test binary. Migrations run
//! once into a template database; every test then gets its own database
//! cloned from that template, so reconciliation passes (which act on every
//! overdue booking) in one test never touch another test's rows.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::Router;
use booking_core::domains::auth::{AuthService, JwtService};
use booking_core::domains::bookings::BookingService;
use booking_core::kernel::{MockClock, MockNotifier};
use booking_core::server::{build_app, AppState};
use sqlx::postgres::PgPoolOptions;
use sqlx::{Connection, PgConnection, PgPool};
use test_context::AsyncTestContext;
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, ImageExt};
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;
use uuid::Uuid;

const TEMPLATE_DB: &str = "booking_template";

pub const TEST_JWT_SECRET: &str = "test-secret";
pub const TEST_JWT_ISSUER: &str = "event-booker-test";

/// Shared test infrastructure that persists across all tests.
struct SharedTestInfra {
    server_url: String,
    // Keep container alive for the entire test run
    _postgres: ContainerAsync<Postgres>,
}

/// Global shared infrastructure - initialized once, reused by all tests.
static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        // Run tests with: RUST_LOG=debug cargo test -- --nocapture
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .with_tag("16")
            .with_cmd(["-c", "max_connections=300"])
            .start()
            .await
            .context("Failed to start Postgres container")?;

        let pg_host = postgres.get_host().await?;
        let pg_port = postgres.get_host_port_ipv4(5432).await?;
        let server_url = format!("postgresql://postgres:postgres@{}:{}", pg_host, pg_port);

        let mut admin = PgConnection::connect(&format!("{}/postgres", server_url))
            .await
            .context("Failed to connect to Postgres")?;
        sqlx::query(&format!("CREATE DATABASE {}", TEMPLATE_DB))
            .execute(&mut admin)
            .await
            .context("Failed to create template database")?;
        admin.close().await?;

        // Migrate the template, then disconnect so it can be cloned
        let mut template = PgConnection::connect(&format!("{}/{}", server_url, TEMPLATE_DB))
            .await
            .context("Failed to connect to template database")?;
        sqlx::migrate!("./migrations")
            .run_direct(&mut template)
            .await
            .context("Failed to run migrations")?;
        template.close().await?;

        Ok(Self {
            server_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async {
                Self::init()
                    .await
                    .expect("Failed to initialize shared test infrastructure")
            })
            .await
    }

    async fn create_database(&self) -> Result<String> {
        let name = format!("test_{}", Uuid::new_v4().simple());

        let mut admin = PgConnection::connect(&format!("{}/postgres", self.server_url)).await?;
        sqlx::query(&format!("CREATE DATABASE {} TEMPLATE {}", name, TEMPLATE_DB))
            .execute(&mut admin)
            .await
            .with_context(|| format!("Failed to create database {}", name))?;
        admin.close().await?;

        Ok(format!("{}/{}", self.server_url, name))
    }
}

/// Per-test context: a private database, a controllable clock and a
/// recording notifier.
///
/// ```ignore
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     let service = ctx.service();
///     // ...
/// }
/// ```
pub struct TestHarness {
    pub db_pool: PgPool,
    pub clock: MockClock,
    pub notifier: MockNotifier,
    pub jwt_service: Arc<JwtService>,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new()
            .await
            .expect("Failed to create test harness")
    }

    async fn teardown(self) {
        self.db_pool.close().await;
    }
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;
        let db_url = infra.create_database().await?;

        let db_pool = PgPoolOptions::new()
            .max_connections(20)
            .connect(&db_url)
            .await
            .context("Failed to connect to test database")?;

        Ok(Self {
            db_pool,
            clock: MockClock::new(),
            notifier: MockNotifier::new(),
            jwt_service: Arc::new(JwtService::new(
                TEST_JWT_SECRET,
                TEST_JWT_ISSUER.to_string(),
            )),
        })
    }

    /// Booking service wired to this harness's clock and notifier.
    pub fn service(&self) -> BookingService {
        self.service_with_clock(self.clock.clone())
    }

    /// Same database, different view of "now" (another instance with clock skew).
    pub fn service_with_clock(&self, clock: MockClock) -> BookingService {
        BookingService::new(
            self.db_pool.clone(),
            Arc::new(clock),
            Arc::new(self.notifier.clone()),
            None,
        )
    }

    /// Accounts against this database, with the cheapest bcrypt cost.
    pub fn auth(&self) -> AuthService {
        AuthService::new(
            self.db_pool.clone(),
            self.jwt_service.clone(),
            chrono::Duration::hours(1),
        )
        .with_hash_cost(4) // bcrypt's minimum cost (bcrypt::MIN_COST is private)
    }

    /// Full HTTP router over [`Self::service`] and [`Self::auth`].
    pub fn app(&self) -> Router {
        let state = AppState {
            db_pool: self.db_pool.clone(),
            bookings: self.service(),
            auth: self.auth(),
            jwt_service: self.jwt_service.clone(),
        };
        build_app(state, &[])
    }
}
