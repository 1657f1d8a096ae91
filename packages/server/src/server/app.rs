//! Application setup and server configuration.

use std::sync::Arc;

use axum::{
    extract::Extension,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderValue, Method,
    },
    middleware,
    routing::{get, post},
    Router,
};
use sqlx::PgPool;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::domains::auth::{AuthService, JwtService};
use crate::domains::bookings::BookingService;
use crate::server::middleware::jwt_auth_middleware;
use crate::server::routes::{
    cancel_booking_handler, confirm_booking_handler, create_event_handler, get_event_handler,
    health_handler, list_events_handler, login_handler, register_handler, reserve_seat_handler,
};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub bookings: BookingService,
    pub auth: AuthService,
    pub jwt_service: Arc<JwtService>,
}

/// Build the Axum application router
pub fn build_app(state: AppState, allowed_origins: &[String]) -> Router {
    let cors = cors_layer(allowed_origins);

    // Clone jwt_service for middleware closure
    let jwt_service = state.jwt_service.clone();

    Router::new()
        .route("/health", get(health_handler))
        .route("/api/auth/register", post(register_handler))
        .route("/api/auth/login", post(login_handler))
        .route(
            "/api/events",
            get(list_events_handler).post(create_event_handler),
        )
        .route("/api/events/:event_id", get(get_event_handler))
        .route("/api/events/:event_id/book", post(reserve_seat_handler))
        .route(
            "/api/events/:event_id/bookings/:booking_id/confirm",
            post(confirm_booking_handler),
        )
        .route(
            "/api/events/:event_id/bookings/:booking_id/cancel",
            post(cancel_booking_handler),
        )
        // Middleware layers (applied in reverse order - last added runs first)
        .layer(middleware::from_fn(move |req, next| {
            jwt_auth_middleware(jwt_service.clone(), req, next)
        }))
        .layer(Extension(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

/// Allow any origin when none are configured (local development).
fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([AUTHORIZATION, CONTENT_TYPE]);

    let origins: Vec<HeaderValue> = allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    if origins.is_empty() {
        cors.allow_origin(Any)
    } else {
        cors.allow_origin(AllowOrigin::list(origins))
    }
}
