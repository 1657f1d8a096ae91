use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    Json,
};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;

use crate::common::{BookingId, EventId};
use crate::domains::bookings::{Booking, BookingError};
use crate::domains::events::{default_booking_ttl, Event, NewEvent};
use crate::server::app::AppState;
use crate::server::middleware::AuthUser;
use crate::server::routes::error::{require_user, ApiError};

const DEFAULT_PAGE_SIZE: i64 = 50;
const MAX_PAGE_SIZE: i64 = 200;

#[derive(Debug, Deserialize)]
pub struct ListEventsQuery {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct CreateEventRequest {
    pub title: String,
    pub date: DateTime<Utc>,
    pub total_seats: i32,
    pub available_seats: Option<i32>,
    pub booking_ttl_secs: Option<i64>,
}

impl TryFrom<CreateEventRequest> for NewEvent {
    type Error = BookingError;

    fn try_from(req: CreateEventRequest) -> Result<Self, Self::Error> {
        let booking_ttl = match req.booking_ttl_secs {
            Some(secs) => Duration::try_seconds(secs).ok_or_else(|| {
                BookingError::InvalidEvent(format!("booking_ttl_secs out of range: {}", secs))
            })?,
            None => default_booking_ttl(),
        };

        Ok(NewEvent {
            title: req.title,
            date: req.date,
            total_seats: req.total_seats,
            available_seats: req.available_seats,
            booking_ttl,
        })
    }
}

/// GET /api/events
pub async fn list_events_handler(
    Extension(state): Extension<AppState>,
    Query(query): Query<ListEventsQuery>,
) -> Result<Json<Vec<Event>>, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_PAGE_SIZE)
        .clamp(1, MAX_PAGE_SIZE);
    let offset = query.offset.unwrap_or(0).max(0);

    let events = state.bookings.list_events(limit, offset).await?;
    Ok(Json(events))
}

/// GET /api/events/:event_id
pub async fn get_event_handler(
    Extension(state): Extension<AppState>,
    Path(event_id): Path<EventId>,
) -> Result<Json<Event>, ApiError> {
    Ok(Json(state.bookings.get_event(event_id).await?))
}

/// POST /api/events
pub async fn create_event_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Json(req): Json<CreateEventRequest>,
) -> Result<(StatusCode, Json<Event>), ApiError> {
    require_user(auth)?;

    let event = state.bookings.create_event(req.try_into()?).await?;
    Ok((StatusCode::CREATED, Json(event)))
}

/// POST /api/events/:event_id/book
pub async fn reserve_seat_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path(event_id): Path<EventId>,
) -> Result<(StatusCode, Json<Booking>), ApiError> {
    let user_id = require_user(auth)?;

    let booking = state.bookings.reserve_seat(user_id, event_id).await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

/// POST /api/events/:event_id/bookings/:booking_id/confirm
pub async fn confirm_booking_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path((event_id, booking_id)): Path<(EventId, BookingId)>,
) -> Result<Json<Booking>, ApiError> {
    let user_id = require_user(auth)?;

    let booking = state
        .bookings
        .confirm_booking(user_id, event_id, booking_id)
        .await?;
    Ok(Json(booking))
}

/// POST /api/events/:event_id/bookings/:booking_id/cancel
pub async fn cancel_booking_handler(
    Extension(state): Extension<AppState>,
    auth: Option<Extension<AuthUser>>,
    Path((event_id, booking_id)): Path<(EventId, BookingId)>,
) -> Result<Json<Booking>, ApiError> {
    let user_id = require_user(auth)?;

    let booking = state
        .bookings
        .cancel_booking(user_id, event_id, booking_id)
        .await?;
    Ok(Json(booking))
}
