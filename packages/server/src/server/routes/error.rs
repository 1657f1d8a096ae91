use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Extension, Json,
};
use serde::Serialize;
use tracing::error;

use crate::common::UserId;
use crate::domains::auth::AuthError;
use crate::domains::bookings::BookingError;
use crate::server::middleware::AuthUser;

/// Error returned by every API handler.
#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Auth(AuthError),
    Booking(BookingError),
}

#[derive(Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<BookingError> for ApiError {
    fn from(err: BookingError) -> Self {
        ApiError::Booking(err)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::Auth(err)
    }
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthorized => StatusCode::UNAUTHORIZED,
            ApiError::Auth(err) => match err {
                AuthError::InvalidInput(_) => StatusCode::BAD_REQUEST,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::DatabaseError(_) | AuthError::InternalError(_) => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            ApiError::Booking(err) => match err {
                BookingError::EventNotFound
                | BookingError::UserNotFound
                | BookingError::BookingNotConfirmable
                | BookingError::BookingNotCancellable => StatusCode::NOT_FOUND,
                BookingError::NoSeatsAvailable => StatusCode::CONFLICT,
                BookingError::InvalidEvent(_) => StatusCode::BAD_REQUEST,
                BookingError::Timeout { .. } => StatusCode::SERVICE_UNAVAILABLE,
                BookingError::Persistence { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            ApiError::Unauthorized => "authentication required".to_string(),
            ApiError::Auth(AuthError::DatabaseError(_) | AuthError::InternalError(_))
            | ApiError::Booking(BookingError::Persistence { .. }) => {
                error!(error = %self, "Request failed");
                "internal error".to_string()
            }
            ApiError::Booking(BookingError::Timeout { .. }) => {
                "service busy, try again".to_string()
            }
            ApiError::Auth(err) => err.to_string(),
            ApiError::Booking(err) => err.to_string(),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ApiError::Unauthorized => f.write_str("unauthorized"),
            ApiError::Auth(err) => write!(f, "{}", err),
            ApiError::Booking(err) => write!(f, "{}", err),
        }
    }
}

/// The caller's user id, or 401.
pub fn require_user(auth: Option<Extension<AuthUser>>) -> Result<UserId, ApiError> {
    auth.map(|Extension(user)| user.user_id)
        .ok_or(ApiError::Unauthorized)
}
