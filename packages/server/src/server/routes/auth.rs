use axum::{extract::Extension, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

use crate::domains::users::User;
use crate::server::app::AppState;
use crate::server::routes::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
}

/// POST /api/auth/register
pub async fn register_handler(
    Extension(state): Extension<AppState>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<User>), ApiError> {
    let user = state
        .auth
        .register(&req.email, &req.name, &req.password)
        .await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// POST /api/auth/login
pub async fn login_handler(
    Extension(state): Extension<AppState>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let token = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(LoginResponse { token }))
}
