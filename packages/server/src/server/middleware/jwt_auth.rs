use std::sync::Arc;

use axum::{
    body::Body,
    http::{header::AUTHORIZATION, HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::common::UserId;
use crate::domains::auth::JwtService;

/// The caller, as named by a verified bearer token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AuthUser {
    pub user_id: UserId,
}

/// Attach an [`AuthUser`] extension when the request carries a valid token.
///
/// Never rejects: public routes ignore the extension and protected handlers
/// answer 401 through `require_user` when it is missing.
pub async fn jwt_auth_middleware(
    jwt_service: Arc<JwtService>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    match authenticate(request.headers(), &jwt_service) {
        Some(user) => {
            debug!(user_id = %user.user_id, "Request authenticated");
            request.extensions_mut().insert(user);
        }
        None if request.headers().contains_key(AUTHORIZATION) => {
            debug!("Ignoring unusable Authorization header");
        }
        None => {}
    }

    next.run(request).await
}

fn authenticate(headers: &HeaderMap, jwt_service: &JwtService) -> Option<AuthUser> {
    let token = bearer_token(headers)?;
    let claims = jwt_service.verify_token(token).ok()?;
    Some(AuthUser {
        user_id: claims.sub,
    })
}

/// `Authorization: Bearer <token>`, scheme matched case-insensitively.
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
