//! Account registration and password login.
//!
//! Passwords are stored as bcrypt hashes. Hashing and verification are CPU
//! bound, so both run on the blocking pool.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::Duration;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::domains::auth::errors::AuthError;
use crate::domains::auth::jwt::JwtService;
use crate::domains::users::User;

const MIN_PASSWORD_CHARS: usize = 8;
/// bcrypt ignores everything past 72 bytes.
const MAX_PASSWORD_BYTES: usize = 72;

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    jwt_service: Arc<JwtService>,
    token_ttl: Duration,
    hash_cost: u32,
}

impl AuthService {
    pub fn new(pool: PgPool, jwt_service: Arc<JwtService>, token_ttl: Duration) -> Self {
        Self {
            pool,
            jwt_service,
            token_ttl,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    /// Cheaper hashing for test suites.
    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    pub async fn register(
        &self,
        email: &str,
        name: &str,
        password: &str,
    ) -> Result<User, AuthError> {
        let email = normalize_email(email)?;
        check_password(password)?;

        let hash = hash_password(password.to_string(), self.hash_cost).await?;

        match User::create(&email, name.trim(), Some(&hash), &self.pool).await {
            Ok(user) => {
                info!(user_id = %user.id, "User registered");
                Ok(user)
            }
            Err(sqlx::Error::Database(db)) if db.is_unique_violation() => {
                debug!("Registration for an existing email");
                Err(AuthError::UserAlreadyExists)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check the password and issue a bearer token for the account.
    pub async fn login(&self, email: &str, password: &str) -> Result<String, AuthError> {
        let email = normalize_email(email).map_err(|_| AuthError::InvalidCredentials)?;

        let Some(user) = User::find_by_email(&email, &self.pool).await? else {
            return Err(AuthError::InvalidCredentials);
        };
        let Some(hash) = user.password_hash else {
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(password.to_string(), hash).await? {
            debug!(user_id = %user.id, "Wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let token = self.jwt_service.create_token(user.id, self.token_ttl)?;
        info!(user_id = %user.id, "User logged in");
        Ok(token)
    }
}

fn normalize_email(raw: &str) -> Result<String, AuthError> {
    let email = raw.trim().to_lowercase();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };

    if valid {
        Ok(email)
    } else {
        Err(AuthError::InvalidInput("email".to_string()))
    }
}

fn check_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_CHARS {
        return Err(AuthError::InvalidInput(format!(
            "password: must be at least {} characters",
            MIN_PASSWORD_CHARS
        )));
    }
    if password.len() > MAX_PASSWORD_BYTES {
        return Err(AuthError::InvalidInput(format!(
            "password: must be at most {} bytes",
            MAX_PASSWORD_BYTES
        )));
    }
    Ok(())
}

async fn hash_password(password: String, cost: u32) -> Result<String, AuthError> {
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| anyhow!("Password hashing task failed: {}", e))?
        .map_err(anyhow::Error::from)?;
    Ok(hash)
}

async fn verify_password(password: String, hash: String) -> Result<bool, AuthError> {
    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(password, &hash))
        .await
        .map_err(|e| anyhow!("Password check task failed: {}", e))?
        .map_err(anyhow::Error::from)?;
    Ok(matches)
}
