use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::common::UserId;

/// User model - SQL persistence layer
///
/// The reconciler reads `email` to address expiry notices; the auth service
/// owns registration and the password hash.
#[derive(sqlx::FromRow, Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub name: String,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// Find user by ID
    pub async fn find_by_id(id: UserId, pool: &PgPool) -> Result<Self> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_one(pool)
            .await
            .map_err(Into::into)
    }

    /// Find user by (already normalized) email
    pub async fn find_by_email(email: &str, pool: &PgPool) -> sqlx::Result<Option<Self>> {
        sqlx::query_as::<_, Self>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(pool)
            .await
    }

    /// Insert a user. A duplicate email surfaces as a unique violation.
    pub async fn create(
        email: &str,
        name: &str,
        password_hash: Option<&str>,
        pool: &PgPool,
    ) -> sqlx::Result<Self> {
        sqlx::query_as::<_, Self>(
            "INSERT INTO users (id, email, name, password_hash)
             VALUES ($1, $2, $3, $4)
             RETURNING *",
        )
        .bind(UserId::new())
        .bind(email)
        .bind(name)
        .bind(password_hash)
        .fetch_one(pool)
        .await
    }
}
