use thiserror::Error;

/// Registration and login failures
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("invalid {0}")]
    InvalidInput(String),

    #[error("user already exists")]
    UserAlreadyExists,

    /// Unknown email and wrong password look the same to the caller.
    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}
