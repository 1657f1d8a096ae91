//! Auth domain - accounts, password login and bearer tokens.

pub mod errors;
pub mod jwt;
pub mod service;

pub use errors::AuthError;
pub use jwt::{Claims, JwtService};
pub use service::AuthService;
