// HTTP routes
pub mod auth;
pub mod error;
pub mod events;
pub mod health;

pub use auth::*;
pub use error::*;
pub use events::*;
pub use health::*;
