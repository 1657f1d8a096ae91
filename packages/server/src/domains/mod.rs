// Business domains
pub mod auth;
pub mod bookings;
pub mod events;
pub mod users;
