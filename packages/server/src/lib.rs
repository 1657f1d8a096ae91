// Event Booker - seat inventory and booking lifecycle
//
// Events expose a fixed number of seats. Users hold a seat with a pending
// booking, then confirm it, cancel it before its deadline, or let it expire.
// All seat accounting happens in Postgres through guarded writes; see
// domains/bookings/inventory.rs.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;
pub mod server;

pub use config::*;
