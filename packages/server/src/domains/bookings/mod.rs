pub mod errors;
pub mod inventory;
pub mod models;
pub mod reconciler;
pub mod service;
pub mod status;

pub use errors::BookingError;
pub use inventory::{InventoryStore, DEFAULT_SCAN_PAGE_SIZE};
pub use models::{Booking, ExpiredBooking};
pub use reconciler::{ExpirationReconciler, ReconcileReport};
pub use service::BookingService;
pub use status::BookingStatus;
