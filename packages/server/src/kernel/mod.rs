//! Kernel module - server infrastructure and dependencies.

pub mod clock;
pub mod notifier;
pub mod scheduled_tasks;
pub mod smtp_notifier;
pub mod test_dependencies;
pub mod traits;

pub use clock::SystemClock;
pub use notifier::LogNotifier;
pub use smtp_notifier::SmtpNotifier;
pub use test_dependencies::{MockClock, MockNotifier, SentNotification};
pub use traits::*;
