//! Fallback notification sink for deployments without SMTP settings.
//!
//! Notices are written to the log so operators can still see who would have
//! been told what.

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use super::BaseNotifier;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl BaseNotifier for LogNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<()> {
        info!(recipient = %recipient, message = %message, "Notification");
        Ok(())
    }
}
