// TestDependencies - mock implementations for testing
//
// Provides a controllable clock and a recording notifier that can be injected
// into the booking service in tests.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use chrono::{DateTime, Duration, DurationRound, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration as StdDuration;

use super::{BaseClock, BaseNotifier};

// =============================================================================
// Mock Clock
// =============================================================================

/// Clock that only moves when told to.
#[derive(Clone)]
pub struct MockClock {
    now: Arc<Mutex<DateTime<Utc>>>,
}

impl MockClock {
    /// Starts at the current wall time, truncated to microseconds so values
    /// survive a round trip through `TIMESTAMPTZ` unchanged.
    pub fn new() -> Self {
        let now = Utc::now()
            .duration_trunc(Duration::microseconds(1))
            .unwrap_or_else(|_| Utc::now());
        Self::at(now)
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock().unwrap();
        *now += by;
    }

    pub fn set(&self, to: DateTime<Utc>) {
        *self.now.lock().unwrap() = to;
    }
}

impl Default for MockClock {
    fn default() -> Self {
        Self::new()
    }
}

impl BaseClock for MockClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// =============================================================================
// Mock Notifier
// =============================================================================

/// A notification captured by [`MockNotifier`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentNotification {
    pub recipient: String,
    pub message: String,
}

/// Records every notification; can be told to fail for, or stall on, chosen recipients.
#[derive(Clone, Default)]
pub struct MockNotifier {
    sent: Arc<Mutex<Vec<SentNotification>>>,
    failing_recipients: Arc<Mutex<HashSet<String>>>,
    slow_recipients: Arc<Mutex<HashMap<String, StdDuration>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every send to `recipient` return an error
    pub fn failing_for(self, recipient: &str) -> Self {
        self.failing_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string());
        self
    }

    /// Make every send to `recipient` take `delay` before it is recorded
    pub fn slow_for(self, recipient: &str, delay: StdDuration) -> Self {
        self.slow_recipients
            .lock()
            .unwrap()
            .insert(recipient.to_string(), delay);
        self
    }

    /// Get all notifications that were delivered
    pub fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().unwrap().clone()
    }

    /// Notifications delivered to one recipient
    pub fn sent_to(&self, recipient: &str) -> Vec<SentNotification> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|n| n.recipient == recipient)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl BaseNotifier for MockNotifier {
    async fn send(&self, recipient: &str, message: &str) -> Result<()> {
        let delay = self.slow_recipients.lock().unwrap().get(recipient).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_recipients.lock().unwrap().contains(recipient) {
            return Err(anyhow!("mail server rejected {}", recipient));
        }

        self.sent.lock().unwrap().push(SentNotification {
            recipient: recipient.to_string(),
            message: message.to_string(),
        });
        Ok(())
    }
}
