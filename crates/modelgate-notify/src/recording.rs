//! In-memory sink for tests.

use std::sync::{Arc, Mutex, PoisonError};

use crate::{Error, Notification, NotificationSink, Result};

/// Sink that keeps every notification it receives.
///
/// Clones share the recorded list.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    received: Arc<Mutex<Vec<Notification>>>,
    fail: bool,
}

impl RecordingSink {
    /// Creates a sink that accepts every notification.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a sink that records and then rejects every notification.
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    /// Notifications received so far.
    pub fn received(&self) -> Vec<Notification> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait::async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        self.received
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notification.clone());

        if self.fail {
            return Err(Error::service_unavailable().with_message("recording sink rejected"));
        }
        Ok(())
    }
}
