//! Tracing-backed notification sink.

use crate::{Notification, NotificationSink, Result, TRACING_TARGET};

/// Sink that writes notifications to the tracing subscriber.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

#[async_trait::async_trait]
impl NotificationSink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    async fn send(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            target: TRACING_TARGET,
            notification_id = %notification.id,
            event = %notification.event,
            "{}",
            notification.message
        );
        Ok(())
    }
}
