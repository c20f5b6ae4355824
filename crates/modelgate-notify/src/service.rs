//! Notification fan-out.

use std::fmt;
use std::sync::Arc;

use crate::{Notification, NotificationSink, TRACING_TARGET};

/// Outcome of delivering one notification to every sink.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeliverySummary {
    /// Sinks that accepted the notification.
    pub delivered: usize,
    /// Sinks that failed.
    pub failed: usize,
}

/// Delivers notifications to a list of independent sinks.
///
/// Sinks are attempted one after another. A failure is logged and does not
/// affect delivery to the remaining sinks; nothing is ever returned to the
/// caller as an error.
#[derive(Clone, Default)]
pub struct NotificationService {
    sinks: Vec<Arc<dyn NotificationSink>>,
}

impl fmt::Debug for NotificationService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.sinks.iter().map(|sink| sink.name()).collect();
        f.debug_struct("NotificationService")
            .field("sinks", &names)
            .finish()
    }
}

impl NotificationService {
    /// Creates a service without sinks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a sink.
    pub fn with_sink<S>(mut self, sink: S) -> Self
    where
        S: NotificationSink + 'static,
    {
        self.sinks.push(Arc::new(sink));
        self
    }

    /// Returns the number of registered sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    /// Returns whether no sink is registered.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Sends a notification to every sink.
    pub async fn notify(&self, notification: &Notification) -> DeliverySummary {
        let mut summary = DeliverySummary::default();

        for sink in &self.sinks {
            match sink.send(notification).await {
                Ok(()) => {
                    summary.delivered += 1;
                    tracing::debug!(
                        target: TRACING_TARGET,
                        sink = sink.name(),
                        event = %notification.event,
                        "Notification delivered"
                    );
                }
                Err(error) => {
                    summary.failed += 1;
                    tracing::warn!(
                        target: TRACING_TARGET,
                        sink = sink.name(),
                        event = %notification.event,
                        error = %error,
                        "Notification delivery failed"
                    );
                }
            }
        }

        summary
    }
}
