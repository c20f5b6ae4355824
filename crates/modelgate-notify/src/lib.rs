#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod log;
mod notification;
mod service;

#[cfg(feature = "test-utils")]
#[cfg_attr(docsrs, doc(cfg(feature = "test-utils")))]
mod recording;

#[cfg(feature = "webhook")]
#[cfg_attr(docsrs, doc(cfg(feature = "webhook")))]
pub mod webhook;

pub use modelgate_core::{Error, ErrorKind, Result};
pub use log::LogSink;
pub use notification::Notification;
#[cfg(feature = "test-utils")]
pub use recording::RecordingSink;
pub use service::{DeliverySummary, NotificationService};

/// Tracing target for notification delivery.
pub const TRACING_TARGET: &str = "modelgate_notify";

/// Core trait for notification sinks.
///
/// Implement this trait to deliver pipeline notifications to a new channel.
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// Short sink name used in logs.
    fn name(&self) -> &str;

    /// Delivers one notification.
    async fn send(&self, notification: &Notification) -> Result<()>;
}
