//! Signed HTTP webhook sink.
//!
//! # Example
//!
//! ```rust,ignore
//! use modelgate_notify::NotificationService;
//! use modelgate_notify::webhook::{WebhookConfig, WebhookSink};
//!
//! let config = WebhookConfig::default().with_secret("s3cret");
//! let sink = WebhookSink::new("https://hooks.example.com/modelgate".parse()?, config)?;
//! let service = NotificationService::new().with_sink(sink);
//! ```

mod config;
mod error;
mod sink;

pub use config::WebhookConfig;
pub use error::{Error, Result};
pub use sink::WebhookSink;

/// Tracing target for webhook delivery.
pub const TRACING_TARGET: &str = "modelgate_notify::webhook";
