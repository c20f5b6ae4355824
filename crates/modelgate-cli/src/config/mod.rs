//! CLI configuration management.
//!
//! ```text
//! Cli
//! ├── pipeline: PipelineArgs       # config file, thresholds, timeouts
//! ├── run: RunArgs                 # mode, job/endpoint ids, output file
//! ├── logging: LoggingArgs         # verbosity, log format
//! ├── backend: BackendArgs         # http or mock services
//! └── webhook: WebhookConfig       # notification webhook
//! ```
//!
//! All configuration can be provided via CLI arguments or environment
//! variables. Use `--help` to see all available options.

mod backend;
mod pipeline;
mod run;

use std::process;

use clap::{Args, Parser};
use modelgate_notify::webhook::WebhookConfig;

pub use self::backend::{BackendArgs, create_notifications};
pub use self::pipeline::PipelineArgs;
pub use self::run::RunArgs;
use crate::telemetry::LogFormat;
use crate::{TRACING_TARGET_CONFIG, TRACING_TARGET_STARTUP};

/// Complete CLI configuration.
#[derive(Debug, Clone, Parser)]
#[command(name = "modelgate")]
#[command(about = "Train, gate, deploy and validate a model with automatic rollback")]
#[command(version)]
pub struct Cli {
    /// Pipeline settings.
    #[command(flatten)]
    pub pipeline: PipelineArgs,

    /// Run selection.
    #[command(flatten)]
    pub run: RunArgs,

    /// Logging options.
    #[command(flatten)]
    pub logging: LoggingArgs,

    /// Service backend.
    #[command(flatten)]
    pub backend: BackendArgs,

    /// Notification webhook.
    #[command(flatten)]
    pub webhook: WebhookConfig,
}

/// Logging options.
#[derive(Debug, Clone, Args)]
pub struct LoggingArgs {
    /// Log at debug level unless RUST_LOG is set
    #[arg(short, long)]
    pub verbose: bool,

    /// Log output format
    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Text)]
    pub log_format: LogFormat,
}

impl Cli {
    /// Loads environment variables from .env file (if enabled) and parses CLI arguments.
    ///
    /// The .env file is loaded before clap parses arguments, so its values
    /// act as environment defaults.
    pub fn init() -> Self {
        Self::load_dotenv();
        Self::parse()
    }

    #[cfg(feature = "dotenv")]
    fn load_dotenv() {
        if let Err(err) = dotenvy::dotenv()
            && !err.not_found()
        {
            eprintln!("Warning: failed to load .env file: {err}");
        }
    }

    #[cfg(not(feature = "dotenv"))]
    fn load_dotenv() {}

    /// Logs build information and the run selection (no secrets).
    pub fn log(&self) {
        tracing::debug!(
            target: TRACING_TARGET_STARTUP,
            version = env!("CARGO_PKG_VERSION"),
            pid = process::id(),
            arch = std::env::consts::ARCH,
            os = std::env::consts::OS,
            features = ?Self::enabled_features(),
            "Build information"
        );

        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            mode = %self.run.mode,
            backend = ?self.backend.backend,
            config_file = ?self.pipeline.config_file,
            output_file = ?self.run.output_file,
            webhook = self.webhook.webhook_url.is_some(),
            "Run configuration"
        );
    }

    /// Returns a list of enabled compile-time features.
    fn enabled_features() -> Vec<&'static str> {
        [
            cfg!(feature = "dotenv").then_some("dotenv"),
            cfg!(feature = "mock").then_some("mock"),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}
