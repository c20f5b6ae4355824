#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

pub mod backoff;
pub mod config;
pub mod deployer;
mod error;
pub mod gate;
pub mod model;
pub mod orchestrator;
pub mod state;
pub mod trainer;
pub mod validator;

pub use config::{PipelineConfig, ValidationConfig};
pub use error::{ConfigError, ConfigResult, StageError};
pub use model::{PipelineRun, RunMode};
pub use orchestrator::{Orchestrator, RunPlan};
pub use state::{InvalidTransition, RunEvent, RunState};

/// Tracing target for configuration loading.
pub const TRACING_TARGET_CONFIG: &str = "modelgate_pipeline::config";

/// Tracing target for run lifecycle events.
pub const TRACING_TARGET_RUN: &str = "modelgate_pipeline::run";
