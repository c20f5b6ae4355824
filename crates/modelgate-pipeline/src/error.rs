//! Stage and configuration error types.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, IntoStaticStr};
use thiserror::Error;

/// Result type alias for configuration loading.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Failure of a single pipeline stage.
///
/// Stage errors never escape the orchestrator: each one routes the run into
/// a terminal state and is recorded in the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[derive(AsRefStr, IntoStaticStr)]
#[serde(tag = "kind", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum StageError {
    /// The training job reached a failed or stopped terminal state, or could
    /// not be submitted.
    #[error("training job {job} failed: {reason}")]
    TrainingFailed { job: String, reason: String },

    /// The training job did not finish before the deadline.
    #[error("training job {job} did not finish within {}s", .waited_secs)]
    TrainingTimeout { job: String, waited_secs: u64 },

    /// The endpoint could not be provisioned.
    #[error("deployment of endpoint {endpoint} failed: {reason}")]
    DeploymentFailed { endpoint: String, reason: String },

    /// The endpoint did not become servable before the deadline.
    #[error("endpoint {endpoint} was not in service within {}s", .waited_secs)]
    DeploymentTimeout { endpoint: String, waited_secs: u64 },

    /// The training job or endpoint a run attaches to could not be found.
    #[error("{target} lookup failed: {reason}")]
    LookupFailed { target: String, reason: String },

    /// The deployed endpoint did not pass validation.
    #[error("validation of endpoint {endpoint} failed: {}", .issues.join("; "))]
    ValidationFailed {
        endpoint: String,
        issues: Vec<String>,
    },
}

impl StageError {
    /// Creates a timeout error for a training job.
    pub fn training_timeout(job: impl Into<String>, waited: Duration) -> Self {
        Self::TrainingTimeout {
            job: job.into(),
            waited_secs: waited.as_secs(),
        }
    }

    /// Creates a timeout error for an endpoint.
    pub fn deployment_timeout(endpoint: impl Into<String>, waited: Duration) -> Self {
        Self::DeploymentTimeout {
            endpoint: endpoint.into(),
            waited_secs: waited.as_secs(),
        }
    }

    /// Returns the error kind as a string.
    pub fn kind_str(&self) -> &'static str {
        self.into()
    }
}

/// Invalid or unreadable configuration.
///
/// Configuration errors are fatal and are raised before any run starts.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read configuration file {}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The configuration file is not valid JSON for the configuration schema.
    #[error("failed to parse configuration file {}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A fraction-valued setting is outside `[0, 1]`.
    #[error("{name} must be between 0 and 1, got {value}")]
    OutOfRange { name: &'static str, value: f64 },

    /// The minimum accuracy is above the promotion threshold.
    #[error("accuracy threshold ({target}) must be >= minimum accuracy ({minimum})")]
    ThresholdOrdering { minimum: f64, target: f64 },

    /// Any other invalid setting.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}
