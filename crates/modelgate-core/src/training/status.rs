//! Training job status reported by the training service.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Lifecycle state of a remote training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum JobState {
    /// Accepted but not started yet.
    Pending,
    /// Running.
    InProgress,
    /// Finished and produced a model artifact.
    Succeeded,
    /// Finished with an error.
    Failed,
    /// Stopped before completion.
    Stopped,
}

impl JobState {
    /// Returns whether the job can no longer change state.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Stopped)
    }
}

/// Snapshot of a training job as returned by `get_status`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Service-assigned job identifier.
    pub job_id: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// Final evaluation metrics, populated once the job succeeded.
    #[serde(default)]
    pub metrics: BTreeMap<String, f64>,
    /// Location of the produced model artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub artifact_location: Option<String>,
    /// Failure reason reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl JobStatus {
    /// Creates a status snapshot without metrics or artifact.
    pub fn new(job_id: impl Into<String>, state: JobState) -> Self {
        Self {
            job_id: job_id.into(),
            state,
            metrics: BTreeMap::new(),
            artifact_location: None,
            failure_reason: None,
        }
    }

    /// Adds a metric value.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        self.metrics.insert(name.into(), value);
        self
    }

    /// Sets the artifact location.
    pub fn with_artifact(mut self, location: impl Into<String>) -> Self {
        self.artifact_location = Some(location.into());
        self
    }

    /// Sets the failure reason.
    pub fn with_failure_reason(mut self, reason: impl Into<String>) -> Self {
        self.failure_reason = Some(reason.into());
        self
    }
}

/// Listing entry for a training job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSummary {
    /// Service-assigned job identifier.
    pub job_id: String,
    /// Current lifecycle state.
    pub state: JobState,
    /// Creation time.
    pub created_at: Timestamp,
}

impl JobSummary {
    /// Creates a new listing entry.
    pub fn new(job_id: impl Into<String>, state: JobState, created_at: Timestamp) -> Self {
        Self {
            job_id: job_id.into(),
            state,
            created_at,
        }
    }
}
