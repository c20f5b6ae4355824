//! Training job outcome.

use std::collections::BTreeMap;

use jiff::SignedDuration;
use modelgate_core::training::{JobState, JobStatus};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Terminal status of a training job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum TrainingStatus {
    /// The job produced a model artifact.
    Succeeded,
    /// The job failed.
    Failed,
    /// The job was stopped before completion.
    Stopped,
}

impl TrainingStatus {
    /// Maps a terminal job state, returning `None` for non-terminal states.
    pub fn from_job_state(state: JobState) -> Option<Self> {
        match state {
            JobState::Succeeded => Some(Self::Succeeded),
            JobState::Failed => Some(Self::Failed),
            JobState::Stopped => Some(Self::Stopped),
            JobState::Pending | JobState::InProgress => None,
        }
    }
}

/// Result of one training job, produced once the job reached a terminal state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingResult {
    /// Service-assigned job identifier.
    pub job_id: String,
    /// Terminal status.
    pub status: TrainingStatus,
    /// Location of the produced model artifact.
    pub model_artifact_location: Option<String>,
    /// Final evaluation metrics keyed by metric name.
    pub evaluation_metrics: BTreeMap<String, f64>,
    /// Failure reason reported by the service.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Time spent waiting for the job.
    pub duration: SignedDuration,
}

impl TrainingResult {
    /// Builds a result from a terminal job status.
    ///
    /// Returns `None` when the status is not terminal.
    pub fn from_status(status: JobStatus, duration: SignedDuration) -> Option<Self> {
        let terminal = TrainingStatus::from_job_state(status.state)?;

        Some(Self {
            job_id: status.job_id,
            status: terminal,
            model_artifact_location: status.artifact_location,
            evaluation_metrics: status.metrics,
            failure_reason: status.failure_reason,
            duration,
        })
    }

    /// Returns whether the job succeeded.
    pub fn is_success(&self) -> bool {
        self.status == TrainingStatus::Succeeded
    }

    /// Looks up the measured accuracy.
    ///
    /// Reads `metric`, then `fallback`; a missing metric measures as 0.0.
    pub fn accuracy(&self, metric: &str, fallback: Option<&str>) -> f64 {
        self.evaluation_metrics
            .get(metric)
            .or_else(|| fallback.and_then(|name| self.evaluation_metrics.get(name)))
            .copied()
            .unwrap_or(0.0)
    }
}
