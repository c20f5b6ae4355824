//! Endpoint deployment and rollback outcomes.

use jiff::{SignedDuration, Timestamp};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Final status of a deployment attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DeploymentStatus {
    /// The endpoint is serving.
    InService,
    /// Provisioning failed or timed out.
    Failed,
    /// The attempt was reverted to the previous endpoint.
    RolledBack,
}

/// Result of one deployment attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeploymentResult {
    /// Name of the endpoint created by this attempt.
    pub endpoint_name: String,
    /// Final status of the attempt.
    pub status: DeploymentStatus,
    /// Endpoint this deployment was meant to replace.
    pub previous_endpoint_name: Option<String>,
    /// Time from creation request to the settled state.
    pub duration: SignedDuration,
    /// Failure reason, when the attempt failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
    /// Rollback details, when a rollback was attempted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rollback: Option<RollbackReport>,
}

impl DeploymentResult {
    /// Returns whether the endpoint is serving.
    pub fn is_in_service(&self) -> bool {
        self.status == DeploymentStatus::InService
    }

    /// Returns a copy of this result with a rollback attached.
    ///
    /// The status becomes [`DeploymentStatus::RolledBack`] only when the
    /// rollback succeeded; otherwise the attempt is recorded as failed.
    pub fn with_rollback(&self, report: RollbackReport) -> Self {
        let status = if report.succeeded {
            DeploymentStatus::RolledBack
        } else {
            DeploymentStatus::Failed
        };

        Self {
            status,
            rollback: Some(report),
            ..self.clone()
        }
    }
}

/// Outcome of a best-effort rollback.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollbackReport {
    /// Endpoint traffic stays on.
    pub restored_endpoint: String,
    /// Failed endpoint that was removed, if removal succeeded.
    pub deleted_endpoint: Option<String>,
    /// Whether the previous endpoint was confirmed in service.
    pub succeeded: bool,
    /// Errors met along the way.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    /// When the rollback finished.
    pub finished_at: Timestamp,
}
