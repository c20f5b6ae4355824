//! Training job submission and polling.

use modelgate_core::training::{JobState, JobStatus, TrainingRequest, TrainingService};
use tokio::time::Instant;

use crate::backoff::{PollError, PollPolicy, elapsed_since, poll_until};
use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::model::TrainingResult;

/// Tracing target for training operations.
pub const TRACING_TARGET: &str = "modelgate_pipeline::trainer";

/// Runs training jobs on the training service.
///
/// A submission is never retried. Status polling backs off exponentially and
/// stops at the configured deadline; a job that times out keeps running on
/// the remote side, since the training service offers no cancellation.
#[derive(Debug, Clone)]
pub struct Trainer {
    service: TrainingService,
    poll: PollPolicy,
}

impl Trainer {
    /// Creates a new trainer.
    pub fn new(service: TrainingService, poll: PollPolicy) -> Self {
        Self { service, poll }
    }

    /// Creates a trainer using the configured polling policy.
    pub fn from_config(service: TrainingService, config: &PipelineConfig) -> Self {
        Self::new(service, config.training_poll())
    }

    /// Builds the training request described by a configuration.
    pub fn request_from_config(config: &PipelineConfig, role: Option<&str>) -> TrainingRequest {
        let request = TrainingRequest::new(
            &config.model_name_prefix,
            &config.instance_type,
            &config.input_data_location,
        )
        .with_hyperparameters(config.hyperparameters.clone());

        match role {
            Some(role) => request.with_role(role),
            None => request,
        }
    }

    /// Submits a job and waits for it to succeed.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::TrainingFailed`] when the job cannot be submitted
    /// or ends failed or stopped, and [`StageError::TrainingTimeout`] when it
    /// does not finish in time.
    pub async fn train(&self, request: &TrainingRequest) -> Result<TrainingResult, StageError> {
        let job_id = self.submit(request).await?;
        let result = self.wait(&job_id).await?;
        ensure_succeeded(&result)?;
        Ok(result)
    }

    /// Submits a job and returns its id.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::TrainingFailed`] when the service rejects the job.
    pub async fn submit(&self, request: &TrainingRequest) -> Result<String, StageError> {
        self.service
            .submit(request)
            .await
            .map_err(|error| StageError::TrainingFailed {
                job: request.job_name.clone(),
                reason: error.to_string(),
            })
    }

    /// Finds the newest succeeded training job.
    ///
    /// Jobs named `{prefix}-...` are preferred. When none of them succeeded,
    /// the newest succeeded job of any name is returned.
    ///
    /// # Errors
    ///
    /// Returns an error if the jobs cannot be listed.
    pub async fn find_latest_completed(&self, prefix: &str) -> modelgate_core::Result<Option<String>> {
        let prefix = format!("{prefix}-");
        let succeeded: Vec<_> = self
            .service
            .list_jobs()
            .await?
            .into_iter()
            .filter(|job| job.state == JobState::Succeeded)
            .collect();

        let latest = succeeded
            .iter()
            .filter(|job| job.job_id.starts_with(&prefix))
            .max_by_key(|job| job.created_at)
            .or_else(|| succeeded.iter().max_by_key(|job| job.created_at))
            .map(|job| job.job_id.clone());

        tracing::debug!(
            target: TRACING_TARGET,
            prefix = %prefix,
            job_id = latest.as_deref().unwrap_or("none"),
            "Latest completed training job lookup"
        );

        Ok(latest)
    }

    /// Polls a job until it reaches any terminal state.
    ///
    /// Failed and stopped jobs are returned as results so that their metrics
    /// and failure reason can be recorded.
    ///
    /// # Errors
    ///
    /// Returns [`StageError::TrainingTimeout`] when the deadline passes, and
    /// [`StageError::TrainingFailed`] when status requests fail in a way that
    /// retrying cannot fix.
    pub async fn wait(&self, job_id: &str) -> Result<TrainingResult, StageError> {
        let started_at = Instant::now();

        tracing::info!(
            target: TRACING_TARGET,
            job_id = %job_id,
            timeout_secs = self.poll.timeout.as_secs(),
            "Waiting for training job"
        );

        let service = &self.service;
        let status = poll_until(&self.poll, job_id, move || async move {
            let status = service.get_status(job_id).await?;
            Ok(status.state.is_terminal().then_some(status))
        })
        .await
        .map_err(|error| match error {
            PollError::Timeout { waited, .. } => StageError::training_timeout(job_id, waited),
            PollError::Fatal(error) => StageError::TrainingFailed {
                job: job_id.to_owned(),
                reason: error.to_string(),
            },
        });

        let status: JobStatus = match status {
            Ok(status) => status,
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    job_id = %job_id,
                    error = %error,
                    "Training job did not complete"
                );
                return Err(error);
            }
        };

        let duration = elapsed_since(started_at);
        let result = TrainingResult::from_status(status, duration).ok_or_else(|| {
            StageError::TrainingFailed {
                job: job_id.to_owned(),
                reason: "training service reported a non-terminal state".to_owned(),
            }
        })?;

        tracing::info!(
            target: TRACING_TARGET,
            job_id = %job_id,
            status = %result.status,
            elapsed_secs = duration.as_secs(),
            metrics = result.evaluation_metrics.len(),
            "Training job finished"
        );

        Ok(result)
    }
}

/// Converts a failed or stopped result into a stage error.
///
/// # Errors
///
/// Returns [`StageError::TrainingFailed`] unless the job succeeded.
pub fn ensure_succeeded(result: &TrainingResult) -> Result<(), StageError> {
    if result.is_success() {
        return Ok(());
    }

    let reason = result
        .failure_reason
        .clone()
        .unwrap_or_else(|| format!("job ended {}", result.status));

    Err(StageError::TrainingFailed {
        job: result.job_id.clone(),
        reason,
    })
}
