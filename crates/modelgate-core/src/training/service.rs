//! Training service wrapper with observability.

use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use super::{JobStatus, JobSummary, TRACING_TARGET, TrainingProvider, TrainingRequest};
use crate::Result;

/// Training service wrapper with observability.
///
/// This wrapper adds structured logging to any training backend.
/// The inner provider is wrapped in `Arc` for cheap cloning.
#[derive(Clone)]
pub struct TrainingService {
    inner: Arc<dyn TrainingProvider>,
}

impl fmt::Debug for TrainingService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrainingService").finish_non_exhaustive()
    }
}

impl TrainingService {
    /// Create a new training service wrapper.
    pub fn new<P>(provider: P) -> Self
    where
        P: TrainingProvider + 'static,
    {
        Self {
            inner: Arc::new(provider),
        }
    }

    /// Submits a training job.
    pub async fn submit(&self, request: &TrainingRequest) -> Result<String> {
        let started_at = Instant::now();

        tracing::debug!(
            target: TRACING_TARGET,
            job_name = %request.job_name,
            model_name = %request.model_name,
            instance_type = %request.instance_type,
            "Submitting training job"
        );

        let result = self.inner.submit(request).await;
        let elapsed = started_at.elapsed();

        match &result {
            Ok(job_id) => tracing::info!(
                target: TRACING_TARGET,
                job_name = %request.job_name,
                job_id = %job_id,
                elapsed_ms = elapsed.as_millis(),
                "Training job submitted"
            ),
            Err(error) => tracing::error!(
                target: TRACING_TARGET,
                job_name = %request.job_name,
                error = %error,
                elapsed_ms = elapsed.as_millis(),
                "Training job submission failed"
            ),
        }

        result
    }

    /// Returns the current status of a training job.
    pub async fn get_status(&self, job_id: &str) -> Result<JobStatus> {
        let result = self.inner.get_status(job_id).await;

        match &result {
            Ok(status) => tracing::debug!(
                target: TRACING_TARGET,
                job_id = %job_id,
                state = %status.state,
                "Training job status"
            ),
            Err(error) => tracing::warn!(
                target: TRACING_TARGET,
                job_id = %job_id,
                error = %error,
                retryable = error.is_retryable(),
                "Training job status request failed"
            ),
        }

        result
    }

    /// Lists known training jobs.
    pub async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        let result = self.inner.list_jobs().await;

        match &result {
            Ok(jobs) => tracing::debug!(
                target: TRACING_TARGET,
                count = jobs.len(),
                "Listed training jobs"
            ),
            Err(error) => tracing::warn!(
                target: TRACING_TARGET,
                error = %error,
                "Training job listing failed"
            ),
        }

        result
    }
}
