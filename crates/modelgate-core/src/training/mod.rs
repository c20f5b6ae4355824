//! Training service abstraction.
//!
//! The training service is an external collaborator: it accepts a job
//! submission and reports job status on demand. It exposes no push
//! notifications, so callers poll [`TrainingService::get_status`].

mod request;
mod service;
mod status;

pub use request::TrainingRequest;
pub use service::TrainingService;
pub use status::{JobState, JobStatus, JobSummary};

use crate::Result;

/// Tracing target for training service operations.
pub const TRACING_TARGET: &str = "modelgate_core::training";

/// Core trait for training service implementations.
///
/// Implement this trait to plug a concrete training backend into the pipeline.
#[async_trait::async_trait]
pub trait TrainingProvider: Send + Sync {
    /// Submits a training job and returns the service-assigned job id.
    async fn submit(&self, request: &TrainingRequest) -> Result<String>;

    /// Returns the current status of a training job.
    async fn get_status(&self, job_id: &str) -> Result<JobStatus>;

    /// Lists known training jobs.
    async fn list_jobs(&self) -> Result<Vec<JobSummary>>;
}
