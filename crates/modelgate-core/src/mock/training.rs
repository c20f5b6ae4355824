//! Scripted in-memory training provider.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use jiff::Timestamp;

use crate::training::{
    JobState, JobStatus, JobSummary, TrainingProvider, TrainingRequest, TrainingService,
};
use crate::{Error, Result};

/// One scripted answer to a `get_status` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MockStep {
    /// Report the job in the given state.
    State(JobState),
    /// Fail the status request with a retryable network error.
    TransportError,
}

#[derive(Debug)]
struct MockTrainingInner {
    script: Mutex<VecDeque<MockStep>>,
    metrics: Vec<(String, f64)>,
    jobs: Vec<JobSummary>,
    fail_submit: bool,
    submit_calls: AtomicUsize,
    status_calls: AtomicUsize,
}

/// Training provider that replays a scripted sequence of job states.
///
/// The last scripted step repeats forever, so a script ending in
/// [`JobState::InProgress`] models a job that never finishes. Clones share
/// the script and the call counters.
#[derive(Debug, Clone)]
pub struct MockTrainingProvider {
    inner: Arc<MockTrainingInner>,
}

impl MockTrainingProvider {
    /// Creates a provider whose job succeeds on the second poll with the
    /// given accuracy.
    pub fn succeeding(accuracy: f64) -> Self {
        Self::from_parts(
            vec![
                MockStep::State(JobState::InProgress),
                MockStep::State(JobState::Succeeded),
            ],
            vec![("accuracy".to_owned(), accuracy)],
            false,
        )
    }

    /// Creates a provider whose job ends in the given terminal state.
    pub fn ending_in(state: JobState) -> Self {
        Self::from_parts(
            vec![MockStep::State(JobState::InProgress), MockStep::State(state)],
            Vec::new(),
            false,
        )
    }

    /// Creates a provider whose job never leaves [`JobState::InProgress`].
    pub fn never_finishing() -> Self {
        Self::from_parts(
            vec![MockStep::State(JobState::InProgress)],
            Vec::new(),
            false,
        )
    }

    /// Creates a provider that rejects every submission.
    pub fn rejecting() -> Self {
        Self::from_parts(Vec::new(), Vec::new(), true)
    }

    /// Creates a provider from an explicit script.
    pub fn with_script(steps: Vec<MockStep>) -> Self {
        Self::from_parts(steps, Vec::new(), false)
    }

    fn from_parts(steps: Vec<MockStep>, metrics: Vec<(String, f64)>, fail_submit: bool) -> Self {
        let inner = MockTrainingInner {
            script: Mutex::new(steps.into()),
            metrics,
            jobs: Vec::new(),
            fail_submit,
            submit_calls: AtomicUsize::new(0),
            status_calls: AtomicUsize::new(0),
        };

        Self {
            inner: Arc::new(inner),
        }
    }

    /// Adds a metric reported once the job succeeds.
    ///
    /// Only effective before the provider is cloned.
    pub fn with_metric(mut self, name: impl Into<String>, value: f64) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.metrics.push((name.into(), value));
        }
        self
    }

    /// Adds a job reported by `list_jobs`.
    ///
    /// Only effective before the provider is cloned.
    pub fn with_job(mut self, job_id: impl Into<String>, state: JobState, created_at: Timestamp) -> Self {
        if let Some(inner) = Arc::get_mut(&mut self.inner) {
            inner.jobs.push(JobSummary::new(job_id, state, created_at));
        }
        self
    }

    /// Number of `submit` calls received.
    pub fn submit_calls(&self) -> usize {
        self.inner.submit_calls.load(Ordering::SeqCst)
    }

    /// Number of `get_status` calls received.
    pub fn status_calls(&self) -> usize {
        self.inner.status_calls.load(Ordering::SeqCst)
    }

    /// Converts this provider into a [`TrainingService`].
    pub fn into_service(self) -> TrainingService {
        TrainingService::new(self)
    }

    fn next_step(&self) -> Option<MockStep> {
        let mut script = self
            .inner
            .script
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        if script.len() > 1 {
            script.pop_front()
        } else {
            script.front().copied()
        }
    }
}

#[async_trait::async_trait]
impl TrainingProvider for MockTrainingProvider {
    async fn submit(&self, request: &TrainingRequest) -> Result<String> {
        self.inner.submit_calls.fetch_add(1, Ordering::SeqCst);

        if self.inner.fail_submit {
            return Err(Error::external_error().with_message("mock submission rejected"));
        }

        Ok(request.job_name.clone())
    }

    async fn get_status(&self, job_id: &str) -> Result<JobStatus> {
        self.inner.status_calls.fetch_add(1, Ordering::SeqCst);

        let state = match self.next_step() {
            Some(MockStep::State(state)) => state,
            Some(MockStep::TransportError) => {
                return Err(Error::network_error().with_message("mock connection reset"));
            }
            None => return Err(Error::not_found().with_message(format!("job {job_id}"))),
        };

        let mut status = JobStatus::new(job_id, state);
        match state {
            JobState::Succeeded => {
                status = status.with_artifact(format!("mock://artifacts/{job_id}/model.tar.gz"));
                for (name, value) in &self.inner.metrics {
                    status = status.with_metric(name.clone(), *value);
                }
            }
            JobState::Failed => status = status.with_failure_reason("mock algorithm error"),
            JobState::Stopped => status = status.with_failure_reason("mock job stopped"),
            JobState::Pending | JobState::InProgress => {}
        }

        Ok(status)
    }

    async fn list_jobs(&self) -> Result<Vec<JobSummary>> {
        Ok(self.inner.jobs.clone())
    }
}
