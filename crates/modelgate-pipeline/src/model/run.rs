//! Pipeline run record and audit trail.

use std::fmt;
use std::path::Path;

use jiff::{SignedDuration, Timestamp};
use modelgate_core::training::TrainingRequest;
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};
use tokio::time::Instant;
use uuid::Uuid;

use super::{DeploymentResult, PromotionDecision, TrainingResult, ValidationReport};
use crate::TRACING_TARGET_RUN;
use crate::backoff::elapsed_since;
use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::state::{InvalidTransition, RunEvent, RunState};

/// Which part of the pipeline a run executes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[cfg_attr(feature = "config", derive(clap::ValueEnum))]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunMode {
    /// Train, gate, deploy and validate.
    #[default]
    Complete,
    /// Train and gate only.
    Training,
    /// Attach to an existing training job, then gate, deploy and validate.
    Deployment,
    /// Validate an existing endpoint only.
    Testing,
}

/// One state transition in the audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// When the transition happened.
    pub at: Timestamp,
    /// State before the transition.
    pub from: RunState,
    /// State after the transition.
    pub to: RunState,
    /// Event that caused the transition.
    #[serde(flatten)]
    pub event: RunEvent,
    /// Free-form context, such as a decision explanation or error message.
    pub detail: String,
}

/// Complete record of one pipeline run.
///
/// Built up stage by stage while the run progresses and immutable once the
/// run reached a terminal state. Serializes to JSON without loss.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PipelineRun {
    /// Unique, time-ordered run identifier.
    pub run_id: Uuid,
    /// Which part of the pipeline was executed.
    pub mode: RunMode,
    /// Final (or current) state.
    pub state: RunState,
    /// When the run started.
    pub started_at: Timestamp,
    /// When the run reached its terminal state.
    pub finished_at: Option<Timestamp>,
    /// Wall-clock duration of the run.
    pub total_duration: SignedDuration,
    /// Training job submitted by this run.
    pub training_request: Option<TrainingRequest>,
    /// Outcome of the training job.
    pub training: Option<TrainingResult>,
    /// Gate decision.
    pub decision: Option<PromotionDecision>,
    /// Deployment attempt.
    pub deployment: Option<DeploymentResult>,
    /// Endpoint validation.
    pub validation: Option<ValidationReport>,
    /// Stage failure that ended the run.
    pub error: Option<StageError>,
    /// Every state transition, oldest first.
    pub audit: Vec<AuditEntry>,
    /// Configuration the run was executed with.
    pub config: PipelineConfig,
}

impl PipelineRun {
    /// Creates a run in the initial state.
    pub fn new(mode: RunMode, config: PipelineConfig) -> Self {
        Self {
            run_id: Uuid::now_v7(),
            mode,
            state: RunState::Init,
            started_at: Timestamp::now(),
            finished_at: None,
            total_duration: SignedDuration::ZERO,
            training_request: None,
            training: None,
            decision: None,
            deployment: None,
            validation: None,
            error: None,
            audit: Vec::new(),
            config,
        }
    }

    /// Returns whether the run ended in a successful outcome.
    pub fn is_success(&self) -> bool {
        self.state.is_success()
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        self.state.exit_code()
    }

    /// Notification event name for a finished run.
    pub fn notification_event(&self) -> Option<&'static str> {
        match self.state {
            RunState::Done => Some("pipeline.done"),
            RunState::Skipped => Some("pipeline.skipped"),
            RunState::RolledBack => Some("pipeline.rolled_back"),
            RunState::Failed => Some("pipeline.failed"),
            _ => None,
        }
    }

    /// Serializes the run as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Parses a run from JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is not a valid run record.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    /// Writes the run as JSON to a file.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to(&self, path: impl AsRef<Path>) -> modelgate_core::Result<()> {
        let path = path.as_ref();
        std::fs::write(path, self.to_json()?)?;

        tracing::debug!(
            target: TRACING_TARGET_RUN,
            run_id = %self.run_id,
            path = %path.display(),
            "Run record written"
        );

        Ok(())
    }
}

impl fmt::Display for PipelineRun {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Pipeline run {} ({})", self.run_id, self.mode)?;
        writeln!(f, "  status:   {}", self.state)?;
        writeln!(f, "  duration: {:#}", self.total_duration)?;

        if let Some(training) = &self.training {
            writeln!(f, "  training: {} ({})", training.job_id, training.status)?;
            for (name, value) in &training.evaluation_metrics {
                writeln!(f, "    {name}: {value:.4}")?;
            }
        }

        if let Some(decision) = &self.decision {
            writeln!(f, "  decision: {} ({})", decision.reason, decision.explain())?;
        }

        if let Some(deployment) = &self.deployment {
            writeln!(
                f,
                "  endpoint: {} ({})",
                deployment.endpoint_name, deployment.status
            )?;
            if let Some(previous) = &deployment.previous_endpoint_name {
                writeln!(f, "    previous: {previous}")?;
            }
            if let Some(rollback) = &deployment.rollback {
                let outcome = if rollback.succeeded { "succeeded" } else { "failed" };
                writeln!(
                    f,
                    "    rollback to {}: {outcome}",
                    rollback.restored_endpoint
                )?;
            }
        }

        if let Some(validation) = &self.validation {
            writeln!(
                f,
                "  validation: {} ({}/{} correct, success rate {:.2})",
                validation.overall_status,
                validation.samples_correct,
                validation.samples_total,
                validation.success_rate
            )?;
            if let Some(latency) = &validation.latency {
                writeln!(
                    f,
                    "    latency: mean {}ms, p95 {}ms",
                    latency.mean.as_millis(),
                    latency.p95.as_millis()
                )?;
            }
            for issue in &validation.issues {
                writeln!(f, "    issue: {issue}")?;
            }
        }

        if let Some(error) = &self.error {
            writeln!(f, "  error: {error}")?;
        }

        Ok(())
    }
}

/// Drives a [`PipelineRun`] through the state machine.
///
/// Every accepted event moves the run to its next state and appends an audit
/// entry; `finish` seals the record.
#[derive(Debug)]
pub(crate) struct RunRecorder {
    run: PipelineRun,
    started_at: Instant,
}

impl RunRecorder {
    pub(crate) fn new(mode: RunMode, config: PipelineConfig) -> Self {
        let run = PipelineRun::new(mode, config);

        tracing::info!(
            target: TRACING_TARGET_RUN,
            run_id = %run.run_id,
            mode = %run.mode,
            "Pipeline run started"
        );

        Self {
            run,
            started_at: Instant::now(),
        }
    }

    pub(crate) fn run_mut(&mut self) -> &mut PipelineRun {
        &mut self.run
    }

    /// Applies an event and records the transition.
    pub(crate) fn apply(
        &mut self,
        event: RunEvent,
        detail: impl Into<String>,
    ) -> Result<RunState, InvalidTransition> {
        let from = self.run.state;
        let to = from.transition(event)?;
        let detail = detail.into();

        tracing::info!(
            target: TRACING_TARGET_RUN,
            run_id = %self.run.run_id,
            from = %from,
            to = %to,
            event = %event,
            detail = %detail,
            "State transition"
        );

        self.run.state = to;
        self.run.audit.push(AuditEntry {
            at: Timestamp::now(),
            from,
            to,
            event,
            detail,
        });

        Ok(to)
    }

    /// Records the stage error that ends the run.
    pub(crate) fn fail_with(&mut self, error: StageError) {
        self.run.error = Some(error);
    }

    /// Seals the run record.
    pub(crate) fn finish(mut self) -> PipelineRun {
        self.run.finished_at = Some(Timestamp::now());
        self.run.total_duration = elapsed_since(self.started_at);

        tracing::info!(
            target: TRACING_TARGET_RUN,
            run_id = %self.run.run_id,
            state = %self.run.state,
            elapsed_secs = self.run.total_duration.as_secs(),
            transitions = self.run.audit.len(),
            "Pipeline run finished"
        );

        self.run
    }
}
