//! Run state machine.
//!
//! ```text
//! Init ─► Training ─► Evaluating ─► Deploying ─► Validating ─► Done
//!  │          │            │  │          │             │
//!  │          ▼            │  ▼          ▼             ▼
//!  │        Failed         │ Skipped   Failed |     Failed |
//!  │                       ▼           RolledBack    RolledBack
//!  └──────────────► Validating        Done (deployment not requested)
//! ```
//!
//! A run that has to look up its training job or endpoint first goes from
//! `Init` straight to `Failed` when nothing is found.
//!
//! [`RunState::transition`] is a pure function; the orchestrator performs the
//! side effects and feeds the outcome back in as a [`RunEvent`].

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, IntoStaticStr};
use thiserror::Error;

/// State of a pipeline run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display, IntoStaticStr)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunState {
    /// Created, nothing started.
    #[default]
    Init,
    /// Waiting for the training job.
    Training,
    /// Comparing accuracy against the thresholds.
    Evaluating,
    /// Provisioning the new endpoint.
    Deploying,
    /// Checking the endpoint.
    Validating,
    /// Promotion completed and validated.
    Done,
    /// The gate declined promotion.
    Skipped,
    /// Promotion failed and was reverted to the previous endpoint.
    RolledBack,
    /// The run failed.
    Failed,
}

impl RunState {
    /// Returns whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Done | Self::Skipped | Self::RolledBack | Self::Failed
        )
    }

    /// Returns whether the run ended in a successful outcome.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Done | Self::Skipped)
    }

    /// Process exit code for a terminal state.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        if self.is_success() { 0 } else { 1 }
    }

    /// Computes the next state for an event.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] when the event is not accepted in the
    /// current state.
    pub fn transition(self, event: RunEvent) -> Result<Self, InvalidTransition> {
        use RunEvent as E;
        use RunState as S;

        let next = match (self, event) {
            (S::Init, E::Start) => S::Training,
            (S::Init, E::EndpointAttached) => S::Validating,
            (S::Init, E::LookupFailed) => S::Failed,
            (S::Training, E::TrainingSucceeded) => S::Evaluating,
            (S::Training, E::TrainingFailed) => S::Failed,
            (S::Evaluating, E::PromotionApproved) => S::Deploying,
            (S::Evaluating, E::PromotionDeclined) => S::Skipped,
            (S::Evaluating, E::PromotionDeferred) => S::Done,
            (S::Deploying, E::DeploymentSucceeded) => S::Validating,
            (S::Deploying, E::DeploymentFailed { rolled_back }) => failed_or_rolled_back(rolled_back),
            (S::Validating, E::ValidationPassed) => S::Done,
            (S::Validating, E::ValidationFailed { rolled_back }) => failed_or_rolled_back(rolled_back),
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

const fn failed_or_rolled_back(rolled_back: bool) -> RunState {
    if rolled_back {
        RunState::RolledBack
    } else {
        RunState::Failed
    }
}

/// Outcome fed into the state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[serde(tag = "event", rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RunEvent {
    /// A new training job is started or an existing one attached.
    Start,
    /// An existing endpoint is validated without training or deployment.
    EndpointAttached,
    /// No training job or endpoint to attach to was found.
    LookupFailed,
    /// The training job succeeded.
    TrainingSucceeded,
    /// The training job failed, stopped or timed out.
    TrainingFailed,
    /// The gate approved promotion.
    PromotionApproved,
    /// The gate declined promotion.
    PromotionDeclined,
    /// The gate approved promotion but this run does not deploy.
    PromotionDeferred,
    /// The endpoint is in service.
    DeploymentSucceeded,
    /// The endpoint failed or timed out.
    DeploymentFailed { rolled_back: bool },
    /// The endpoint passed validation.
    ValidationPassed,
    /// The endpoint failed validation.
    ValidationFailed { rolled_back: bool },
}

/// An event that is not accepted in the current state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("event {event} is not valid in state {from}")]
pub struct InvalidTransition {
    /// State the run was in.
    pub from: RunState,
    /// Rejected event.
    pub event: RunEvent,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_complete_happy_path() {
        let state = RunState::Init
            .transition(RunEvent::Start)
            .and_then(|s| s.transition(RunEvent::TrainingSucceeded))
            .and_then(|s| s.transition(RunEvent::PromotionApproved))
            .and_then(|s| s.transition(RunEvent::DeploymentSucceeded))
            .and_then(|s| s.transition(RunEvent::ValidationPassed))
            .unwrap();

        assert_eq!(state, RunState::Done);
        assert!(state.is_terminal());
        assert_eq!(state.exit_code(), 0);
    }

    #[test]
    fn test_rollback_routing() {
        let deploy = RunState::Deploying;
        assert_eq!(
            deploy.transition(RunEvent::DeploymentFailed { rolled_back: true }),
            Ok(RunState::RolledBack)
        );
        assert_eq!(
            deploy.transition(RunEvent::DeploymentFailed { rolled_back: false }),
            Ok(RunState::Failed)
        );

        let validate = RunState::Validating;
        assert_eq!(
            validate.transition(RunEvent::ValidationFailed { rolled_back: true }),
            Ok(RunState::RolledBack)
        );
        assert_eq!(RunState::RolledBack.exit_code(), 1);
    }

    #[test]
    fn test_terminal_states_reject_events() {
        for state in [
            RunState::Done,
            RunState::Skipped,
            RunState::RolledBack,
            RunState::Failed,
        ] {
            assert!(state.transition(RunEvent::Start).is_err());
            assert!(state.transition(RunEvent::ValidationPassed).is_err());
        }
    }

    #[test]
    fn test_failed_lookup_ends_run() {
        assert_eq!(
            RunState::Init.transition(RunEvent::LookupFailed),
            Ok(RunState::Failed)
        );
        assert!(RunState::Training.transition(RunEvent::LookupFailed).is_err());
    }

    #[test]
    fn test_training_failure_never_deploys() {
        let state = RunState::Training
            .transition(RunEvent::TrainingFailed)
            .unwrap();

        assert_eq!(state, RunState::Failed);
        let error = RunState::Training
            .transition(RunEvent::PromotionApproved)
            .unwrap_err();
        assert_eq!(error.from, RunState::Training);
    }
}
