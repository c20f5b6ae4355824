//! Pipeline orchestration.
//!
//! The orchestrator sequences Trainer, Gate, Deployer and Validator, feeds
//! each outcome into the run state machine and performs rollback when a
//! promotion fails. Stage failures never escape as errors: every run ends in
//! a terminal state with a complete [`PipelineRun`] record.

use modelgate_core::endpoint::EndpointService;
use modelgate_core::training::TrainingService;
use modelgate_notify::{Notification, NotificationService};

use crate::config::PipelineConfig;
use crate::deployer::Deployer;
use crate::error::StageError;
use crate::gate::Gate;
use crate::model::{DeploymentResult, PipelineRun, RunMode, RunRecorder, TrainingResult};
use crate::state::{InvalidTransition, RunEvent};
use crate::trainer::{Trainer, ensure_succeeded};
use crate::validator::Validator;

/// Tracing target for orchestration.
pub const TRACING_TARGET: &str = "modelgate_pipeline::orchestrator";

/// What a run should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunPlan {
    /// Train, gate, deploy and validate.
    Complete {
        /// Role or credential reference for the training job.
        role: Option<String>,
        /// Endpoint being replaced; discovered when unset.
        production_endpoint: Option<String>,
    },
    /// Train and gate, without deploying.
    Training {
        /// Role or credential reference for the training job.
        role: Option<String>,
    },
    /// Gate, deploy and validate the model of an existing training job.
    Deployment {
        /// Training job to attach to; the latest completed job when unset.
        job_id: Option<String>,
        /// Endpoint being replaced; discovered when unset.
        production_endpoint: Option<String>,
    },
    /// Validate an existing endpoint.
    Testing {
        /// Endpoint to validate; the current production endpoint when unset.
        endpoint_name: Option<String>,
    },
}

impl RunPlan {
    /// Run mode this plan executes.
    pub fn mode(&self) -> RunMode {
        match self {
            Self::Complete { .. } => RunMode::Complete,
            Self::Training { .. } => RunMode::Training,
            Self::Deployment { .. } => RunMode::Deployment,
            Self::Testing { .. } => RunMode::Testing,
        }
    }
}

/// Runs the promotion pipeline against a training and an endpoint service.
#[derive(Debug, Clone)]
pub struct Orchestrator {
    config: PipelineConfig,
    trainer: Trainer,
    gate: Gate,
    deployer: Deployer,
    validator: Validator,
    notifications: NotificationService,
}

impl Orchestrator {
    /// Creates an orchestrator from a validated configuration.
    pub fn new(config: PipelineConfig, training: TrainingService, endpoints: EndpointService) -> Self {
        Self {
            trainer: Trainer::from_config(training, &config),
            gate: Gate::from_config(&config),
            deployer: Deployer::from_config(endpoints.clone(), &config),
            validator: Validator::new(endpoints, config.validation.clone()),
            notifications: NotificationService::new(),
            config,
        }
    }

    /// Sets the sinks notified when a run finishes.
    pub fn with_notifications(mut self, notifications: NotificationService) -> Self {
        self.notifications = notifications;
        self
    }

    /// Returns the configuration runs are executed with.
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Executes a run plan.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] only if the orchestrator feeds the state
    /// machine an event it does not accept, which indicates a bug. Stage
    /// failures are recorded in the returned run.
    pub async fn run(&self, plan: RunPlan) -> Result<PipelineRun, InvalidTransition> {
        match plan {
            RunPlan::Complete {
                role,
                production_endpoint,
            } => {
                self.run_complete(role.as_deref(), production_endpoint.as_deref())
                    .await
            }
            RunPlan::Training { role } => self.run_training(role.as_deref()).await,
            RunPlan::Deployment {
                job_id,
                production_endpoint,
            } => {
                self.run_deployment(job_id.as_deref(), production_endpoint.as_deref())
                    .await
            }
            RunPlan::Testing { endpoint_name } => self.run_testing(endpoint_name.as_deref()).await,
        }
    }

    /// Trains, gates, deploys and validates a new model.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run`].
    pub async fn run_complete(
        &self,
        role: Option<&str>,
        production_endpoint: Option<&str>,
    ) -> Result<PipelineRun, InvalidTransition> {
        let mut recorder = RunRecorder::new(RunMode::Complete, self.config.clone());

        match self.start_training(&mut recorder, role).await? {
            Some(job_id) => {
                self.continue_from_job(recorder, &job_id, true, production_endpoint)
                    .await
            }
            None => self.finish(recorder).await,
        }
    }

    /// Trains and gates a new model without deploying it.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run`].
    pub async fn run_training(&self, role: Option<&str>) -> Result<PipelineRun, InvalidTransition> {
        let mut recorder = RunRecorder::new(RunMode::Training, self.config.clone());

        match self.start_training(&mut recorder, role).await? {
            Some(job_id) => self.continue_from_job(recorder, &job_id, false, None).await,
            None => self.finish(recorder).await,
        }
    }

    /// Gates, deploys and validates the model of an existing training job.
    ///
    /// Without a job id, the newest completed job named after the model
    /// prefix is used, or else the newest completed job of any name.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run`].
    pub async fn run_deployment(
        &self,
        job_id: Option<&str>,
        production_endpoint: Option<&str>,
    ) -> Result<PipelineRun, InvalidTransition> {
        let mut recorder = RunRecorder::new(RunMode::Deployment, self.config.clone());

        let job_id = match job_id {
            Some(job_id) => job_id.to_owned(),
            None => match self.latest_training_job().await {
                Ok(job_id) => job_id,
                Err(error) => return self.fail_lookup(recorder, error).await,
            },
        };

        recorder.apply(
            RunEvent::Start,
            format!("attaching to training job {job_id}"),
        )?;

        self.continue_from_job(recorder, &job_id, true, production_endpoint)
            .await
    }

    /// Validates an existing endpoint.
    ///
    /// Without an endpoint name, the current production endpoint is
    /// validated.
    ///
    /// # Errors
    ///
    /// See [`Orchestrator::run`].
    pub async fn run_testing(
        &self,
        endpoint_name: Option<&str>,
    ) -> Result<PipelineRun, InvalidTransition> {
        let mut recorder = RunRecorder::new(RunMode::Testing, self.config.clone());

        let endpoint = match endpoint_name {
            Some(name) => name.to_owned(),
            None => match self.production_endpoint().await {
                Ok(name) => name,
                Err(error) => return self.fail_lookup(recorder, error).await,
            },
        };
        let endpoint_name = endpoint.as_str();

        recorder.apply(
            RunEvent::EndpointAttached,
            format!("validating endpoint {endpoint_name}"),
        )?;

        let report = self.validator.validate(endpoint_name).await;
        let passed = report.passed();
        let issues = report.issues.clone();
        recorder.run_mut().validation = Some(report);

        if passed {
            recorder.apply(RunEvent::ValidationPassed, "endpoint passed validation")?;
        } else {
            let error = StageError::ValidationFailed {
                endpoint: endpoint_name.to_owned(),
                issues,
            };
            recorder.apply(
                RunEvent::ValidationFailed { rolled_back: false },
                error.to_string(),
            )?;
            recorder.fail_with(error);
        }

        self.finish(recorder).await
    }

    /// Submits the configured training job.
    ///
    /// Returns the job id, or `None` when submission failed and the run is
    /// already terminal.
    async fn start_training(
        &self,
        recorder: &mut RunRecorder,
        role: Option<&str>,
    ) -> Result<Option<String>, InvalidTransition> {
        let request = Trainer::request_from_config(&self.config, role);
        recorder.run_mut().training_request = Some(request.clone());
        recorder.apply(
            RunEvent::Start,
            format!("submitting training job {}", request.job_name),
        )?;

        match self.trainer.submit(&request).await {
            Ok(job_id) => Ok(Some(job_id)),
            Err(error) => {
                Self::fail_training(recorder, error)?;
                Ok(None)
            }
        }
    }

    /// Waits for a training job and carries the run to a terminal state.
    async fn continue_from_job(
        &self,
        mut recorder: RunRecorder,
        job_id: &str,
        deploy: bool,
        production_endpoint: Option<&str>,
    ) -> Result<PipelineRun, InvalidTransition> {
        let training = match self.trainer.wait(job_id).await {
            Ok(training) => training,
            Err(error) => {
                Self::fail_training(&mut recorder, error)?;
                return self.finish(recorder).await;
            }
        };

        recorder.run_mut().training = Some(training.clone());
        if let Err(error) = ensure_succeeded(&training) {
            Self::fail_training(&mut recorder, error)?;
            return self.finish(recorder).await;
        }

        recorder.apply(
            RunEvent::TrainingSucceeded,
            format!("training job {} succeeded", training.job_id),
        )?;

        let decision = self.gate.evaluate(&training);
        recorder.run_mut().decision = Some(decision);

        if !decision.should_deploy {
            recorder.apply(RunEvent::PromotionDeclined, decision.explain())?;
            return self.finish(recorder).await;
        }

        if !deploy {
            recorder.apply(
                RunEvent::PromotionDeferred,
                format!("{}; deployment not requested", decision.explain()),
            )?;
            return self.finish(recorder).await;
        }

        recorder.apply(RunEvent::PromotionApproved, decision.explain())?;
        self.deploy_and_validate(recorder, &training, production_endpoint)
            .await
    }

    async fn deploy_and_validate(
        &self,
        mut recorder: RunRecorder,
        training: &TrainingResult,
        production_endpoint: Option<&str>,
    ) -> Result<PipelineRun, InvalidTransition> {
        let Some(artifact) = training.model_artifact_location.as_deref() else {
            let error = StageError::DeploymentFailed {
                endpoint: self.config.endpoint_prefix.clone(),
                reason: format!("training job {} produced no model artifact", training.job_id),
            };
            recorder.apply(
                RunEvent::DeploymentFailed { rolled_back: false },
                error.to_string(),
            )?;
            recorder.fail_with(error);
            return self.finish(recorder).await;
        };

        let previous = match production_endpoint {
            Some(name) => Some(name.to_owned()),
            None => self.discover_production_endpoint().await,
        };

        let deployment = match self
            .deployer
            .deploy(artifact, &self.config.instance_type, previous.as_deref())
            .await
        {
            Ok(deployment) => deployment,
            Err(failure) => {
                let (deployment, rolled_back) = self.rollback_if_enabled(failure.result).await;
                recorder.run_mut().deployment = Some(deployment);
                recorder.apply(
                    RunEvent::DeploymentFailed { rolled_back },
                    failure.error.to_string(),
                )?;
                recorder.fail_with(failure.error);
                return self.finish(recorder).await;
            }
        };

        recorder.run_mut().deployment = Some(deployment.clone());
        recorder.apply(
            RunEvent::DeploymentSucceeded,
            format!("endpoint {} in service", deployment.endpoint_name),
        )?;

        let report = self.validator.validate(&deployment.endpoint_name).await;
        let passed = report.passed();
        let issues = report.issues.clone();
        recorder.run_mut().validation = Some(report);

        if passed {
            recorder.apply(RunEvent::ValidationPassed, "endpoint passed validation")?;
            return self.finish(recorder).await;
        }

        let error = StageError::ValidationFailed {
            endpoint: deployment.endpoint_name.clone(),
            issues,
        };
        let (deployment, rolled_back) = self.rollback_if_enabled(deployment).await;
        recorder.run_mut().deployment = Some(deployment);
        recorder.apply(RunEvent::ValidationFailed { rolled_back }, error.to_string())?;
        recorder.fail_with(error);

        self.finish(recorder).await
    }

    async fn latest_training_job(&self) -> Result<String, StageError> {
        let lookup_failed = |reason: String| StageError::LookupFailed {
            target: "training job".to_owned(),
            reason,
        };

        match self
            .trainer
            .find_latest_completed(&self.config.model_name_prefix)
            .await
        {
            Ok(Some(job_id)) => Ok(job_id),
            Ok(None) => Err(lookup_failed("no completed training job".to_owned())),
            Err(error) => Err(lookup_failed(error.to_string())),
        }
    }

    async fn production_endpoint(&self) -> Result<String, StageError> {
        let lookup_failed = |reason: String| StageError::LookupFailed {
            target: "endpoint".to_owned(),
            reason,
        };

        match self.deployer.find_production_endpoint().await {
            Ok(Some(name)) => Ok(name),
            Ok(None) => Err(lookup_failed(format!(
                "no in-service endpoint named {}-*",
                self.config.endpoint_prefix
            ))),
            Err(error) => Err(lookup_failed(error.to_string())),
        }
    }

    async fn fail_lookup(
        &self,
        mut recorder: RunRecorder,
        error: StageError,
    ) -> Result<PipelineRun, InvalidTransition> {
        recorder.apply(RunEvent::LookupFailed, error.to_string())?;
        recorder.fail_with(error);
        self.finish(recorder).await
    }

    async fn discover_production_endpoint(&self) -> Option<String> {
        match self.deployer.find_production_endpoint().await {
            Ok(endpoint) => endpoint,
            Err(error) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    error = %error,
                    "Could not look up the production endpoint; rollback will be unavailable"
                );
                None
            }
        }
    }

    /// Rolls back a failed deployment when configured and possible.
    ///
    /// Returns the updated deployment and whether the rollback succeeded.
    async fn rollback_if_enabled(&self, deployment: DeploymentResult) -> (DeploymentResult, bool) {
        let previous = match (&deployment.previous_endpoint_name, self.config.rollback_on_failure) {
            (Some(previous), true) => previous.clone(),
            (None, true) => {
                tracing::warn!(
                    target: TRACING_TARGET,
                    endpoint = %deployment.endpoint_name,
                    "No previous endpoint to roll back to"
                );
                return (deployment, false);
            }
            (_, false) => return (deployment, false),
        };

        let report = self
            .deployer
            .rollback(&previous, &deployment.endpoint_name)
            .await;
        let succeeded = report.succeeded;

        (deployment.with_rollback(report), succeeded)
    }

    fn fail_training(recorder: &mut RunRecorder, error: StageError) -> Result<(), InvalidTransition> {
        recorder.apply(RunEvent::TrainingFailed, error.to_string())?;
        recorder.fail_with(error);
        Ok(())
    }

    /// Seals the run and notifies the sinks once.
    async fn finish(&self, recorder: RunRecorder) -> Result<PipelineRun, InvalidTransition> {
        let run = recorder.finish();

        if let Some(event) = run.notification_event()
            && !self.notifications.is_empty()
        {
            let message = match &run.error {
                Some(error) => format!("pipeline run {} ended {}: {error}", run.run_id, run.state),
                None => format!("pipeline run {} ended {}", run.run_id, run.state),
            };
            let payload = serde_json::to_value(&run).unwrap_or_default();
            let notification = Notification::new(event, message).with_payload(payload);

            let summary = self.notifications.notify(&notification).await;
            tracing::debug!(
                target: TRACING_TARGET,
                run_id = %run.run_id,
                delivered = summary.delivered,
                failed = summary.failed,
                "Notifications sent"
            );
        }

        Ok(run)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use modelgate_core::endpoint::EndpointState;
    use modelgate_core::mock::{MockEndpointProvider, MockTrainingProvider};
    use modelgate_core::training::JobState;
    use modelgate_notify::RecordingSink;
    use serde_json::{Value, json};

    use super::*;
    use crate::model::{DeploymentStatus, PromotionReason, default_samples};
    use crate::state::RunState;

    const PRODUCTION: &str = "iris-model-20250101-000000-000";

    fn iris(payload: &Value) -> Value {
        let petal_length = payload[0][2].as_f64().unwrap_or_default();
        let class = if petal_length < 2.5 {
            0
        } else if petal_length < 4.85 {
            1
        } else {
            2
        };
        json!([class])
    }

    fn healthy_endpoints() -> MockEndpointProvider {
        MockEndpointProvider::builder()
            .with_existing(PRODUCTION, EndpointState::InService)
            .with_responder(iris)
            .with_latency(Duration::from_millis(25))
            .build()
    }

    fn orchestrator(
        config: PipelineConfig,
        training: &MockTrainingProvider,
        endpoints: &MockEndpointProvider,
        sink: &RecordingSink,
    ) -> Orchestrator {
        config.validate().unwrap();
        Orchestrator::new(
            config,
            training.clone().into_service(),
            endpoints.clone().into_service(),
        )
        .with_notifications(NotificationService::new().with_sink(sink.clone()))
    }

    fn complete() -> RunPlan {
        RunPlan::Complete {
            role: None,
            production_endpoint: None,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_below_minimum_is_skipped() {
        let training = MockTrainingProvider::succeeding(0.8733);
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();

        assert_eq!(run.state, RunState::Skipped);
        assert_eq!(run.exit_code(), 0);
        let decision = run.decision.unwrap();
        assert_eq!(decision.reason, PromotionReason::BelowMinimum);
        assert_eq!(decision.threshold_used, 0.90);
        assert!(run.deployment.is_none());
        assert_eq!(endpoints.create_calls(), 0);
        assert_eq!(sink.received().len(), 1);
        assert_eq!(sink.received()[0].event, "pipeline.skipped");
    }

    #[tokio::test(start_paused = true)]
    async fn test_successful_promotion_is_done() {
        let training = MockTrainingProvider::succeeding(0.97);
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();

        assert_eq!(run.state, RunState::Done, "error: {:?}", run.error);
        assert_eq!(run.exit_code(), 0);
        let deployment = run.deployment.as_ref().unwrap();
        assert_eq!(deployment.status, DeploymentStatus::InService);
        assert_eq!(deployment.previous_endpoint_name.as_deref(), Some(PRODUCTION));
        assert!(run.validation.as_ref().unwrap().passed());
        assert_eq!(endpoints.delete_calls(), 0);

        let states: Vec<RunState> = run.audit.iter().map(|entry| entry.to).collect();
        assert_eq!(
            states,
            vec![
                RunState::Training,
                RunState::Evaluating,
                RunState::Deploying,
                RunState::Validating,
                RunState::Done,
            ]
        );

        let received = sink.received();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].event, "pipeline.done");
        assert_eq!(received[0].payload["state"], "done");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_validation_rolls_back() {
        let mut config = PipelineConfig::default();
        config.validation.acceptance_fraction = 0.95;
        config.validation.samples = default_samples()
            .into_iter()
            .filter(|s| s.name.starts_with("setosa") || s.name.starts_with("virginica"))
            .collect();

        // Always answers setosa: half of the samples match.
        let endpoints = MockEndpointProvider::builder()
            .with_existing(PRODUCTION, EndpointState::InService)
            .with_prediction(json!([0]))
            .build();
        let training = MockTrainingProvider::succeeding(0.97);
        let sink = RecordingSink::new();
        let pipeline = orchestrator(config, &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();

        assert_eq!(run.state, RunState::RolledBack);
        assert_ne!(run.exit_code(), 0);
        assert_eq!(
            run.validation.as_ref().unwrap().sample_predictions_correct_fraction,
            0.5
        );

        let deployment = run.deployment.as_ref().unwrap();
        assert_eq!(deployment.status, DeploymentStatus::RolledBack);
        let rollback = deployment.rollback.as_ref().unwrap();
        assert_eq!(rollback.restored_endpoint, PRODUCTION);
        assert_eq!(endpoints.deleted(), vec![deployment.endpoint_name.clone()]);
        assert_eq!(endpoints.state_of(PRODUCTION), Some(EndpointState::InService));

        assert!(matches!(run.error, Some(StageError::ValidationFailed { .. })));
        assert_eq!(sink.received()[0].event, "pipeline.rolled_back");
    }

    #[tokio::test(start_paused = true)]
    async fn test_training_timeout_never_deploys() {
        let config = PipelineConfig {
            training_timeout_secs: 600,
            ..Default::default()
        };
        let training = MockTrainingProvider::never_finishing();
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(config, &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();

        assert_eq!(run.state, RunState::Failed);
        assert_eq!(run.exit_code(), 1);
        assert!(matches!(
            run.error,
            Some(StageError::TrainingTimeout { waited_secs: 600, .. })
        ));
        assert!(run.training.is_none());
        assert!(training.status_calls() > 1);
        assert_eq!(endpoints.create_calls(), 0);
        assert_eq!(endpoints.status_calls(), 0);
        assert_eq!(endpoints.invoke_calls(), 0);
        assert_eq!(sink.received()[0].event, "pipeline.failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_training_job_is_recorded() {
        let training = MockTrainingProvider::ending_in(JobState::Failed);
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();

        assert_eq!(run.state, RunState::Failed);
        assert!(run.training.is_some());
        assert!(run.decision.is_none());
        assert_eq!(endpoints.create_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deployment_failure_rolls_back() {
        let training = MockTrainingProvider::succeeding(0.97);
        let endpoints = MockEndpointProvider::builder()
            .with_existing(PRODUCTION, EndpointState::InService)
            .with_creation_states(vec![EndpointState::Creating, EndpointState::Failed])
            .build();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();

        assert_eq!(run.state, RunState::RolledBack);
        assert!(run.validation.is_none());
        assert_eq!(endpoints.invoke_calls(), 0);
        assert!(matches!(run.error, Some(StageError::DeploymentFailed { .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deployment_failure_without_previous_endpoint_fails() {
        let training = MockTrainingProvider::succeeding(0.97);
        let endpoints = MockEndpointProvider::builder().failing_create().build();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();

        assert_eq!(run.state, RunState::Failed);
        assert!(run.deployment.unwrap().rollback.is_none());
        assert_eq!(endpoints.delete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_rollback_disabled_keeps_failed_state() {
        let config = PipelineConfig {
            rollback_on_failure: false,
            ..Default::default()
        };
        let training = MockTrainingProvider::succeeding(0.97);
        let endpoints = MockEndpointProvider::builder()
            .with_existing(PRODUCTION, EndpointState::InService)
            .failing_invoke()
            .build();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(config, &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();

        assert_eq!(run.state, RunState::Failed);
        assert_eq!(endpoints.delete_calls(), 0);
        assert_eq!(run.deployment.unwrap().status, DeploymentStatus::InService);
    }

    #[tokio::test(start_paused = true)]
    async fn test_training_mode_defers_deployment() {
        let training = MockTrainingProvider::succeeding(0.97);
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline
            .run(RunPlan::Training {
                role: Some("arn:role/pipeline".into()),
            })
            .await
            .unwrap();

        assert_eq!(run.mode, RunMode::Training);
        assert_eq!(run.state, RunState::Done);
        assert!(run.decision.unwrap().should_deploy);
        assert_eq!(
            run.training_request.unwrap().role.as_deref(),
            Some("arn:role/pipeline")
        );
        assert_eq!(endpoints.create_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deployment_mode_attaches_to_job() {
        let training = MockTrainingProvider::succeeding(0.96);
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline
            .run(RunPlan::Deployment {
                job_id: Some("iris-classifier-20250101-000000".into()),
                production_endpoint: Some(PRODUCTION.into()),
            })
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Done);
        assert_eq!(training.submit_calls(), 0);
        assert!(run.training_request.is_none());
        assert_eq!(run.training.unwrap().job_id, "iris-classifier-20250101-000000");
    }

    #[tokio::test(start_paused = true)]
    async fn test_testing_mode_validates_only() {
        let training = MockTrainingProvider::succeeding(0.97);
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline
            .run(RunPlan::Testing {
                endpoint_name: Some(PRODUCTION.into()),
            })
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Done);
        assert_eq!(training.submit_calls(), 0);
        assert_eq!(endpoints.create_calls(), 0);
        assert!(run.validation.unwrap().passed());

        let run = pipeline
            .run(RunPlan::Testing {
                endpoint_name: Some("iris-model-missing".into()),
            })
            .await
            .unwrap();
        assert_eq!(run.state, RunState::Failed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deployment_mode_finds_latest_completed_job() {
        let job = |day: u8, state: JobState| {
            let created_at: jiff::Timestamp = format!("2025-01-{day:02}T00:00:00Z").parse().unwrap();
            (format!("iris-classifier-202501{day:02}-000000"), state, created_at)
        };
        let training = [
            job(1, JobState::Succeeded),
            job(2, JobState::Succeeded),
            job(3, JobState::Failed),
        ]
        .into_iter()
        .fold(MockTrainingProvider::succeeding(0.96), |provider, (id, state, at)| {
            provider.with_job(id, state, at)
        });
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline
            .run(RunPlan::Deployment {
                job_id: None,
                production_endpoint: None,
            })
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Done);
        assert_eq!(training.submit_calls(), 0);
        assert_eq!(run.training.unwrap().job_id, "iris-classifier-20250102-000000");
        assert_eq!(
            run.deployment.unwrap().previous_endpoint_name.as_deref(),
            Some(PRODUCTION)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_deployment_mode_without_completed_job_fails() {
        let training = MockTrainingProvider::succeeding(0.96).with_job(
            "iris-classifier-20250101-000000",
            JobState::InProgress,
            "2025-01-01T00:00:00Z".parse().unwrap(),
        );
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline
            .run(RunPlan::Deployment {
                job_id: None,
                production_endpoint: None,
            })
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Failed);
        assert!(matches!(run.error, Some(StageError::LookupFailed { .. })));
        assert_eq!(run.audit.len(), 1);
        assert_eq!(run.audit[0].event, RunEvent::LookupFailed);
        assert_eq!(training.status_calls(), 0);
        assert_eq!(endpoints.create_calls(), 0);
        assert_eq!(sink.received()[0].event, "pipeline.failed");
    }

    #[tokio::test(start_paused = true)]
    async fn test_testing_mode_defaults_to_production_endpoint() {
        let training = MockTrainingProvider::succeeding(0.97);
        let endpoints = MockEndpointProvider::builder()
            .with_existing(PRODUCTION, EndpointState::InService)
            .with_existing("iris-model-20250102-000000-000", EndpointState::InService)
            .with_existing("iris-model-20250103-000000-000", EndpointState::Failed)
            .with_responder(iris)
            .build();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline
            .run(RunPlan::Testing {
                endpoint_name: None,
            })
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Done);
        assert_eq!(
            run.validation.unwrap().endpoint_name,
            "iris-model-20250102-000000-000"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_testing_mode_without_endpoint_fails() {
        let training = MockTrainingProvider::succeeding(0.97);
        let endpoints = MockEndpointProvider::builder()
            .with_existing("other-model-20250101-000000-000", EndpointState::InService)
            .build();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline
            .run(RunPlan::Testing {
                endpoint_name: None,
            })
            .await
            .unwrap();

        assert_eq!(run.state, RunState::Failed);
        assert!(run.validation.is_none());
        assert!(matches!(
            run.error,
            Some(StageError::LookupFailed { ref target, .. }) if target == "endpoint"
        ));
        assert_eq!(endpoints.invoke_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failing_sink_does_not_change_outcome() {
        let training = MockTrainingProvider::succeeding(0.8733);
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::failing();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();

        assert_eq!(run.state, RunState::Skipped);
        assert_eq!(sink.received().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_run_record_round_trips() {
        let training = MockTrainingProvider::succeeding(0.97);
        let endpoints = healthy_endpoints();
        let sink = RecordingSink::new();
        let pipeline = orchestrator(PipelineConfig::default(), &training, &endpoints, &sink);

        let run = pipeline.run(complete()).await.unwrap();
        let parsed = PipelineRun::from_json(&run.to_json().unwrap()).unwrap();

        assert_eq!(parsed, run);
    }
}
