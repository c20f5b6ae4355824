//! Endpoint provisioning, production endpoint discovery and rollback.

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};

use jiff::Timestamp;
use modelgate_core::endpoint::{EndpointService, EndpointSpec, EndpointState, EndpointStatus};
use thiserror::Error;
use tokio::time::Instant;

use crate::backoff::{PollError, PollPolicy, elapsed_since, poll_until};
use crate::config::PipelineConfig;
use crate::error::StageError;
use crate::model::{DeploymentResult, DeploymentStatus, RollbackReport};

/// Tracing target for deployment operations.
pub const TRACING_TARGET: &str = "modelgate_pipeline::deployer";

/// A deployment attempt that did not reach service.
///
/// Carries the partial result so the endpoint name and timing are recorded
/// even though the attempt failed.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{error}")]
pub struct DeploymentFailure {
    /// Result of the failed attempt.
    pub result: DeploymentResult,
    /// Why the attempt failed.
    #[source]
    pub error: StageError,
}

/// Provisions serving endpoints.
#[derive(Debug, Clone)]
pub struct Deployer {
    service: EndpointService,
    poll: PollPolicy,
    endpoint_prefix: String,
    last_issued_ms: Arc<AtomicI64>,
}

impl Deployer {
    /// Creates a new deployer.
    pub fn new(service: EndpointService, poll: PollPolicy, endpoint_prefix: impl Into<String>) -> Self {
        Self {
            service,
            poll,
            endpoint_prefix: endpoint_prefix.into(),
            last_issued_ms: Arc::new(AtomicI64::new(i64::MIN)),
        }
    }

    /// Creates a deployer using the configured polling policy and prefix.
    pub fn from_config(service: EndpointService, config: &PipelineConfig) -> Self {
        Self::new(service, config.deployment_poll(), &config.endpoint_prefix)
    }

    /// Generates a fresh endpoint name.
    ///
    /// Names carry a millisecond timestamp suffix. Two names issued by the
    /// same deployer within one millisecond are told apart by advancing the
    /// later one, so names are strictly increasing.
    pub fn next_endpoint_name(&self) -> String {
        let now = Timestamp::now().as_millisecond();
        let mut last = self.last_issued_ms.load(Ordering::SeqCst);

        let issued = loop {
            let candidate = now.max(last.saturating_add(1));
            match self.last_issued_ms.compare_exchange(
                last,
                candidate,
                Ordering::SeqCst,
                Ordering::SeqCst,
            ) {
                Ok(_) => break candidate,
                Err(actual) => last = actual,
            }
        };

        let at = Timestamp::from_millisecond(issued).unwrap_or_else(|_| Timestamp::now());
        format!(
            "{}-{}-{:03}",
            self.endpoint_prefix,
            at.strftime("%Y%m%d-%H%M%S"),
            issued.rem_euclid(1000)
        )
    }

    /// Finds the current production endpoint.
    ///
    /// Picks the most recently created in-service endpoint whose name
    /// carries this deployer's prefix.
    ///
    /// # Errors
    ///
    /// Returns an error if the endpoints cannot be listed.
    pub async fn find_production_endpoint(&self) -> modelgate_core::Result<Option<String>> {
        let prefix = format!("{}-", self.endpoint_prefix);
        let endpoints = self.service.list_endpoints().await?;

        let current = endpoints
            .into_iter()
            .filter(|e| e.state == EndpointState::InService && e.name.starts_with(&prefix))
            .max_by_key(|e| e.created_at)
            .map(|e| e.name);

        tracing::debug!(
            target: TRACING_TARGET,
            prefix = %self.endpoint_prefix,
            endpoint = current.as_deref().unwrap_or("none"),
            "Production endpoint lookup"
        );

        Ok(current)
    }

    /// Provisions a new endpoint and waits until it serves.
    ///
    /// `previous` names the endpoint this one replaces and is recorded for
    /// rollback. Nothing is done to the new endpoint here when provisioning
    /// fails; cleanup is the caller's decision.
    ///
    /// # Errors
    ///
    /// Returns a [`DeploymentFailure`] carrying
    /// [`StageError::DeploymentFailed`] or [`StageError::DeploymentTimeout`].
    pub async fn deploy(
        &self,
        artifact_location: &str,
        instance_type: &str,
        previous: Option<&str>,
    ) -> Result<DeploymentResult, DeploymentFailure> {
        let started_at = Instant::now();
        let endpoint_name = self.next_endpoint_name();
        let spec = EndpointSpec::new(&endpoint_name, artifact_location, instance_type);

        tracing::info!(
            target: TRACING_TARGET,
            endpoint = %endpoint_name,
            previous = previous.unwrap_or("none"),
            instance_type = %instance_type,
            "Deploying endpoint"
        );

        let outcome = match self.service.create_endpoint(&spec).await {
            Ok(_) => self.wait_in_service(&endpoint_name).await,
            Err(error) => Err(StageError::DeploymentFailed {
                endpoint: endpoint_name.clone(),
                reason: error.to_string(),
            }),
        };

        let mut result = DeploymentResult {
            endpoint_name: endpoint_name.clone(),
            status: DeploymentStatus::InService,
            previous_endpoint_name: previous.map(str::to_owned),
            duration: elapsed_since(started_at),
            failure_reason: None,
            rollback: None,
        };

        match outcome {
            Ok(()) => {
                tracing::info!(
                    target: TRACING_TARGET,
                    endpoint = %endpoint_name,
                    elapsed_secs = result.duration.as_secs(),
                    "Endpoint in service"
                );
                Ok(result)
            }
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    endpoint = %endpoint_name,
                    error = %error,
                    "Deployment failed"
                );
                result.status = DeploymentStatus::Failed;
                result.failure_reason = Some(error.to_string());
                Err(DeploymentFailure { result, error })
            }
        }
    }

    async fn wait_in_service(&self, endpoint: &str) -> Result<(), StageError> {
        let service = &self.service;
        let status: EndpointStatus = poll_until(&self.poll, endpoint, move || async move {
            let status = service.get_status(endpoint).await?;
            Ok(status.state.is_settled().then_some(status))
        })
        .await
        .map_err(|error| match error {
            PollError::Timeout { waited, .. } => StageError::deployment_timeout(endpoint, waited),
            PollError::Fatal(error) => StageError::DeploymentFailed {
                endpoint: endpoint.to_owned(),
                reason: error.to_string(),
            },
        })?;

        if status.state == EndpointState::InService {
            return Ok(());
        }

        Err(StageError::DeploymentFailed {
            endpoint: endpoint.to_owned(),
            reason: status
                .failure_reason
                .unwrap_or_else(|| format!("endpoint entered state {}", status.state)),
        })
    }

    /// Reverts to the previous endpoint.
    ///
    /// Confirms `previous` still serves, then deletes the failed endpoint.
    /// The failed endpoint is kept when the previous one cannot be confirmed,
    /// so that some endpoint stays available. Never fails; problems are
    /// collected in the report.
    pub async fn rollback(&self, previous: &str, failed: &str) -> RollbackReport {
        tracing::warn!(
            target: TRACING_TARGET,
            previous = %previous,
            failed = %failed,
            "Rolling back deployment"
        );

        let mut errors = Vec::new();

        let succeeded = match self.service.get_status(previous).await {
            Ok(status) if status.state == EndpointState::InService => true,
            Ok(status) => {
                errors.push(format!(
                    "previous endpoint {previous} is not available: {}",
                    status.state
                ));
                false
            }
            Err(error) => {
                errors.push(format!("failed to check previous endpoint {previous}: {error}"));
                false
            }
        };

        let mut deleted_endpoint = None;
        if succeeded {
            match self.service.delete_endpoint(failed).await {
                Ok(()) => deleted_endpoint = Some(failed.to_owned()),
                Err(error) => errors.push(format!("failed to delete endpoint {failed}: {error}")),
            }
        }

        if succeeded {
            tracing::info!(
                target: TRACING_TARGET,
                restored = %previous,
                deleted = deleted_endpoint.is_some(),
                "Rollback complete"
            );
        } else {
            tracing::error!(
                target: TRACING_TARGET,
                previous = %previous,
                errors = ?errors,
                "Rollback failed"
            );
        }

        RollbackReport {
            restored_endpoint: previous.to_owned(),
            deleted_endpoint,
            succeeded,
            errors,
            finished_at: Timestamp::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::time::Duration;

    use modelgate_core::mock::MockEndpointProvider;

    use super::*;

    fn policy(timeout_secs: u64) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(10),
            Duration::from_secs(60),
            Duration::from_secs(timeout_secs),
        )
    }

    fn deployer(provider: &MockEndpointProvider, timeout_secs: u64) -> Deployer {
        Deployer::new(provider.clone().into_service(), policy(timeout_secs), "iris-model")
    }

    #[test]
    fn test_endpoint_names_are_unique_and_increasing() {
        let deployer = deployer(&MockEndpointProvider::default(), 60);

        let names: Vec<String> = (0..50).map(|_| deployer.next_endpoint_name()).collect();
        let unique: HashSet<&String> = names.iter().collect();

        assert_eq!(unique.len(), names.len());
        assert!(names.windows(2).all(|pair| pair[0] < pair[1]));
        assert!(names[0].starts_with("iris-model-"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_reaches_service() {
        let provider = MockEndpointProvider::default();
        let deployer = deployer(&provider, 1800);

        let result = deployer
            .deploy("mock://model.tar.gz", "ml.m5.large", Some("iris-model-old"))
            .await
            .unwrap();

        assert!(result.is_in_service());
        assert_eq!(result.previous_endpoint_name.as_deref(), Some("iris-model-old"));
        assert_eq!(provider.state_of(&result.endpoint_name), Some(EndpointState::InService));
        assert_eq!(provider.create_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_endpoint_is_not_deleted() {
        let provider = MockEndpointProvider::builder()
            .with_creation_states(vec![EndpointState::Creating, EndpointState::Failed])
            .build();
        let deployer = deployer(&provider, 1800);

        let failure = deployer
            .deploy("mock://model.tar.gz", "ml.m5.large", None)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, StageError::DeploymentFailed { .. }));
        assert_eq!(failure.result.status, DeploymentStatus::Failed);
        assert_eq!(failure.result.failure_reason.as_deref(), Some(failure.error.to_string().as_str()));
        assert_eq!(provider.delete_calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deploy_timeout() {
        let provider = MockEndpointProvider::builder()
            .with_creation_states(vec![EndpointState::Creating])
            .build();
        let deployer = deployer(&provider, 120);

        let failure = deployer
            .deploy("mock://model.tar.gz", "ml.m5.large", None)
            .await
            .unwrap_err();

        assert!(matches!(
            failure.error,
            StageError::DeploymentTimeout { waited_secs: 120, .. }
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_rejected() {
        let provider = MockEndpointProvider::builder().failing_create().build();
        let deployer = deployer(&provider, 1800);

        let failure = deployer
            .deploy("mock://model.tar.gz", "ml.m5.large", None)
            .await
            .unwrap_err();

        assert!(matches!(failure.error, StageError::DeploymentFailed { .. }));
        assert_eq!(provider.status_calls(), 0);
    }

    #[tokio::test]
    async fn test_find_production_endpoint_picks_newest_in_service() {
        let provider = MockEndpointProvider::builder()
            .with_existing("iris-model-20250101-000000-000", EndpointState::InService)
            .with_existing("iris-model-20250102-000000-000", EndpointState::InService)
            .with_existing("iris-model-20250103-000000-000", EndpointState::Failed)
            .with_existing("other-model-20250104-000000-000", EndpointState::InService)
            .build();
        let deployer = deployer(&provider, 60);

        let current = deployer.find_production_endpoint().await.unwrap();
        assert_eq!(current.as_deref(), Some("iris-model-20250102-000000-000"));
    }

    #[tokio::test]
    async fn test_rollback_deletes_failed_endpoint() {
        let provider = MockEndpointProvider::builder()
            .with_existing("iris-model-old", EndpointState::InService)
            .with_existing("iris-model-new", EndpointState::InService)
            .build();
        let deployer = deployer(&provider, 60);

        let report = deployer.rollback("iris-model-old", "iris-model-new").await;

        assert!(report.succeeded);
        assert_eq!(report.deleted_endpoint.as_deref(), Some("iris-model-new"));
        assert!(report.errors.is_empty());
        assert_eq!(provider.deleted(), vec!["iris-model-new".to_owned()]);
    }

    #[tokio::test]
    async fn test_rollback_keeps_new_endpoint_when_previous_is_gone() {
        let provider = MockEndpointProvider::builder()
            .with_existing("iris-model-old", EndpointState::Failed)
            .with_existing("iris-model-new", EndpointState::InService)
            .build();
        let deployer = deployer(&provider, 60);

        let report = deployer.rollback("iris-model-old", "iris-model-new").await;

        assert!(!report.succeeded);
        assert!(report.deleted_endpoint.is_none());
        assert_eq!(report.errors.len(), 1);
        assert_eq!(provider.delete_calls(), 0);
    }

    #[tokio::test]
    async fn test_rollback_delete_failure_is_reported() {
        let provider = MockEndpointProvider::builder()
            .with_existing("iris-model-old", EndpointState::InService)
            .with_existing("iris-model-new", EndpointState::InService)
            .failing_delete()
            .build();
        let deployer = deployer(&provider, 60);

        let report = deployer.rollback("iris-model-old", "iris-model-new").await;

        assert!(report.succeeded);
        assert!(report.deleted_endpoint.is_none());
        assert_eq!(report.errors.len(), 1);
    }
}
