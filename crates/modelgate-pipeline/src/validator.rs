//! Post-deployment endpoint validation.

use std::time::Duration;

use jiff::SignedDuration;
use modelgate_core::endpoint::{EndpointService, EndpointState};
use tokio::time::Instant;

use crate::backoff::elapsed_since;
use crate::config::ValidationConfig;
use crate::model::{LatencyStats, ValidationReport, ValidationSample, ValidationStatus};

/// Tracing target for validation.
pub const TRACING_TARGET: &str = "modelgate_pipeline::validator";

/// Checks a deployed endpoint before traffic is trusted to it.
///
/// Validation runs three checks in order: a health probe, functional checks
/// against labelled samples, and a latency probe of sequential requests. A
/// failed request counts against its check but never aborts validation.
#[derive(Debug, Clone)]
pub struct Validator {
    service: EndpointService,
    config: ValidationConfig,
}

impl Validator {
    /// Creates a new validator.
    pub fn new(service: EndpointService, config: ValidationConfig) -> Self {
        Self { service, config }
    }

    /// Validates an endpoint with the configured samples and latency budget.
    pub async fn validate(&self, endpoint_name: &str) -> ValidationReport {
        self.validate_with(
            endpoint_name,
            &self.config.samples,
            self.config.latency_budget(),
        )
        .await
    }

    /// Validates an endpoint against explicit samples and latency budget.
    ///
    /// The report passes when the health probe succeeds, the fraction of
    /// correct predictions reaches the acceptance fraction, and the mean
    /// latency of successful probe requests is within `latency_budget`. A
    /// probe where every request failed fails the latency check.
    pub async fn validate_with(
        &self,
        endpoint_name: &str,
        samples: &[ValidationSample],
        latency_budget: Duration,
    ) -> ValidationReport {
        tracing::info!(
            target: TRACING_TARGET,
            endpoint = %endpoint_name,
            samples = samples.len(),
            latency_budget_ms = latency_budget.as_millis(),
            "Validating endpoint"
        );

        let mut issues = Vec::new();

        let health_check_passed = self.check_health(endpoint_name, &mut issues).await;

        let samples_correct = self.check_samples(endpoint_name, samples).await;
        let samples_total = samples.len();
        let correct_fraction = if samples_total == 0 {
            0.0
        } else {
            samples_correct as f64 / samples_total as f64
        };

        if correct_fraction < self.config.acceptance_fraction {
            issues.push(format!(
                "{samples_correct} of {samples_total} sample predictions correct ({correct_fraction:.2}), below {:.2}",
                self.config.acceptance_fraction
            ));
        }

        let (latency_samples, success_rate) = match samples.first() {
            Some(sample) => self.probe_latency(endpoint_name, sample).await,
            None => (Vec::new(), 0.0),
        };
        let latency = LatencyStats::from_samples(&latency_samples);

        let budget = SignedDuration::try_from(latency_budget).unwrap_or(SignedDuration::MAX);
        let latency_ok = match &latency {
            Some(stats) if stats.mean <= budget => true,
            Some(stats) => {
                issues.push(format!(
                    "mean latency {}ms exceeds budget {}ms",
                    stats.mean.as_millis(),
                    latency_budget.as_millis()
                ));
                false
            }
            None => {
                issues.push("no latency probe request succeeded".to_owned());
                false
            }
        };

        if success_rate < self.config.min_success_rate {
            issues.push(format!(
                "probe success rate {:.2} below {:.2}",
                success_rate, self.config.min_success_rate
            ));
        }

        let passed = health_check_passed
            && correct_fraction >= self.config.acceptance_fraction
            && latency_ok;
        let overall_status = if passed {
            ValidationStatus::Passed
        } else {
            ValidationStatus::Failed
        };

        tracing::info!(
            target: TRACING_TARGET,
            endpoint = %endpoint_name,
            status = %overall_status,
            health = health_check_passed,
            correct_fraction,
            success_rate,
            mean_latency_ms = latency.map(|s| s.mean.as_millis()),
            issues = issues.len(),
            "Validation finished"
        );

        ValidationReport {
            endpoint_name: endpoint_name.to_owned(),
            health_check_passed,
            sample_predictions_correct_fraction: correct_fraction,
            samples_total,
            samples_correct,
            latency_samples,
            latency,
            success_rate,
            overall_status,
            issues,
        }
    }

    async fn check_health(&self, endpoint: &str, issues: &mut Vec<String>) -> bool {
        match self.service.get_status(endpoint).await {
            Ok(status) if status.state == EndpointState::InService => true,
            Ok(status) => {
                issues.push(format!("endpoint is {}, not in service", status.state));
                false
            }
            Err(error) => {
                issues.push(format!("health check failed: {error}"));
                false
            }
        }
    }

    async fn check_samples(&self, endpoint: &str, samples: &[ValidationSample]) -> usize {
        let mut correct = 0;

        for sample in samples {
            match self.service.invoke(endpoint, &sample.input).await {
                Ok(prediction) if sample.matches(&prediction, self.config.tolerance) => {
                    correct += 1;
                }
                Ok(prediction) => tracing::debug!(
                    target: TRACING_TARGET,
                    sample = %sample.name,
                    expected = %sample.expected,
                    actual = %prediction,
                    "Prediction mismatch"
                ),
                Err(error) => tracing::debug!(
                    target: TRACING_TARGET,
                    sample = %sample.name,
                    error = %error,
                    "Sample request failed"
                ),
            }
        }

        correct
    }

    /// Sends sequential requests and returns successful latencies and the
    /// success rate.
    async fn probe_latency(
        &self,
        endpoint: &str,
        sample: &ValidationSample,
    ) -> (Vec<SignedDuration>, f64) {
        let requests = self.config.performance_requests;
        let interval = self.config.request_interval();
        let mut latencies = Vec::with_capacity(requests as usize);

        for index in 0..requests {
            if index > 0 && !interval.is_zero() {
                tokio::time::sleep(interval).await;
            }

            let started_at = Instant::now();
            if self.service.invoke(endpoint, &sample.input).await.is_ok() {
                latencies.push(elapsed_since(started_at));
            }
        }

        let success_rate = if requests == 0 {
            0.0
        } else {
            latencies.len() as f64 / f64::from(requests)
        };

        (latencies, success_rate)
    }
}

#[cfg(test)]
mod tests {
    use modelgate_core::mock::MockEndpointProvider;
    use serde_json::{Value, json};

    use super::*;
    use crate::model::default_samples;

    const ENDPOINT: &str = "iris-model-new";

    /// Classifies iris measurements by petal length.
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

    fn validator(provider: &MockEndpointProvider) -> Validator {
        Validator::new(provider.clone().into_service(), ValidationConfig::default())
    }

    #[tokio::test(start_paused = true)]
    async fn test_healthy_accurate_endpoint_passes() {
        let provider = MockEndpointProvider::builder()
            .with_existing(ENDPOINT, EndpointState::InService)
            .with_responder(iris)
            .with_latency(Duration::from_millis(40))
            .build();

        let report = validator(&provider).validate(ENDPOINT).await;

        assert!(report.passed(), "issues: {:?}", report.issues);
        assert_eq!(report.samples_correct, 8);
        assert_eq!(report.latency_samples.len(), 20);
        assert_eq!(report.success_rate, 1.0);
        assert_eq!(report.latency.unwrap().mean, SignedDuration::from_millis(40));
        assert_eq!(provider.invoke_calls(), 8 + 20);
    }

    #[tokio::test(start_paused = true)]
    async fn test_wrong_predictions_fail() {
        // Always predicts class 0: only the two setosa samples match.
        let provider = MockEndpointProvider::builder()
            .with_existing(ENDPOINT, EndpointState::InService)
            .with_prediction(json!([0]))
            .build();

        let report = validator(&provider).validate(ENDPOINT).await;

        assert_eq!(report.overall_status, ValidationStatus::Failed);
        assert_eq!(report.sample_predictions_correct_fraction, 0.25);
        assert!(report.health_check_passed);
        assert_eq!(report.issues.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_endpoint_fails_latency_budget() {
        let provider = MockEndpointProvider::builder()
            .with_existing(ENDPOINT, EndpointState::InService)
            .with_responder(iris)
            .with_latency(Duration::from_millis(1500))
            .build();

        let report = validator(&provider).validate(ENDPOINT).await;

        assert!(!report.passed());
        assert_eq!(report.sample_predictions_correct_fraction, 1.0);
        assert!(report.issues[0].starts_with("mean latency"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_endpoint_still_reports() {
        let provider = MockEndpointProvider::builder()
            .with_existing(ENDPOINT, EndpointState::InService)
            .failing_invoke()
            .build();

        let report = validator(&provider).validate(ENDPOINT).await;

        assert!(!report.passed());
        assert!(report.health_check_passed);
        assert_eq!(report.samples_correct, 0);
        assert!(report.latency.is_none());
        assert_eq!(report.success_rate, 0.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unhealthy_endpoint_fails() {
        let provider = MockEndpointProvider::builder()
            .with_existing(ENDPOINT, EndpointState::Updating)
            .with_responder(iris)
            .build();

        let report = validator(&provider)
            .validate_with(ENDPOINT, &default_samples(), Duration::from_secs(1))
            .await;

        assert!(!report.health_check_passed);
        assert_eq!(report.overall_status, ValidationStatus::Failed);
    }
}
