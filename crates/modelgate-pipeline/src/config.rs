//! Pipeline configuration.
//!
//! A [`PipelineConfig`] is resolved once before a run starts and is passed
//! down by reference; nothing re-reads configuration mid-run. Resolution is
//! layered, highest precedence last:
//!
//! 1. [`PipelineConfig::default`]
//! 2. an optional JSON file ([`PipelineConfig::from_file`]), where missing
//!    fields keep their defaults
//! 3. environment and command-line overrides applied by the binary
//!
//! [`PipelineConfig::validate`] must pass before the configuration is used.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::TRACING_TARGET_CONFIG;
use crate::backoff::PollPolicy;
use crate::error::{ConfigError, ConfigResult};
use crate::model::{ValidationSample, default_samples};

/// Default promotion threshold.
pub const DEFAULT_ACCURACY_THRESHOLD: f64 = 0.95;
/// Default minimum acceptable accuracy.
pub const DEFAULT_MINIMUM_ACCURACY: f64 = 0.90;
/// Upper bound on every wait and poll delay: seven days.
pub const MAX_WAIT_SECS: u64 = 7 * 24 * 60 * 60;

/// Complete, immutable configuration of a pipeline run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Accuracy a model must reach to be promoted.
    pub accuracy_threshold: f64,
    /// Accuracy below which a model is rejected outright.
    pub minimum_accuracy: f64,
    /// Metric holding the measured accuracy.
    pub accuracy_metric: String,
    /// Metric consulted when `accuracy_metric` is absent.
    pub fallback_accuracy_metric: Option<String>,
    /// Compute instance type for training and serving.
    pub instance_type: String,
    /// Prefix of training job names.
    pub model_name_prefix: String,
    /// Prefix of endpoint names.
    pub endpoint_prefix: String,
    /// Location of the training input data.
    pub input_data_location: String,
    /// Hyperparameters forwarded to the training job.
    pub hyperparameters: BTreeMap<String, serde_json::Value>,
    /// Whether approved models are deployed without a manual step.
    pub auto_deploy_enabled: bool,
    /// Whether failed promotions revert to the previous endpoint.
    pub rollback_on_failure: bool,
    /// Wall-clock bound on waiting for a training job, in seconds.
    pub training_timeout_secs: u64,
    /// Wall-clock bound on waiting for an endpoint, in seconds.
    pub deployment_timeout_secs: u64,
    /// First status poll delay, in seconds.
    pub poll_initial_secs: u64,
    /// Largest status poll delay, in seconds.
    pub poll_max_secs: u64,
    /// Endpoint validation settings.
    pub validation: ValidationConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        let hyperparameters = BTreeMap::from([
            ("n_estimators".to_owned(), json!(100)),
            ("max_depth".to_owned(), json!(10)),
            ("random_state".to_owned(), json!(42)),
        ]);

        Self {
            accuracy_threshold: DEFAULT_ACCURACY_THRESHOLD,
            minimum_accuracy: DEFAULT_MINIMUM_ACCURACY,
            accuracy_metric: "accuracy".to_owned(),
            fallback_accuracy_metric: Some("validation_accuracy".to_owned()),
            instance_type: "ml.m5.large".to_owned(),
            model_name_prefix: "iris-classifier".to_owned(),
            endpoint_prefix: "iris-model".to_owned(),
            input_data_location: "data/train".to_owned(),
            hyperparameters,
            auto_deploy_enabled: true,
            rollback_on_failure: true,
            training_timeout_secs: 3600,
            deployment_timeout_secs: 1800,
            poll_initial_secs: 10,
            poll_max_secs: 60,
            validation: ValidationConfig::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a configuration file, filling missing fields with defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();

        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;

        let config = serde_json::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            path = %path.display(),
            "Loaded configuration file"
        );

        Ok(config)
    }

    /// Validates all configuration values.
    ///
    /// # Errors
    ///
    /// Returns the first invalid setting found.
    pub fn validate(&self) -> ConfigResult<()> {
        check_fraction("accuracy_threshold", self.accuracy_threshold)?;
        check_fraction("minimum_accuracy", self.minimum_accuracy)?;

        if self.minimum_accuracy > self.accuracy_threshold {
            return Err(ConfigError::ThresholdOrdering {
                minimum: self.minimum_accuracy,
                target: self.accuracy_threshold,
            });
        }

        check_wait("training_timeout_secs", self.training_timeout_secs)?;
        check_wait("deployment_timeout_secs", self.deployment_timeout_secs)?;
        check_wait("poll_max_secs", self.poll_max_secs)?;

        if self.poll_initial_secs == 0 || self.poll_initial_secs > self.poll_max_secs {
            return Err(ConfigError::Invalid(format!(
                "poll delays must satisfy 0 < initial ({}) <= max ({})",
                self.poll_initial_secs, self.poll_max_secs
            )));
        }

        if self.accuracy_metric.trim().is_empty() {
            return Err(ConfigError::Invalid("accuracy metric name is empty".into()));
        }

        if self.endpoint_prefix.trim().is_empty() || self.model_name_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "model name and endpoint prefixes must not be empty".into(),
            ));
        }

        self.validation.validate()
    }

    /// Polling policy for training jobs.
    pub fn training_poll(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.poll_initial_secs),
            Duration::from_secs(self.poll_max_secs),
            Duration::from_secs(self.training_timeout_secs),
        )
    }

    /// Polling policy for endpoint provisioning.
    pub fn deployment_poll(&self) -> PollPolicy {
        PollPolicy::new(
            Duration::from_secs(self.poll_initial_secs),
            Duration::from_secs(self.poll_max_secs),
            Duration::from_secs(self.deployment_timeout_secs),
        )
    }

    /// Logs the effective configuration.
    pub fn log(&self) {
        tracing::info!(
            target: TRACING_TARGET_CONFIG,
            accuracy_threshold = self.accuracy_threshold,
            minimum_accuracy = self.minimum_accuracy,
            instance_type = %self.instance_type,
            auto_deploy_enabled = self.auto_deploy_enabled,
            rollback_on_failure = self.rollback_on_failure,
            training_timeout_secs = self.training_timeout_secs,
            deployment_timeout_secs = self.deployment_timeout_secs,
            "Pipeline configuration"
        );

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            acceptance_fraction = self.validation.acceptance_fraction,
            latency_budget_ms = self.validation.latency_budget_ms,
            performance_requests = self.validation.performance_requests,
            samples = self.validation.samples.len(),
            "Validation configuration"
        );
    }
}

/// Settings for validating a deployed endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Fraction of samples that must be predicted correctly.
    pub acceptance_fraction: f64,
    /// Absolute tolerance for numeric predictions.
    pub tolerance: f64,
    /// Upper bound on mean probe latency, in milliseconds.
    pub latency_budget_ms: u64,
    /// Probe success rate below which an issue is reported.
    pub min_success_rate: f64,
    /// Number of probe requests for the latency check.
    pub performance_requests: u32,
    /// Pause between probe requests, in milliseconds.
    pub request_interval_ms: u64,
    /// Labelled samples for the functional check.
    pub samples: Vec<ValidationSample>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            acceptance_fraction: DEFAULT_MINIMUM_ACCURACY,
            tolerance: 1e-6,
            latency_budget_ms: 1000,
            min_success_rate: 0.95,
            performance_requests: 20,
            request_interval_ms: 100,
            samples: default_samples(),
        }
    }
}

impl ValidationConfig {
    /// Mean latency bound.
    pub fn latency_budget(&self) -> Duration {
        Duration::from_millis(self.latency_budget_ms)
    }

    /// Pause between probe requests.
    pub fn request_interval(&self) -> Duration {
        Duration::from_millis(self.request_interval_ms)
    }

    fn validate(&self) -> ConfigResult<()> {
        check_fraction("acceptance_fraction", self.acceptance_fraction)?;
        check_fraction("min_success_rate", self.min_success_rate)?;

        if !self.tolerance.is_finite() || self.tolerance < 0.0 {
            return Err(ConfigError::Invalid(format!(
                "tolerance must be a non-negative number, got {}",
                self.tolerance
            )));
        }

        if self.performance_requests == 0 {
            return Err(ConfigError::Invalid(
                "at least one performance request is required".into(),
            ));
        }

        if self.samples.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one validation sample is required".into(),
            ));
        }

        Ok(())
    }
}

fn check_wait(name: &'static str, secs: u64) -> ConfigResult<()> {
    if (1..=MAX_WAIT_SECS).contains(&secs) {
        Ok(())
    } else {
        Err(ConfigError::Invalid(format!(
            "{name} must be between 1 and {MAX_WAIT_SECS} seconds, got {secs}"
        )))
    }
}

fn check_fraction(name: &'static str, value: f64) -> ConfigResult<()> {
    if (0.0..=1.0).contains(&value) {
        Ok(())
    } else {
        Err(ConfigError::OutOfRange { name, value })
    }
}
