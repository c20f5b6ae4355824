//! Pipeline configuration layering.

use std::path::PathBuf;

use anyhow::Context;
use clap::Args;
use modelgate_pipeline::PipelineConfig;

use crate::TRACING_TARGET_CONFIG;

/// Pipeline settings given on the command line or in the environment.
///
/// Every field overrides the corresponding value of the configuration file,
/// which itself overrides the built-in defaults.
#[derive(Debug, Clone, Default, Args)]
pub struct PipelineArgs {
    /// JSON configuration file; missing fields keep their defaults
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Accuracy a model must reach to be promoted
    #[arg(long, env = "ACCURACY_THRESHOLD")]
    pub accuracy_threshold: Option<f64>,

    /// Accuracy below which a model is rejected outright
    #[arg(long, env = "MINIMUM_ACCURACY")]
    pub minimum_accuracy: Option<f64>,

    /// Compute instance type for training and serving
    #[arg(long, env = "INSTANCE_TYPE")]
    pub instance_type: Option<String>,

    /// Deploy approved models without a manual step
    #[arg(long, env = "AUTO_DEPLOY_ENABLED")]
    pub auto_deploy_enabled: Option<bool>,

    /// Revert to the previous endpoint when a promotion fails
    #[arg(long, env = "ROLLBACK_ON_FAILURE")]
    pub rollback_on_failure: Option<bool>,

    /// Maximum time to wait for a training job, in seconds
    #[arg(long, env = "MAX_TRAINING_TIME")]
    pub max_training_time: Option<u64>,

    /// Maximum time to wait for an endpoint to come into service, in seconds
    #[arg(long, env = "MAX_DEPLOYMENT_TIME")]
    pub max_deployment_time: Option<u64>,

    /// Prefix of training job names
    #[arg(long, env = "MODEL_NAME_PREFIX")]
    pub model_name_prefix: Option<String>,

    /// Prefix of endpoint names
    #[arg(long, env = "ENDPOINT_PREFIX")]
    pub endpoint_prefix: Option<String>,

    /// Location of the training input data
    #[arg(long, env = "INPUT_DATA_LOCATION")]
    pub input_data_location: Option<String>,
}

impl PipelineArgs {
    /// Resolves and validates the effective pipeline configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration file cannot be loaded or the
    /// resulting configuration is invalid.
    pub fn resolve(&self) -> anyhow::Result<PipelineConfig> {
        let mut config = match &self.config_file {
            Some(path) => PipelineConfig::from_file(path)?,
            None => PipelineConfig::default(),
        };

        self.apply(&mut config);
        config.validate().context("invalid pipeline configuration")?;

        tracing::debug!(
            target: TRACING_TARGET_CONFIG,
            config_file = ?self.config_file,
            "Pipeline configuration resolved"
        );

        Ok(config)
    }

    fn apply(&self, config: &mut PipelineConfig) {
        if let Some(value) = self.accuracy_threshold {
            config.accuracy_threshold = value;
        }
        if let Some(value) = self.minimum_accuracy {
            config.minimum_accuracy = value;
        }
        if let Some(value) = &self.instance_type {
            config.instance_type.clone_from(value);
        }
        if let Some(value) = self.auto_deploy_enabled {
            config.auto_deploy_enabled = value;
        }
        if let Some(value) = self.rollback_on_failure {
            config.rollback_on_failure = value;
        }
        if let Some(value) = self.max_training_time {
            config.training_timeout_secs = value;
        }
        if let Some(value) = self.max_deployment_time {
            config.deployment_timeout_secs = value;
        }
        if let Some(value) = &self.model_name_prefix {
            config.model_name_prefix.clone_from(value);
        }
        if let Some(value) = &self.endpoint_prefix {
            config.endpoint_prefix.clone_from(value);
        }
        if let Some(value) = &self.input_data_location {
            config.input_data_location.clone_from(value);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_defaults_without_overrides() {
        let config = PipelineArgs::default().resolve().unwrap();
        assert_eq!(config, PipelineConfig::default());
    }

    #[test]
    fn test_arguments_override_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"accuracy_threshold": 0.97, "minimum_accuracy": 0.85, "instance_type": "ml.c5.xlarge"}}"#
        )
        .unwrap();

        let args = PipelineArgs {
            config_file: Some(file.path().to_owned()),
            minimum_accuracy: Some(0.8),
            rollback_on_failure: Some(false),
            max_training_time: Some(900),
            ..Default::default()
        };
        let config = args.resolve().unwrap();

        assert_eq!(config.accuracy_threshold, 0.97);
        assert_eq!(config.minimum_accuracy, 0.8);
        assert_eq!(config.instance_type, "ml.c5.xlarge");
        assert!(!config.rollback_on_failure);
        assert_eq!(config.training_timeout_secs, 900);
        assert_eq!(config.endpoint_prefix, "iris-model");
    }

    #[test]
    fn test_rejects_inverted_thresholds() {
        let args = PipelineArgs {
            accuracy_threshold: Some(0.8),
            minimum_accuracy: Some(0.9),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }

    #[test]
    fn test_rejects_unbounded_training_time() {
        let args = PipelineArgs {
            max_training_time: Some(u64::MAX),
            ..Default::default()
        };
        let error = args.resolve().unwrap_err();
        assert!(format!("{error:#}").contains("training_timeout_secs"));
    }

    #[test]
    fn test_missing_file_is_an_error() {
        let args = PipelineArgs {
            config_file: Some(PathBuf::from("/nonexistent/modelgate.json")),
            ..Default::default()
        };
        assert!(args.resolve().is_err());
    }
}
