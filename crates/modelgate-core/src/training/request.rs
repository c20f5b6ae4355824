//! Training job submission types.

use std::collections::BTreeMap;

use jiff::Timestamp;
use serde::{Deserialize, Serialize};

/// A request to run one training job on the external training service.
///
/// The request is immutable once submitted; the job name doubles as the
/// idempotency key on the remote side, so every request gets a fresh,
/// time-suffixed name unless the caller overrides it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingRequest {
    /// Unique job name submitted to the training service.
    pub job_name: String,
    /// Logical name of the model being trained.
    pub model_name: String,
    /// Hyperparameters forwarded verbatim to the training container.
    #[serde(default)]
    pub hyperparameters: BTreeMap<String, serde_json::Value>,
    /// Compute instance type for the job.
    pub instance_type: String,
    /// Location of the training input data.
    pub input_data_location: String,
    /// Role or credential reference the service should assume.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
}

impl TrainingRequest {
    /// Creates a new training request with a time-suffixed job name.
    pub fn new(
        model_name: impl Into<String>,
        instance_type: impl Into<String>,
        input_data_location: impl Into<String>,
    ) -> Self {
        let model_name = model_name.into();
        let job_name = format!(
            "{model_name}-{}",
            Timestamp::now().strftime("%Y%m%d-%H%M%S")
        );

        Self {
            job_name,
            model_name,
            hyperparameters: BTreeMap::new(),
            instance_type: instance_type.into(),
            input_data_location: input_data_location.into(),
            role: None,
        }
    }

    /// Overrides the generated job name.
    pub fn with_job_name(mut self, job_name: impl Into<String>) -> Self {
        self.job_name = job_name.into();
        self
    }

    /// Adds a single hyperparameter.
    pub fn with_hyperparameter(
        mut self,
        name: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.hyperparameters.insert(name.into(), value.into());
        self
    }

    /// Replaces all hyperparameters.
    pub fn with_hyperparameters(
        mut self,
        hyperparameters: BTreeMap<String, serde_json::Value>,
    ) -> Self {
        self.hyperparameters = hyperparameters;
        self
    }

    /// Sets the role or credential reference.
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_name_carries_model_prefix() {
        let request = TrainingRequest::new("iris-classifier", "ml.m5.large", "data/train");

        assert!(request.job_name.starts_with("iris-classifier-"));
        // iris-classifier-YYYYmmdd-HHMMSS
        assert_eq!(request.job_name.len(), "iris-classifier-".len() + 15);
    }

    #[test]
    fn test_builder() {
        let request = TrainingRequest::new("iris", "ml.m5.large", "data/train")
            .with_job_name("iris-manual")
            .with_hyperparameter("n_estimators", 100)
            .with_role("arn:role/train");

        assert_eq!(request.job_name, "iris-manual");
        assert_eq!(request.hyperparameters["n_estimators"], 100);
        assert_eq!(request.role.as_deref(), Some("arn:role/train"));
    }
}
