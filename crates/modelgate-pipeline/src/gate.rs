//! Accuracy gate.
//!
//! The gate is a pure function of the measured accuracy and the configured
//! thresholds. It never touches the training result it reads from and has
//! no side effects, so the same inputs always produce the same decision.

use crate::config::PipelineConfig;
use crate::model::{PromotionDecision, PromotionReason, TrainingResult};

/// Tracing target for gate decisions.
pub const TRACING_TARGET: &str = "modelgate_pipeline::gate";

/// Metric read from the training result when no other name is configured.
pub const DEFAULT_ACCURACY_METRIC: &str = "accuracy";
/// Metric consulted when [`DEFAULT_ACCURACY_METRIC`] is absent.
pub const DEFAULT_FALLBACK_METRIC: &str = "validation_accuracy";

/// Decides whether a trained model is promoted.
///
/// Reads the accuracy from the default metric names. Use [`Gate`] to read a
/// configured metric instead.
pub fn decide(
    result: &TrainingResult,
    target_threshold: f64,
    minimum_threshold: f64,
    auto_deploy_enabled: bool,
) -> PromotionDecision {
    let accuracy = result.accuracy(DEFAULT_ACCURACY_METRIC, Some(DEFAULT_FALLBACK_METRIC));
    decide_accuracy(
        accuracy,
        target_threshold,
        minimum_threshold,
        auto_deploy_enabled,
    )
}

/// Decides whether a model with the given accuracy is promoted.
///
/// A NaN accuracy is treated as below the minimum.
pub fn decide_accuracy(
    accuracy: f64,
    target_threshold: f64,
    minimum_threshold: f64,
    auto_deploy_enabled: bool,
) -> PromotionDecision {
    let (should_deploy, reason, threshold_used) = if !auto_deploy_enabled {
        (false, PromotionReason::ManualOverrideDisabled, target_threshold)
    } else if accuracy.is_nan() || accuracy < minimum_threshold {
        (false, PromotionReason::BelowMinimum, minimum_threshold)
    } else if accuracy < target_threshold {
        (false, PromotionReason::BelowTarget, target_threshold)
    } else {
        (true, PromotionReason::MeetsThreshold, target_threshold)
    };

    PromotionDecision {
        should_deploy,
        reason,
        measured_accuracy: accuracy,
        threshold_used,
    }
}

/// Gate bound to a resolved configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct Gate {
    target_threshold: f64,
    minimum_threshold: f64,
    auto_deploy_enabled: bool,
    metric: String,
    fallback_metric: Option<String>,
}

impl Gate {
    /// Creates a gate with the default metric names.
    pub fn new(target_threshold: f64, minimum_threshold: f64, auto_deploy_enabled: bool) -> Self {
        Self {
            target_threshold,
            minimum_threshold,
            auto_deploy_enabled,
            metric: DEFAULT_ACCURACY_METRIC.to_owned(),
            fallback_metric: Some(DEFAULT_FALLBACK_METRIC.to_owned()),
        }
    }

    /// Creates a gate from a validated configuration.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self {
            target_threshold: config.accuracy_threshold,
            minimum_threshold: config.minimum_accuracy,
            auto_deploy_enabled: config.auto_deploy_enabled,
            metric: config.accuracy_metric.clone(),
            fallback_metric: config.fallback_accuracy_metric.clone(),
        }
    }

    /// Evaluates a training result.
    pub fn evaluate(&self, result: &TrainingResult) -> PromotionDecision {
        let accuracy = result.accuracy(&self.metric, self.fallback_metric.as_deref());
        let decision = decide_accuracy(
            accuracy,
            self.target_threshold,
            self.minimum_threshold,
            self.auto_deploy_enabled,
        );

        tracing::info!(
            target: TRACING_TARGET,
            job_id = %result.job_id,
            accuracy = decision.measured_accuracy,
            threshold = decision.threshold_used,
            reason = %decision.reason,
            should_deploy = decision.should_deploy,
            "Promotion decision"
        );

        decision
    }
}
