//! Promotion decision produced by the gate.

use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display};

/// Why the gate did or did not approve a promotion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PromotionReason {
    /// Accuracy reached the promotion threshold.
    MeetsThreshold,
    /// Accuracy is below the minimum acceptable accuracy.
    BelowMinimum,
    /// Accuracy clears the minimum but not the promotion threshold.
    BelowTarget,
    /// Automatic deployment is disabled by configuration.
    ManualOverrideDisabled,
}

impl PromotionReason {
    /// Position on the accuracy scale, lowest first.
    ///
    /// `ManualOverrideDisabled` does not depend on accuracy and has no rank.
    pub const fn rank(&self) -> Option<u8> {
        match self {
            Self::BelowMinimum => Some(0),
            Self::BelowTarget => Some(1),
            Self::MeetsThreshold => Some(2),
            Self::ManualOverrideDisabled => None,
        }
    }
}

/// Outcome of comparing measured accuracy against the configured thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PromotionDecision {
    /// Whether the model should be deployed.
    pub should_deploy: bool,
    /// Reason for the decision.
    pub reason: PromotionReason,
    /// Accuracy the decision was based on.
    pub measured_accuracy: f64,
    /// Threshold the accuracy was compared against.
    pub threshold_used: f64,
}

impl PromotionDecision {
    /// Human-readable explanation of the decision.
    pub fn explain(&self) -> String {
        let accuracy = self.measured_accuracy;
        let threshold = self.threshold_used;
        match self.reason {
            PromotionReason::MeetsThreshold => format!(
                "model accuracy ({accuracy:.4}) meets deployment threshold ({threshold:.4})"
            ),
            PromotionReason::BelowTarget => format!(
                "model accuracy ({accuracy:.4}) meets the minimum but is below the deployment threshold ({threshold:.4})"
            ),
            PromotionReason::BelowMinimum => format!(
                "model accuracy ({accuracy:.4}) is below the minimum threshold ({threshold:.4})"
            ),
            PromotionReason::ManualOverrideDisabled => {
                format!("automatic deployment is disabled (model accuracy {accuracy:.4})")
            }
        }
    }
}
