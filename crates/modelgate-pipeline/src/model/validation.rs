//! Endpoint validation samples and report.

use jiff::SignedDuration;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use strum::{AsRefStr, Display};

/// One labelled request used for functional checks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationSample {
    /// Short label used in logs.
    #[serde(default)]
    pub name: String,
    /// Payload sent to the endpoint.
    pub input: Value,
    /// Expected prediction.
    pub expected: Value,
}

impl ValidationSample {
    /// Creates a new sample.
    pub fn new(name: impl Into<String>, input: Value, expected: Value) -> Self {
        Self {
            name: name.into(),
            input,
            expected,
        }
    }

    /// Compares a prediction against the expected output.
    ///
    /// Numbers match within `tolerance`, arrays and objects match element by
    /// element, anything else must be equal. A single-element array response
    /// is unwrapped when a scalar is expected, since endpoints answer batch
    /// requests with one prediction per row.
    pub fn matches(&self, actual: &Value, tolerance: f64) -> bool {
        let actual = match (actual, &self.expected) {
            (Value::Array(items), expected) if items.len() == 1 && !expected.is_array() => {
                &items[0]
            }
            _ => actual,
        };

        values_match(actual, &self.expected, tolerance)
    }
}

fn values_match(actual: &Value, expected: &Value, tolerance: f64) -> bool {
    match (actual, expected) {
        (Value::Number(a), Value::Number(e)) => match (a.as_f64(), e.as_f64()) {
            (Some(a), Some(e)) => (a - e).abs() <= tolerance,
            _ => a == e,
        },
        (Value::Array(a), Value::Array(e)) => {
            a.len() == e.len()
                && a.iter()
                    .zip(e)
                    .all(|(a, e)| values_match(a, e, tolerance))
        }
        (Value::Object(a), Value::Object(e)) => {
            a.len() == e.len()
                && e.iter().all(|(key, e)| {
                    a.get(key)
                        .is_some_and(|a| values_match(a, e, tolerance))
                })
        }
        _ => actual == expected,
    }
}

/// Labelled iris measurements used when no samples are configured.
pub fn default_samples() -> Vec<ValidationSample> {
    [
        ("setosa-1", [5.1, 3.5, 1.4, 0.2], 0),
        ("setosa-2", [4.9, 3.0, 1.4, 0.2], 0),
        ("versicolor-1", [7.0, 3.2, 4.7, 1.4], 1),
        ("versicolor-2", [6.4, 3.2, 4.5, 1.5], 1),
        ("virginica-1", [6.3, 3.3, 6.0, 2.5], 2),
        ("virginica-2", [5.8, 2.7, 5.1, 1.9], 2),
        ("boundary-1", [6.0, 3.0, 4.0, 1.2], 1),
        ("boundary-2", [6.5, 3.0, 5.0, 1.8], 2),
    ]
    .into_iter()
    .map(|(name, features, class)| ValidationSample::new(name, json!([features]), json!(class)))
    .collect()
}

/// Overall validation verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(AsRefStr, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ValidationStatus {
    /// All criteria met.
    Passed,
    /// At least one criterion failed.
    Failed,
}

/// Summary statistics over successful probe latencies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LatencyStats {
    /// Arithmetic mean.
    pub mean: SignedDuration,
    /// 95th percentile (nearest rank).
    pub p95: SignedDuration,
    /// Fastest request.
    pub min: SignedDuration,
    /// Slowest request.
    pub max: SignedDuration,
}

impl LatencyStats {
    /// Computes statistics over a set of samples, `None` when empty.
    pub fn from_samples(samples: &[SignedDuration]) -> Option<Self> {
        if samples.is_empty() {
            return None;
        }

        let mut sorted = samples.to_vec();
        sorted.sort_unstable();

        let total_nanos: i128 = sorted.iter().map(|d| d.as_nanos()).sum();
        let mean_nanos = total_nanos / sorted.len() as i128;
        let mean = SignedDuration::from_nanos(i64::try_from(mean_nanos).unwrap_or(i64::MAX));

        // Nearest-rank percentile, clamped to the last sample.
        let rank = ((sorted.len() as f64) * 0.95) as usize;
        let p95 = sorted[rank.min(sorted.len() - 1)];

        Some(Self {
            mean,
            p95,
            min: sorted[0],
            max: sorted[sorted.len() - 1],
        })
    }
}

/// Result of validating one endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Endpoint that was validated.
    pub endpoint_name: String,
    /// Whether the endpoint reported itself in service.
    pub health_check_passed: bool,
    /// Fraction of samples whose prediction matched.
    pub sample_predictions_correct_fraction: f64,
    /// Number of samples checked.
    pub samples_total: usize,
    /// Number of samples that matched.
    pub samples_correct: usize,
    /// Latencies of successful probe requests, in request order.
    pub latency_samples: Vec<SignedDuration>,
    /// Statistics over `latency_samples`, absent when no probe succeeded.
    pub latency: Option<LatencyStats>,
    /// Fraction of probe requests that succeeded.
    pub success_rate: f64,
    /// Overall verdict.
    pub overall_status: ValidationStatus,
    /// Human-readable reasons for each failed or degraded criterion.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub issues: Vec<String>,
}

impl ValidationReport {
    /// Returns whether the endpoint passed validation.
    pub fn passed(&self) -> bool {
        self.overall_status == ValidationStatus::Passed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_expected_unwraps_single_prediction() {
        let sample = ValidationSample::new("setosa", json!([[5.1, 3.5, 1.4, 0.2]]), json!(0));

        assert!(sample.matches(&json!([0]), 0.0));
        assert!(sample.matches(&json!(0.0), 0.0));
        assert!(!sample.matches(&json!([1]), 0.0));
        assert!(!sample.matches(&json!([0, 1]), 0.0));
    }

    #[test]
    fn test_tolerance_applies_to_nested_numbers() {
        let sample = ValidationSample::new("probs", json!([1]), json!({"p": [0.2, 0.8]}));

        assert!(sample.matches(&json!({"p": [0.2001, 0.7999]}), 1e-3));
        assert!(!sample.matches(&json!({"p": [0.25, 0.75]}), 1e-3));
        assert!(!sample.matches(&json!({"q": [0.2, 0.8]}), 1e-3));
    }

    #[test]
    fn test_latency_stats() {
        let samples: Vec<_> = (1..=20).map(SignedDuration::from_millis).collect();
        let stats = LatencyStats::from_samples(&samples).unwrap();

        assert_eq!(stats.min, SignedDuration::from_millis(1));
        assert_eq!(stats.max, SignedDuration::from_millis(20));
        assert_eq!(stats.p95, SignedDuration::from_millis(20));
        assert_eq!(stats.mean, SignedDuration::from_micros(10_500));
        assert!(LatencyStats::from_samples(&[]).is_none());
    }

    #[test]
    fn test_default_samples_are_labelled() {
        let samples = default_samples();
        assert_eq!(samples.len(), 8);
        assert!(samples.iter().all(|s| s.expected.is_u64()));
    }
}
