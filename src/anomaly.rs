//! Baseline-relative anomaly detection
//!
//! A current value is anomalous when its relative deviation from the user's
//! own baseline reaches the noise floor. Severity reflects magnitude only;
//! the deviation direction is reported separately so consumers can decide
//! whether a sharp improvement deserves attention.

use crate::baseline::BaselineMetrics;
use crate::types::{AnomalyRecord, DeviationDirection, MetricCategory, Severity};

/// Relative deviations below this are noise
pub const NOISE_FLOOR: f64 = 0.2;
/// Deviations above this are medium severity
pub const MEDIUM_THRESHOLD: f64 = 0.3;
/// Deviations above this are high severity
pub const HIGH_THRESHOLD: f64 = 0.5;
/// Confidence ceiling
pub const MAX_CONFIDENCE: f64 = 0.95;

/// Action used when the lookup table has no entry
pub const GENERIC_ACTION: &str = "Monitor and consult healthcare provider if needed";

use DeviationDirection::{Decrease, Increase};
use MetricCategory::{Energy, Mood, Pain, Sleep, Stress, Symptoms};
use Severity::{High, Low, Medium};

/// Suggested actions keyed by (category, direction, severity)
static SUGGESTED_ACTIONS: &[(MetricCategory, DeviationDirection, Severity, &str)] = &[
    (Mood, Decrease, Low, "Monitor mood over the next few days"),
    (Mood, Decrease, Medium, "Consider stress reduction techniques or activities that boost mood"),
    (Mood, Decrease, High, "Consider consulting a healthcare provider about mood changes"),
    (Mood, Increase, Low, "Great job! Keep up the positive activities"),
    (Mood, Increase, Medium, "Continue with current positive lifestyle habits"),
    (Mood, Increase, High, "Share what helped improve your mood with your care circle"),
    (Energy, Decrease, Low, "Ensure adequate rest and hydration"),
    (Energy, Decrease, Medium, "Review sleep habits and consider stress reduction"),
    (Energy, Decrease, High, "Consult healthcare provider about persistent fatigue"),
    (Energy, Increase, Low, "Continue current activity levels"),
    (Energy, Increase, Medium, "Keep up with your healthy energy-supporting habits"),
    (Energy, Increase, High, "Share your energy-boosting techniques with your care circle"),
    (Sleep, Decrease, Low, "Monitor sleep over the next few nights"),
    (Sleep, Decrease, Medium, "Review sleep hygiene practices"),
    (Sleep, Decrease, High, "Consider consulting a healthcare provider about sleep issues"),
    (Sleep, Increase, Low, "Continue current sleep routine"),
    (Sleep, Increase, Medium, "Maintain consistent sleep schedule"),
    (Sleep, Increase, High, "Share successful sleep habits with your care circle"),
    (Pain, Decrease, Low, "Continue pain management techniques"),
    (Pain, Decrease, Medium, "Keep track of what may be helping reduce pain"),
    (Pain, Decrease, High, "Share pain reduction strategies with healthcare provider"),
    (Pain, Increase, Low, "Monitor pain levels over the next few days"),
    (Pain, Increase, Medium, "Consider rest and appropriate pain management"),
    (Pain, Increase, High, "Consult healthcare provider about increased pain"),
    (Stress, Decrease, Low, "Continue stress management techniques"),
    (Stress, Decrease, Medium, "Keep up with relaxation practices"),
    (Stress, Decrease, High, "Share stress reduction strategies with your care circle"),
    (Stress, Increase, Low, "Practice brief relaxation techniques"),
    (Stress, Increase, Medium, "Increase stress management activities"),
    (Stress, Increase, High, "Consider discussing stress levels with healthcare provider"),
    (Symptoms, Decrease, Low, "Continue monitoring symptoms"),
    (Symptoms, Decrease, Medium, "Note what may be helping reduce symptoms"),
    (Symptoms, Decrease, High, "Discuss symptom improvement with healthcare provider"),
    (Symptoms, Increase, Low, "Keep tracking these symptoms over the next few days"),
    (Symptoms, Increase, Medium, "Consider rest and symptom management techniques"),
    (Symptoms, Increase, High, "Consult healthcare provider about increased symptoms"),
];

/// Look up the suggested action for a deviation
pub fn suggested_action(
    category: MetricCategory,
    direction: DeviationDirection,
    severity: Severity,
) -> &'static str {
    SUGGESTED_ACTIONS
        .iter()
        .find(|(c, d, s, _)| *c == category && *d == direction && *s == severity)
        .map(|(_, _, _, action)| *action)
        .unwrap_or(GENERIC_ACTION)
}

/// Detects deviations of current values from baseline
pub struct AnomalyDetector;

impl AnomalyDetector {
    /// Check one metric value against its baseline.
    ///
    /// Returns `None` when the baseline is unavailable or zero, or when the
    /// relative deviation is under the noise floor.
    pub fn detect(
        category: MetricCategory,
        current: f64,
        baseline: &BaselineMetrics,
    ) -> Option<AnomalyRecord> {
        if !current.is_finite() {
            return None;
        }
        let baseline_value = baseline.get(category)?;

        let diff = current - baseline_value;
        let percent_diff = if baseline_value != 0.0 {
            diff / baseline_value
        } else {
            0.0
        };
        let magnitude = percent_diff.abs();

        if magnitude < NOISE_FLOOR {
            return None;
        }

        let severity = if magnitude > HIGH_THRESHOLD {
            Severity::High
        } else if magnitude > MEDIUM_THRESHOLD {
            Severity::Medium
        } else {
            Severity::Low
        };

        let direction = if percent_diff > 0.0 {
            DeviationDirection::Increase
        } else {
            DeviationDirection::Decrease
        };

        let relative_word = match direction {
            DeviationDirection::Increase => "higher",
            DeviationDirection::Decrease => "lower",
        };
        let rounded_points = (diff * 10.0).round().abs() / 10.0;

        Some(AnomalyRecord {
            metric_category: category,
            description: format!(
                "{rounded_points:.1} points {relative_word} than usual ({:.2}% change)",
                magnitude * 100.0
            ),
            severity,
            confidence: (0.5 + magnitude).min(MAX_CONFIDENCE),
            direction,
            percent_diff,
            suggested_action: suggested_action(category, direction, severity).to_string(),
        })
    }

    /// Run detection for every metric with a current value
    pub fn detect_all(
        current: &[(MetricCategory, f64)],
        baseline: &BaselineMetrics,
    ) -> Vec<AnomalyRecord> {
        current
            .iter()
            .filter_map(|(category, value)| Self::detect(*category, *value, baseline))
            .collect()
    }
}
