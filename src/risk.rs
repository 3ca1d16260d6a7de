//! Composite risk scoring
//!
//! Risk starts at a fixed base and accumulates threshold increments from the
//! current check-in, plus a bonus for each metric that moved sharply away
//! from the user's baseline. The result is clamped to [0, 10].

use crate::baseline::BaselineMetrics;
use crate::types::{Answer, CheckInResponse, MetricCategory, RiskLevel};
use serde::{Deserialize, Serialize};

pub const BASE_RISK: f64 = 3.0;
pub const MAX_RISK: f64 = 10.0;
/// Absolute baseline deviation that earns the change bonus
pub const SIGNIFICANT_CHANGE_POINTS: f64 = 3.0;
pub const SIGNIFICANT_CHANGE_BONUS: f64 = 0.75;

/// The subset of a check-in that drives risk
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RiskInputs {
    pub mood: Option<f64>,
    pub pain: Option<f64>,
    pub stress: Option<f64>,
    pub sleep: Option<f64>,
    pub symptom_count: usize,
}

impl RiskInputs {
    /// Extract inputs from raw responses.
    ///
    /// The first numeric answer per metric wins. Each `symptoms` response
    /// counts its listed items, or one when the answer is not a list.
    pub fn from_responses(responses: &[CheckInResponse]) -> Self {
        let first_numeric = |category: MetricCategory| {
            responses
                .iter()
                .filter(|r| r.metric_category() == Some(category))
                .find_map(|r| r.answer.as_number())
        };

        let symptom_count = responses
            .iter()
            .filter(|r| r.metric_category() == Some(MetricCategory::Symptoms))
            .map(|r| match &r.answer {
                Answer::List(items) => items.len(),
                _ => 1,
            })
            .sum();

        Self {
            mood: first_numeric(MetricCategory::Mood),
            pain: first_numeric(MetricCategory::Pain),
            stress: first_numeric(MetricCategory::Stress),
            sleep: first_numeric(MetricCategory::Sleep),
            symptom_count,
        }
    }
}

/// Computes the bounded risk score
pub struct RiskScorer;

impl RiskScorer {
    /// Score current inputs against an optional baseline
    pub fn score(inputs: &RiskInputs, baseline: Option<&BaselineMetrics>) -> f64 {
        let mut risk = 0.0;

        // Mood and sleep: lower is worse
        if let Some(mood) = inputs.mood {
            if mood <= 3.0 {
                risk += 2.0;
            } else if mood <= 5.0 {
                risk += 1.0;
            }
        }

        if let Some(sleep) = inputs.sleep {
            if sleep <= 3.0 {
                risk += 1.5;
            } else if sleep <= 5.0 {
                risk += 0.75;
            }
        }

        // Pain and stress: higher is worse
        if let Some(pain) = inputs.pain {
            if pain >= 7.0 {
                risk += 2.0;
            } else if pain >= 5.0 {
                risk += 1.0;
            }
        }

        if let Some(stress) = inputs.stress {
            if stress >= 8.0 {
                risk += 2.0;
            } else if stress >= 6.0 {
                risk += 1.0;
            }
        }

        if inputs.symptom_count >= 3 {
            risk += 2.0;
        } else {
            risk += inputs.symptom_count as f64 * 0.5;
        }

        if let Some(baseline) = baseline {
            let significant_changes = [
                (inputs.mood, baseline.avg_mood_score),
                (inputs.pain, baseline.avg_pain_level),
            ]
            .iter()
            .filter(|pair| match pair {
                (Some(current), Some(base)) => (current - base).abs() >= SIGNIFICANT_CHANGE_POINTS,
                _ => false,
            })
            .count();

            risk += significant_changes as f64 * SIGNIFICANT_CHANGE_BONUS;
        }

        clamp_risk(BASE_RISK + risk)
    }

    /// Bucket a score into a level
    pub fn level(score: f64) -> RiskLevel {
        if score >= 6.5 {
            RiskLevel::High
        } else if score >= 4.0 {
            RiskLevel::Medium
        } else {
            RiskLevel::Low
        }
    }
}

/// Clamp any risk value into [0, 10]; NaN maps to the base risk
pub fn clamp_risk(score: f64) -> f64 {
    if score.is_nan() {
        return BASE_RISK;
    }
    score.clamp(0.0, MAX_RISK)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(category: &str, answer: Answer) -> CheckInResponse {
        CheckInResponse {
            question_id: format!("q-{category}"),
            question_text: format!("How is your {category}?"),
            answer,
            category: category.to_string(),
            timestamp: None,
        }
    }

    #[test]
    fn test_worst_case_clamps_to_ten() {
        let inputs = RiskInputs {
            mood: Some(2.0),
            pain: Some(8.0),
            stress: Some(9.0),
            sleep: Some(3.0),
            symptom_count: 0,
        };
        // 3 + 2 + 2 + 2 + 1.5 = 10.5
        let score = RiskScorer::score(&inputs, None);
        assert_eq!(score, 10.0);
        assert_eq!(RiskScorer::level(score), RiskLevel::High);
    }

    #[test]
    fn test_empty_check_in_is_base_risk() {
        let score = RiskScorer::score(&RiskInputs::default(), None);
        assert_eq!(score, BASE_RISK);
        assert_eq!(RiskScorer::level(score), RiskLevel::Low);
    }

    #[test]
    fn test_moderate_thresholds() {
        let inputs = RiskInputs {
            mood: Some(5.0),
            pain: Some(5.0),
            stress: Some(6.0),
            sleep: Some(5.0),
            symptom_count: 1,
        };
        // 3 + 1 + 1 + 1 + 0.75 + 0.5
        assert!((RiskScorer::score(&inputs, None) - 7.25).abs() < 1e-9);
    }

    #[test]
    fn test_symptom_count_caps_at_two_points() {
        let two = RiskInputs {
            symptom_count: 2,
            ..Default::default()
        };
        let many = RiskInputs {
            symptom_count: 7,
            ..Default::default()
        };
        assert_eq!(RiskScorer::score(&two, None), 4.0);
        assert_eq!(RiskScorer::score(&many, None), 5.0);
    }

    #[test]
    fn test_baseline_deviation_bonus() {
        let baseline = BaselineMetrics {
            avg_mood_score: Some(9.0),
            avg_pain_level: Some(1.0),
            ..Default::default()
        };
        let inputs = RiskInputs {
            mood: Some(6.0),
            pain: Some(4.0),
            ..Default::default()
        };
        // No threshold increments; two significant changes
        assert_eq!(RiskScorer::score(&inputs, Some(&baseline)), 4.5);

        let unavailable = BaselineMetrics::default();
        assert_eq!(RiskScorer::score(&inputs, Some(&unavailable)), 3.0);
    }

    #[test]
    fn test_level_boundaries() {
        assert_eq!(RiskScorer::level(6.5), RiskLevel::High);
        assert_eq!(RiskScorer::level(6.49), RiskLevel::Medium);
        assert_eq!(RiskScorer::level(4.0), RiskLevel::Medium);
        assert_eq!(RiskScorer::level(3.99), RiskLevel::Low);
    }

    #[test]
    fn test_clamp_risk_handles_out_of_range() {
        assert_eq!(clamp_risk(-2.0), 0.0);
        assert_eq!(clamp_risk(42.0), 10.0);
        assert_eq!(clamp_risk(f64::NAN), BASE_RISK);
    }

    #[test]
    fn test_inputs_from_responses() {
        let responses = vec![
            response("mood", Answer::Text("meh".to_string())),
            response("mood", Answer::Number(4.0)),
            response("pain", Answer::Number(6.0)),
            response("symptoms", Answer::List(vec!["nausea".into(), "dizziness".into()])),
            response("symptoms", Answer::Text("headache".to_string())),
            response("notes", Answer::Text("fine".to_string())),
        ];

        let inputs = RiskInputs::from_responses(&responses);
        assert_eq!(inputs.mood, Some(4.0));
        assert_eq!(inputs.pain, Some(6.0));
        assert_eq!(inputs.stress, None);
        assert_eq!(inputs.symptom_count, 3);
    }
}
