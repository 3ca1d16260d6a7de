//! Composite 0-100 health score
//!
//! Combines sentiment, risk, overall trend and check-in consistency. The raw
//! sum can leave the range, so the result is clamped and then rounded.

use crate::risk::clamp_risk;
use crate::types::{ResponseAnalysisResult, TrendDirection};
use serde::{Deserialize, Serialize};

pub const BASE_SCORE: f64 = 50.0;
pub const MAX_SCORE: f64 = 100.0;

/// Fraction of expected check-in days that actually had a check-in
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyRatio(f64);

impl ConsistencyRatio {
    /// Ratio of `days_present` to `expected_days`, capped at 1
    pub fn from_days(days_present: u32, expected_days: u32) -> Self {
        if expected_days == 0 {
            return Self(0.0);
        }
        Self((f64::from(days_present) / f64::from(expected_days)).min(1.0))
    }

    pub fn value(&self) -> f64 {
        self.0
    }
}

impl Default for ConsistencyRatio {
    fn default() -> Self {
        Self(0.0)
    }
}

/// Inputs to the health score
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HealthScoreInputs {
    /// -1 to 1
    pub sentiment_score: f64,
    /// 0 to 10
    pub risk_score: f64,
    pub overall_trend: TrendDirection,
    pub consistency: ConsistencyRatio,
}

impl HealthScoreInputs {
    pub fn from_analysis(
        analysis: &ResponseAnalysisResult,
        overall_trend: TrendDirection,
        consistency: ConsistencyRatio,
    ) -> Self {
        Self {
            sentiment_score: analysis.sentiment_score,
            risk_score: analysis.risk_score,
            overall_trend,
            consistency,
        }
    }
}

/// Computes the composite score
pub struct HealthScoreCalculator;

impl HealthScoreCalculator {
    pub fn compute(inputs: &HealthScoreInputs) -> u8 {
        let sentiment = if inputs.sentiment_score.is_finite() {
            inputs.sentiment_score.clamp(-1.0, 1.0)
        } else {
            0.0
        };
        let risk = clamp_risk(inputs.risk_score);

        let trend_points = match inputs.overall_trend {
            TrendDirection::Improving => 20.0,
            TrendDirection::Stable => 10.0,
            TrendDirection::Declining => -10.0,
        };

        let score = BASE_SCORE
            + ((sentiment + 1.0) / 2.0) * 40.0
            + (10.0 - risk) * 3.0
            + trend_points * 0.2
            + inputs.consistency.value() * 10.0;

        // Clamped to [0, 100] so the cast cannot truncate
        score.clamp(0.0, MAX_SCORE).round() as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(sentiment: f64, risk: f64, trend: TrendDirection, days: u32) -> HealthScoreInputs {
        HealthScoreInputs {
            sentiment_score: sentiment,
            risk_score: risk,
            overall_trend: trend,
            consistency: ConsistencyRatio::from_days(days, 30),
        }
    }

    #[test]
    fn test_best_case_clamps_to_hundred() {
        // 50 + 40 + 30 + 4 + 10 = 134
        let score = HealthScoreCalculator::compute(&inputs(1.0, 0.0, TrendDirection::Improving, 30));
        assert_eq!(score, 100);
    }

    #[test]
    fn test_worst_case_keeps_base_score() {
        // 50 + 0 + 0 - 2 + 0 = 48
        let score =
            HealthScoreCalculator::compute(&inputs(-1.0, 10.0, TrendDirection::Declining, 0));
        assert_eq!(score, 48);
    }

    #[test]
    fn test_mid_range_score() {
        // 50 + 20 + 15 + 2 + 5 = 92
        let score = HealthScoreCalculator::compute(&inputs(0.0, 5.0, TrendDirection::Stable, 15));
        assert_eq!(score, 92);
    }

    #[test]
    fn test_out_of_range_inputs_are_clamped_first() {
        let wild = HealthScoreCalculator::compute(&inputs(-9.0, 50.0, TrendDirection::Declining, 0));
        let floor =
            HealthScoreCalculator::compute(&inputs(-1.0, 10.0, TrendDirection::Declining, 0));
        assert_eq!(wild, floor);
    }

    #[test]
    fn test_non_finite_sentiment_counts_as_neutral() {
        let nan = HealthScoreCalculator::compute(&inputs(f64::NAN, 0.0, TrendDirection::Improving, 30));
        let neutral = HealthScoreCalculator::compute(&inputs(0.0, 0.0, TrendDirection::Improving, 30));
        assert_eq!(nan, neutral);
        assert_eq!(nan, 100);

        let inf = HealthScoreCalculator::compute(&inputs(f64::INFINITY, 5.0, TrendDirection::Stable, 15));
        assert_eq!(inf, 92);
    }

    #[test]
    fn test_consistency_ratio_caps_at_one() {
        assert_eq!(ConsistencyRatio::from_days(45, 30).value(), 1.0);
        assert_eq!(ConsistencyRatio::from_days(15, 30).value(), 0.5);
        assert_eq!(ConsistencyRatio::from_days(3, 0).value(), 0.0);
    }
}
