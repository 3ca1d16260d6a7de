//! Trend classification
//!
//! Series are always ordered oldest to newest. A positive least-squares slope
//! therefore means the metric rises over real time and is labelled
//! `improving`; history is sorted ascending here before any series is built.

use crate::types::{CheckInRecord, MetricCategory, TrendDirection, TrendMagnitude, TrendRecord};
use serde::{Deserialize, Serialize};

/// Fewer points than this always classify as stable
pub const MIN_TREND_POINTS: usize = 3;
/// Slopes within +/- this band are stable
pub const SLOPE_THRESHOLD: f64 = 0.1;

/// Direction of the three behavior metrics and their majority
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorTrends {
    pub mood_trend: TrendDirection,
    pub energy_trend: TrendDirection,
    pub sleep_trend: TrendDirection,
    pub overall_trend: TrendDirection,
}

impl Default for BehaviorTrends {
    fn default() -> Self {
        Self {
            mood_trend: TrendDirection::Stable,
            energy_trend: TrendDirection::Stable,
            sleep_trend: TrendDirection::Stable,
            overall_trend: TrendDirection::Stable,
        }
    }
}

/// Per-metric trend details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecificTrends {
    pub mood: TrendRecord,
    pub energy: TrendRecord,
    pub sleep: TrendRecord,
    pub pain: TrendRecord,
    pub stress: TrendRecord,
    pub symptoms: TrendRecord,
}

/// Full trend report over a check-in window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub overall_trend: TrendDirection,
    pub specific_trends: SpecificTrends,
    pub prediction_confidence: f64,
    pub forecast_insights: Vec<String>,
}

/// Least-squares slope of `values` against their index.
///
/// Returns `None` when fewer than two points exist.
pub fn slope(values: &[f64]) -> Option<f64> {
    let n = values.len();
    if n < 2 {
        return None;
    }
    let n_f = n as f64;
    let x_sum = (n_f * (n_f - 1.0)) / 2.0;
    let y_sum: f64 = values.iter().sum();
    let xy_sum: f64 = values.iter().enumerate().map(|(i, y)| i as f64 * y).sum();
    let x2_sum: f64 = (0..n).map(|i| (i * i) as f64).sum();

    let denominator = n_f * x2_sum - x_sum * x_sum;
    if denominator == 0.0 {
        return None;
    }
    Some((n_f * xy_sum - x_sum * y_sum) / denominator)
}

/// Classifies metric series
pub struct TrendAnalyzer;

impl TrendAnalyzer {
    /// Direction of an oldest-to-newest series
    pub fn direction(values: &[f64]) -> TrendDirection {
        if values.len() < MIN_TREND_POINTS {
            return TrendDirection::Stable;
        }
        match slope(values) {
            Some(s) if s > SLOPE_THRESHOLD => TrendDirection::Improving,
            Some(s) if s < -SLOPE_THRESHOLD => TrendDirection::Declining,
            _ => TrendDirection::Stable,
        }
    }

    /// Magnitude from the value range
    pub fn magnitude(values: &[f64]) -> TrendMagnitude {
        if values.len() < MIN_TREND_POINTS {
            return TrendMagnitude::Slight;
        }
        let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let min = values.iter().copied().fold(f64::INFINITY, f64::min);
        let range = max - min;

        if range <= 1.0 {
            TrendMagnitude::Slight
        } else if range <= 2.0 {
            TrendMagnitude::Moderate
        } else {
            TrendMagnitude::Significant
        }
    }

    /// Confidence in a single metric's trend
    pub fn confidence(data_points: usize) -> f64 {
        if data_points > 7 {
            0.8
        } else {
            0.6
        }
    }

    /// Coarser confidence for forward-looking statements
    pub fn prediction_confidence(check_ins: usize) -> f64 {
        match check_ins {
            n if n < 7 => 0.5,
            n if n < 14 => 0.7,
            n if n < 21 => 0.8,
            _ => 0.9,
        }
    }

    /// Classify one metric series
    pub fn analyze(metric: MetricCategory, values: &[f64], timeframe: String) -> TrendRecord {
        TrendRecord {
            metric,
            direction: Self::direction(values),
            magnitude: Self::magnitude(values),
            data_points: values.len(),
            confidence: Self::confidence(values.len()),
            timeframe,
        }
    }

    /// Present values of `metric`, oldest first
    pub fn series(records: &[CheckInRecord], metric: MetricCategory) -> Vec<f64> {
        let mut sorted: Vec<&CheckInRecord> = records.iter().collect();
        sorted.sort_by_key(|r| r.date);
        sorted.iter().filter_map(|r| r.metric(metric)).collect()
    }

    /// Majority vote; ties are stable
    pub fn overall(directions: &[TrendDirection]) -> TrendDirection {
        let improving = directions
            .iter()
            .filter(|d| **d == TrendDirection::Improving)
            .count();
        let declining = directions
            .iter()
            .filter(|d| **d == TrendDirection::Declining)
            .count();

        if improving > declining {
            TrendDirection::Improving
        } else if declining > improving {
            TrendDirection::Declining
        } else {
            TrendDirection::Stable
        }
    }

    /// Behavior trends from oldest-to-newest mood, energy and sleep series
    pub fn behavior_trends(mood: &[f64], energy: &[f64], sleep: &[f64]) -> BehaviorTrends {
        let mood_trend = Self::direction(mood);
        let energy_trend = Self::direction(energy);
        let sleep_trend = Self::direction(sleep);

        BehaviorTrends {
            mood_trend,
            energy_trend,
            sleep_trend,
            overall_trend: Self::overall(&[mood_trend, energy_trend, sleep_trend]),
        }
    }

    /// Behavior trends straight from check-in history
    pub fn behavior_trends_from_records(records: &[CheckInRecord]) -> BehaviorTrends {
        Self::behavior_trends(
            &Self::series(records, MetricCategory::Mood),
            &Self::series(records, MetricCategory::Energy),
            &Self::series(records, MetricCategory::Sleep),
        )
    }

    /// Symptom burden trend: average symptoms per check-in
    pub fn symptoms_trend(records: &[CheckInRecord]) -> TrendRecord {
        let counts: Vec<f64> = records.iter().map(|r| r.symptoms.len() as f64).collect();
        let average = crate::baseline::mean(&counts).unwrap_or(0.0);

        TrendRecord {
            metric: MetricCategory::Symptoms,
            direction: if average > 2.0 {
                TrendDirection::Declining
            } else {
                TrendDirection::Stable
            },
            magnitude: if average > 3.0 {
                TrendMagnitude::Significant
            } else {
                TrendMagnitude::Slight
            },
            data_points: counts.len(),
            confidence: 0.7,
            timeframe: format!("{} days", records.len()),
        }
    }

    /// Trend records for every scored metric
    pub fn metric_trends(records: &[CheckInRecord]) -> Vec<TrendRecord> {
        let timeframe = format!("{} days", records.len());
        MetricCategory::SCORED
            .iter()
            .map(|metric| Self::analyze(*metric, &Self::series(records, *metric), timeframe.clone()))
            .collect()
    }

    /// Full trend report for a check-in window
    pub fn trend_analysis(records: &[CheckInRecord]) -> TrendAnalysis {
        let timeframe = format!("{} days", records.len());
        let record_for =
            |metric| Self::analyze(metric, &Self::series(records, metric), timeframe.clone());

        let specific_trends = SpecificTrends {
            mood: record_for(MetricCategory::Mood),
            energy: record_for(MetricCategory::Energy),
            sleep: record_for(MetricCategory::Sleep),
            pain: record_for(MetricCategory::Pain),
            stress: record_for(MetricCategory::Stress),
            symptoms: Self::symptoms_trend(records),
        };

        let overall_trend = Self::overall(&[
            specific_trends.mood.direction,
            specific_trends.energy.direction,
            specific_trends.sleep.direction,
        ]);

        TrendAnalysis {
            overall_trend,
            prediction_confidence: Self::prediction_confidence(records.len()),
            forecast_insights: Self::forecast_insights(overall_trend, records.len()),
            specific_trends,
        }
    }

    fn forecast_insights(overall: TrendDirection, check_ins: usize) -> Vec<String> {
        let mut insights = Vec::new();

        match overall {
            TrendDirection::Improving => insights.push(
                "If current trends continue, you may see sustained improvement in overall well-being"
                    .to_string(),
            ),
            TrendDirection::Declining => insights.push(
                "Early intervention may help prevent further decline in health metrics".to_string(),
            ),
            TrendDirection::Stable => {}
        }

        if check_ins > 14 {
            insights
                .push("Your consistent data collection provides reliable trend predictions".to_string());
        }

        insights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use pretty_assertions::assert_eq;

    fn records_with_mood(values: &[f64]) -> Vec<CheckInRecord> {
        values
            .iter()
            .enumerate()
            .map(|(i, v)| {
                let date = NaiveDate::from_ymd_opt(2024, 3, 1 + i as u32).unwrap();
                let mut r = CheckInRecord::new("user-1", date);
                r.mood_score = Some(*v);
                r
            })
            .collect()
    }

    #[test]
    fn test_rising_series_is_improving_and_significant() {
        let values = [5.0, 6.0, 7.0, 8.0, 9.0];
        assert_eq!(slope(&values), Some(1.0));

        let record = TrendAnalyzer::analyze(MetricCategory::Mood, &values, "5 days".to_string());
        assert_eq!(record.direction, TrendDirection::Improving);
        assert_eq!(record.magnitude, TrendMagnitude::Significant);
        assert_eq!(record.data_points, 5);
        assert_eq!(record.confidence, 0.6);
    }

    #[test]
    fn test_falling_series_is_declining() {
        assert_eq!(
            TrendAnalyzer::direction(&[9.0, 8.0, 6.0, 5.0]),
            TrendDirection::Declining
        );
    }

    #[test]
    fn test_fewer_than_three_points_is_stable() {
        assert_eq!(TrendAnalyzer::direction(&[]), TrendDirection::Stable);
        assert_eq!(TrendAnalyzer::direction(&[1.0]), TrendDirection::Stable);
        assert_eq!(TrendAnalyzer::direction(&[1.0, 10.0]), TrendDirection::Stable);
    }

    #[test]
    fn test_small_slope_is_stable() {
        // slope 0.05
        assert_eq!(
            TrendAnalyzer::direction(&[5.0, 5.05, 5.1, 5.15]),
            TrendDirection::Stable
        );
    }

    #[test]
    fn test_magnitude_bands() {
        assert_eq!(TrendAnalyzer::magnitude(&[5.0, 5.5, 6.0]), TrendMagnitude::Slight);
        assert_eq!(TrendAnalyzer::magnitude(&[5.0, 6.0, 7.0]), TrendMagnitude::Moderate);
        assert_eq!(TrendAnalyzer::magnitude(&[5.0, 6.0, 7.5]), TrendMagnitude::Significant);
    }

    #[test]
    fn test_confidence_steps() {
        assert_eq!(TrendAnalyzer::confidence(7), 0.6);
        assert_eq!(TrendAnalyzer::confidence(8), 0.8);
        assert_eq!(TrendAnalyzer::prediction_confidence(6), 0.5);
        assert_eq!(TrendAnalyzer::prediction_confidence(7), 0.7);
        assert_eq!(TrendAnalyzer::prediction_confidence(14), 0.8);
        assert_eq!(TrendAnalyzer::prediction_confidence(21), 0.9);
    }

    #[test]
    fn test_series_sorts_oldest_first() {
        let mut records = records_with_mood(&[3.0, 5.0, 7.0]);
        records.reverse();
        assert_eq!(
            TrendAnalyzer::series(&records, MetricCategory::Mood),
            vec![3.0, 5.0, 7.0]
        );
        assert_eq!(
            TrendAnalyzer::behavior_trends_from_records(&records).mood_trend,
            TrendDirection::Improving
        );
    }

    #[test]
    fn test_overall_majority_and_ties() {
        use TrendDirection::*;
        assert_eq!(TrendAnalyzer::overall(&[Improving, Improving, Declining]), Improving);
        assert_eq!(TrendAnalyzer::overall(&[Declining, Stable, Stable]), Declining);
        assert_eq!(TrendAnalyzer::overall(&[Improving, Declining, Stable]), Stable);
    }

    #[test]
    fn test_symptoms_trend_by_average_burden() {
        let mut records = records_with_mood(&[5.0, 5.0]);
        records[0].symptoms = vec!["a".into(), "b".into(), "c".into()];
        records[1].symptoms = vec!["a".into(), "b".into(), "c".into(), "d".into(), "e".into()];

        let trend = TrendAnalyzer::symptoms_trend(&records);
        assert_eq!(trend.direction, TrendDirection::Declining);
        assert_eq!(trend.magnitude, TrendMagnitude::Significant);
        assert_eq!(trend.confidence, 0.7);

        let empty = TrendAnalyzer::symptoms_trend(&[]);
        assert_eq!(empty.direction, TrendDirection::Stable);
        assert_eq!(empty.data_points, 0);
    }

    #[test]
    fn test_trend_analysis_report() {
        let values: Vec<f64> = (0..15).map(|i| 3.0 + i as f64 * 0.4).collect();
        let analysis = TrendAnalyzer::trend_analysis(&records_with_mood(&values));

        assert_eq!(analysis.overall_trend, TrendDirection::Improving);
        assert_eq!(analysis.specific_trends.mood.data_points, 15);
        assert_eq!(analysis.specific_trends.pain.direction, TrendDirection::Stable);
        assert_eq!(analysis.prediction_confidence, 0.8);
        assert_eq!(analysis.forecast_insights.len(), 2);
    }
}
