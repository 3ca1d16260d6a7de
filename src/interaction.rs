//! Interaction memory insights
//!
//! Derives trends, recommendations, risk factors and z-score anomalies from a
//! user's stored check-in interactions and the patterns most similar to the
//! current one. Everything here is pure; fetching is done by the analyzer.

use crate::baseline::mean_and_std;
use crate::trend::{BehaviorTrends, TrendAnalyzer, MIN_TREND_POINTS};
use crate::types::{MetricCategory, Severity, TrendDirection};
use crate::vector::{InteractionMetadata, InteractionRecord, SimilarityMatch, StoredVector};
use serde::{Deserialize, Serialize};

/// History needed before z-score anomalies are reported
pub const MIN_ANOMALY_HISTORY: usize = 5;
/// Risk score above which a stored interaction counts as high risk
pub const HIGH_RISK_HISTORY: f64 = 7.0;
/// Current risk above which provider contact is recommended
pub const PROVIDER_REFERRAL_RISK: f64 = 7.0;
/// Current risk above which the interaction itself is a risk factor
pub const ELEVATED_CURRENT_RISK: f64 = 6.0;

/// Metrics checked for z-score anomalies
const PATTERN_METRICS: [MetricCategory; 2] = [MetricCategory::Mood, MetricCategory::Energy];

/// A current value far outside the spread of the user's history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternAnomaly {
    pub metric: MetricCategory,
    pub description: String,
    pub severity: Severity,
    /// Distance from the historical mean in standard deviations; infinite
    /// when the history has no spread
    pub z_score: f64,
}

/// Everything derived from interaction memory
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionInsights {
    pub similar_patterns: Vec<SimilarityMatch<InteractionMetadata>>,
    pub behavior_trends: BehaviorTrends,
    pub recommendations: Vec<String>,
    pub risk_factors: Vec<String>,
    pub anomalies: Vec<PatternAnomaly>,
}

impl InteractionInsights {
    /// Assemble insights from fetched history and similar patterns
    pub fn derive(
        similar_patterns: Vec<SimilarityMatch<InteractionMetadata>>,
        history: &[StoredVector<InteractionMetadata>],
        current: Option<&InteractionRecord>,
    ) -> Self {
        let behavior_trends = behavior_trends(history);
        Self {
            recommendations: recommendations(&similar_patterns, &behavior_trends, current),
            risk_factors: risk_factors(history, current),
            anomalies: pattern_anomalies(history, current),
            behavior_trends,
            similar_patterns,
        }
    }
}

fn metric_series(
    history: &[StoredVector<InteractionMetadata>],
    metric: MetricCategory,
) -> Vec<f64> {
    history.iter().filter_map(|h| h.metadata.metric(metric)).collect()
}

/// Mood, energy and sleep trends over stored interactions
pub fn behavior_trends(history: &[StoredVector<InteractionMetadata>]) -> BehaviorTrends {
    if history.len() < MIN_TREND_POINTS {
        return BehaviorTrends::default();
    }

    let mut ordered: Vec<StoredVector<InteractionMetadata>> = history.to_vec();
    ordered.sort_by_key(|h| h.timestamp);

    TrendAnalyzer::behavior_trends(
        &metric_series(&ordered, MetricCategory::Mood),
        &metric_series(&ordered, MetricCategory::Energy),
        &metric_series(&ordered, MetricCategory::Sleep),
    )
}

/// Symptoms appearing at least `min_count` times, in first-seen order
fn recurring_symptoms<'a>(
    symptom_lists: impl Iterator<Item = &'a Vec<String>>,
    min_count: usize,
) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    for symptom in symptom_lists.flatten() {
        match counts.iter_mut().find(|(name, _)| name == symptom) {
            Some((_, count)) => *count += 1,
            None => counts.push((symptom.clone(), 1)),
        }
    }
    counts
        .into_iter()
        .filter(|(_, count)| *count >= min_count)
        .map(|(name, _)| name)
        .collect()
}

pub fn recommendations(
    similar_patterns: &[SimilarityMatch<InteractionMetadata>],
    trends: &BehaviorTrends,
    current: Option<&InteractionRecord>,
) -> Vec<String> {
    let mut recommendations = Vec::new();

    if trends.mood_trend == TrendDirection::Declining {
        recommendations.push(
            "Consider incorporating mood-boosting activities like exercise or meditation".to_string(),
        );
    }
    if trends.energy_trend == TrendDirection::Declining {
        recommendations.push(
            "Focus on improving sleep quality and consider adjusting daily routines".to_string(),
        );
    }
    if trends.sleep_trend == TrendDirection::Declining {
        recommendations.push(
            "Establish a consistent bedtime routine and limit screen time before bed".to_string(),
        );
    }

    let common = recurring_symptoms(similar_patterns.iter().map(|p| &p.metadata.symptoms), 2);
    if !common.is_empty() {
        recommendations.push(format!("Monitor recurring symptoms: {}", common.join(", ")));
    }

    if current
        .and_then(|c| c.risk_score)
        .is_some_and(|risk| risk > PROVIDER_REFERRAL_RISK)
    {
        recommendations.push("Consider reaching out to your healthcare provider".to_string());
    }

    recommendations
}

pub fn risk_factors(
    history: &[StoredVector<InteractionMetadata>],
    current: Option<&InteractionRecord>,
) -> Vec<String> {
    let mut factors = Vec::new();

    if history
        .iter()
        .any(|h| h.metadata.risk_score.is_some_and(|r| r > HIGH_RISK_HISTORY))
    {
        factors.push("Recent high-risk health indicators detected".to_string());
    }

    let recurring = recurring_symptoms(history.iter().map(|h| &h.metadata.symptoms), 3);
    if !recurring.is_empty() {
        factors.push(format!("Recurring symptoms: {}", recurring.join(", ")));
    }

    if current
        .and_then(|c| c.risk_score)
        .is_some_and(|risk| risk > ELEVATED_CURRENT_RISK)
    {
        factors.push("Current interaction shows elevated risk levels".to_string());
    }

    factors
}

fn anomaly_subject(metric: MetricCategory) -> &'static str {
    match metric {
        MetricCategory::Mood => "Mood score",
        MetricCategory::Energy => "Energy level",
        MetricCategory::Sleep => "Sleep quality",
        MetricCategory::Pain => "Pain level",
        MetricCategory::Stress => "Stress level",
        MetricCategory::Symptoms => "Symptom count",
    }
}

/// Values more than two standard deviations from the historical mean
pub fn pattern_anomalies(
    history: &[StoredVector<InteractionMetadata>],
    current: Option<&InteractionRecord>,
) -> Vec<PatternAnomaly> {
    let Some(current) = current else {
        return Vec::new();
    };
    if history.len() < MIN_ANOMALY_HISTORY {
        return Vec::new();
    }

    PATTERN_METRICS
        .iter()
        .filter_map(|metric| {
            let value = current.check_in.metric(*metric)?;
            let (mean, std) = mean_and_std(&metric_series(history, *metric))?;
            let distance = (value - mean).abs();

            if distance <= 2.0 * std {
                return None;
            }

            let relative = if value > mean { "higher" } else { "lower" };
            Some(PatternAnomaly {
                metric: *metric,
                description: format!(
                    "{} significantly {relative} than usual",
                    anomaly_subject(*metric)
                ),
                severity: if distance > 3.0 * std {
                    Severity::High
                } else {
                    Severity::Medium
                },
                z_score: if std > 0.0 { distance / std } else { f64::INFINITY },
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CheckInRecord;
    use chrono::{Duration, NaiveDate, TimeZone, Utc};
    use pretty_assertions::assert_eq;

    fn stored(day: i64, mood: Option<f64>, symptoms: &[&str], risk: Option<f64>) -> StoredVector<InteractionMetadata> {
        StoredVector {
            id: format!("v-{day}"),
            owner_id: "user-1".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap() + Duration::days(day),
            vector: Vec::new(),
            metadata: InteractionMetadata {
                mood_score: mood,
                symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
                risk_score: risk,
                ..Default::default()
            },
        }
    }

    fn similar(symptoms: &[&str]) -> SimilarityMatch<InteractionMetadata> {
        SimilarityMatch {
            id: "m".to_string(),
            owner_id: "user-1".to_string(),
            similarity: 0.9,
            metadata: InteractionMetadata {
                symptoms: symptoms.iter().map(|s| s.to_string()).collect(),
                ..Default::default()
            },
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
        }
    }

    fn current(mood: f64, risk: Option<f64>) -> InteractionRecord {
        let mut check_in = CheckInRecord::new("user-1", NaiveDate::from_ymd_opt(2024, 3, 20).unwrap());
        check_in.mood_score = Some(mood);
        InteractionRecord {
            user_id: "user-1".to_string(),
            check_in_id: None,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 20, 9, 0, 0).unwrap(),
            check_in,
            responses: Vec::new(),
            risk_score: risk,
            sentiment_score: None,
        }
    }

    #[test]
    fn test_behavior_trends_sort_history_oldest_first() {
        // Stored newest first; mood falls over real time
        let history = vec![
            stored(3, Some(3.0), &[], None),
            stored(2, Some(5.0), &[], None),
            stored(1, Some(7.0), &[], None),
        ];
        let trends = behavior_trends(&history);
        assert_eq!(trends.mood_trend, TrendDirection::Declining);
        assert_eq!(trends.overall_trend, TrendDirection::Declining);
    }

    #[test]
    fn test_short_history_is_stable() {
        let history = vec![stored(1, Some(9.0), &[], None), stored(2, Some(1.0), &[], None)];
        assert_eq!(behavior_trends(&history), BehaviorTrends::default());
    }

    #[test]
    fn test_recommendations() {
        let trends = BehaviorTrends {
            mood_trend: TrendDirection::Declining,
            ..Default::default()
        };
        let similar_patterns = vec![
            similar(&["headache", "nausea"]),
            similar(&["headache"]),
            similar(&["nausea", "fatigue"]),
        ];

        let recs = recommendations(&similar_patterns, &trends, Some(&current(5.0, Some(7.5))));
        assert_eq!(
            recs,
            vec![
                "Consider incorporating mood-boosting activities like exercise or meditation".to_string(),
                "Monitor recurring symptoms: headache, nausea".to_string(),
                "Consider reaching out to your healthcare provider".to_string(),
            ]
        );
    }

    #[test]
    fn test_risk_factors() {
        let history = vec![
            stored(1, None, &["dizziness"], Some(8.0)),
            stored(2, None, &["dizziness"], None),
            stored(3, None, &["dizziness", "cough"], None),
        ];

        let factors = risk_factors(&history, Some(&current(5.0, Some(6.5))));
        assert_eq!(
            factors,
            vec![
                "Recent high-risk health indicators detected".to_string(),
                "Recurring symptoms: dizziness".to_string(),
                "Current interaction shows elevated risk levels".to_string(),
            ]
        );

        assert!(risk_factors(&[], Some(&current(5.0, Some(6.0)))).is_empty());
    }

    #[test]
    fn test_pattern_anomalies_need_five_points() {
        let history: Vec<_> = (0..4).map(|d| stored(d, Some(7.0), &[], None)).collect();
        assert!(pattern_anomalies(&history, Some(&current(1.0, None))).is_empty());
    }

    #[test]
    fn test_pattern_anomaly_severity_bands() {
        // mean 6, population std 1
        let history: Vec<_> = [5.0, 7.0, 5.0, 7.0, 5.0, 7.0]
            .iter()
            .enumerate()
            .map(|(d, m)| stored(d as i64, Some(*m), &[], None))
            .collect();

        let medium = pattern_anomalies(&history, Some(&current(8.5, None)));
        assert_eq!(medium.len(), 1);
        assert_eq!(medium[0].severity, Severity::Medium);
        assert_eq!(medium[0].description, "Mood score significantly higher than usual");

        let high = pattern_anomalies(&history, Some(&current(2.0, None)));
        assert_eq!(high[0].severity, Severity::High);
        assert_eq!(high[0].z_score, 4.0);

        assert!(pattern_anomalies(&history, Some(&current(7.5, None))).is_empty());
        assert!(pattern_anomalies(&history, None).is_empty());
    }

    #[test]
    fn test_derive_combines_parts() {
        let history: Vec<_> = (0..6).map(|d| stored(d, Some(8.0 - d as f64), &[], None)).collect();
        let insights = InteractionInsights::derive(vec![], &history, None);
        assert_eq!(insights.behavior_trends.mood_trend, TrendDirection::Declining);
        assert_eq!(insights.recommendations.len(), 1);
        assert!(insights.anomalies.is_empty());
    }
}
