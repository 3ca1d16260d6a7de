//! Core types for the wellsignal analysis pipeline
//!
//! This module defines the data that flows between stages: check-in history
//! and responses on the way in; anomalies, trends, insights and the combined
//! analysis result on the way out.

use crate::narrative::NarrativeTier;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health metric categories reported in a check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MetricCategory {
    Mood,
    Energy,
    Sleep,
    Pain,
    Stress,
    Symptoms,
}

impl MetricCategory {
    /// The five numerically scored metrics, in canonical order
    pub const SCORED: [MetricCategory; 5] = [
        MetricCategory::Mood,
        MetricCategory::Energy,
        MetricCategory::Sleep,
        MetricCategory::Pain,
        MetricCategory::Stress,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricCategory::Mood => "mood",
            MetricCategory::Energy => "energy",
            MetricCategory::Sleep => "sleep",
            MetricCategory::Pain => "pain",
            MetricCategory::Stress => "stress",
            MetricCategory::Symptoms => "symptoms",
        }
    }

    /// Human-readable label used in text serializations
    pub fn label(&self) -> &'static str {
        match self {
            MetricCategory::Mood => "Mood",
            MetricCategory::Energy => "Energy",
            MetricCategory::Sleep => "Sleep",
            MetricCategory::Pain => "Pain",
            MetricCategory::Stress => "Stress",
            MetricCategory::Symptoms => "Symptoms",
        }
    }

    /// Parse a free-form response category
    pub fn from_category(category: &str) -> Option<Self> {
        match category.trim().to_ascii_lowercase().as_str() {
            "mood" => Some(MetricCategory::Mood),
            "energy" => Some(MetricCategory::Energy),
            "sleep" => Some(MetricCategory::Sleep),
            "pain" => Some(MetricCategory::Pain),
            "stress" => Some(MetricCategory::Stress),
            "symptoms" => Some(MetricCategory::Symptoms),
            _ => None,
        }
    }
}

/// A single daily check-in as stored by the check-in collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInRecord {
    pub user_id: String,
    /// Calendar date of the check-in
    pub date: NaiveDate,
    #[serde(default)]
    pub mood_score: Option<f64>,
    #[serde(default)]
    pub energy_level: Option<f64>,
    #[serde(default)]
    pub sleep_quality: Option<f64>,
    #[serde(default)]
    pub pain_level: Option<f64>,
    #[serde(default)]
    pub stress_level: Option<f64>,
    #[serde(default)]
    pub symptoms: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CheckInRecord {
    /// Create an empty record for a user and date
    pub fn new(user_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            user_id: user_id.into(),
            date,
            mood_score: None,
            energy_level: None,
            sleep_quality: None,
            pain_level: None,
            stress_level: None,
            symptoms: Vec::new(),
            notes: None,
        }
    }

    /// Value reported for a scored metric, if any
    pub fn metric(&self, category: MetricCategory) -> Option<f64> {
        match category {
            MetricCategory::Mood => self.mood_score,
            MetricCategory::Energy => self.energy_level,
            MetricCategory::Sleep => self.sleep_quality,
            MetricCategory::Pain => self.pain_level,
            MetricCategory::Stress => self.stress_level,
            MetricCategory::Symptoms => None,
        }
    }

    /// Fold one check-in's responses into a record.
    ///
    /// The first numeric answer per metric wins; `symptoms` answers
    /// contribute their listed items or their text.
    pub fn from_responses(
        user_id: impl Into<String>,
        date: NaiveDate,
        responses: &[CheckInResponse],
    ) -> Self {
        let mut record = Self::new(user_id, date);

        for response in responses {
            match (response.metric_category(), &response.answer) {
                (Some(MetricCategory::Symptoms), Answer::List(items)) => {
                    record.symptoms.extend(items.iter().cloned());
                }
                (Some(MetricCategory::Symptoms), Answer::Text(text)) if !text.trim().is_empty() => {
                    record.symptoms.push(text.trim().to_string());
                }
                (Some(category), answer) => {
                    let slot = match category {
                        MetricCategory::Mood => &mut record.mood_score,
                        MetricCategory::Energy => &mut record.energy_level,
                        MetricCategory::Sleep => &mut record.sleep_quality,
                        MetricCategory::Pain => &mut record.pain_level,
                        MetricCategory::Stress => &mut record.stress_level,
                        MetricCategory::Symptoms => continue,
                    };
                    if slot.is_none() {
                        *slot = answer.as_number();
                    }
                }
                (None, _) => {}
            }
        }

        record
    }
}

/// Answer to a check-in question
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Answer {
    Number(f64),
    Bool(bool),
    List(Vec<String>),
    Text(String),
}

impl Answer {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Answer::Number(n) if n.is_finite() => Some(*n),
            _ => None,
        }
    }
}

impl fmt::Display for Answer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Answer::Number(n) => write!(f, "{n}"),
            Answer::Bool(b) => write!(f, "{b}"),
            Answer::List(items) => f.write_str(&items.join(", ")),
            Answer::Text(text) => f.write_str(text),
        }
    }
}

/// A single answered question from the current check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckInResponse {
    pub question_id: String,
    pub question_text: String,
    pub answer: Answer,
    /// Free-form category; the scored metrics and `symptoms` are recognised
    pub category: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
}

impl CheckInResponse {
    pub fn metric_category(&self) -> Option<MetricCategory> {
        MetricCategory::from_category(&self.category)
    }
}

/// Severity shared by anomalies and insights
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            _ => None,
        }
    }
}

/// Which way a metric moved relative to its baseline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviationDirection {
    Increase,
    Decrease,
}

/// A metric value that deviates from the user's own baseline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyRecord {
    pub metric_category: MetricCategory,
    pub description: String,
    /// Magnitude-only severity; consult `direction` for valence
    pub severity: Severity,
    /// Detection confidence (0-1)
    pub confidence: f64,
    pub direction: DeviationDirection,
    /// Signed relative deviation from baseline
    pub percent_diff: f64,
    pub suggested_action: String,
}

/// Slope-derived trend classification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Improving,
    Stable,
    Declining,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            TrendDirection::Improving => "improving",
            TrendDirection::Stable => "stable",
            TrendDirection::Declining => "declining",
        }
    }
}

/// Trend magnitude derived from the value range
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendMagnitude {
    Slight,
    Moderate,
    Significant,
}

/// Trend of one metric over a time-ordered window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendRecord {
    pub metric: MetricCategory,
    pub direction: TrendDirection,
    pub magnitude: TrendMagnitude,
    pub data_points: usize,
    pub confidence: f64,
    /// Description of the window, e.g. "12 days"
    pub timeframe: String,
}

/// Bucketed risk level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(RiskLevel::Low),
            "medium" => Some(RiskLevel::Medium),
            "high" => Some(RiskLevel::High),
            _ => None,
        }
    }
}

/// Sentiment classification of a check-in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentLabel {
    Positive,
    Neutral,
    Negative,
}

impl SentimentLabel {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(SentimentLabel::Positive),
            "neutral" => Some(SentimentLabel::Neutral),
            "negative" => Some(SentimentLabel::Negative),
            _ => None,
        }
    }
}

/// Insight categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InsightType {
    Positive,
    Concern,
    Trend,
    Medication,
    Lifestyle,
}

impl InsightType {
    pub fn as_str(&self) -> &'static str {
        match self {
            InsightType::Positive => "positive",
            InsightType::Concern => "concern",
            InsightType::Trend => "trend",
            InsightType::Medication => "medication",
            InsightType::Lifestyle => "lifestyle",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "positive" => Some(InsightType::Positive),
            "concern" => Some(InsightType::Concern),
            "trend" => Some(InsightType::Trend),
            "medication" => Some(InsightType::Medication),
            "lifestyle" => Some(InsightType::Lifestyle),
            _ => None,
        }
    }
}

/// A typed, severity-ranked health insight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: String,
    #[serde(rename = "type")]
    pub insight_type: InsightType,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub confidence: f64,
    pub supporting_data: Vec<String>,
    pub related_metrics: Vec<String>,
    pub timeframe: String,
}

/// An active prescription
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prescription {
    #[serde(default)]
    pub id: Option<String>,
    pub medication_name: String,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub frequency: Option<String>,
}

impl Prescription {
    /// "name dosage frequency" with missing parts omitted
    pub fn summary(&self) -> String {
        [
            Some(self.medication_name.as_str()),
            self.dosage.as_deref(),
            self.frequency.as_deref(),
        ]
        .into_iter()
        .flatten()
        .collect::<Vec<_>>()
        .join(" ")
    }
}

/// Profile data returned by the history collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
}

/// Static context used by the insight generator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserHealthContext {
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub prescriptions: Vec<Prescription>,
    /// Whether the user belongs to a care group
    #[serde(default)]
    pub has_caregiver: bool,
}

impl From<UserProfile> for UserHealthContext {
    fn from(profile: UserProfile) -> Self {
        Self {
            age: profile.age,
            gender: profile.gender,
            prescriptions: profile.prescriptions,
            has_caregiver: false,
        }
    }
}

/// Combined result of analysing one check-in
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseAnalysisResult {
    /// -1 (very negative) to 1 (very positive)
    pub sentiment_score: f64,
    pub sentiment_label: SentimentLabel,
    pub health_concerns: Vec<String>,
    pub emotional_indicators: Vec<String>,
    pub risk_level: RiskLevel,
    /// 0-10 composite risk
    pub risk_score: f64,
    pub key_insights: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub anomalies: Vec<AnomalyRecord>,
    pub trends: Vec<TrendRecord>,
    /// Which narrative path produced the prose fields
    pub narrative_tier: NarrativeTier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_answer_untagged_deserialization() {
        let number: Answer = serde_json::from_str("7").unwrap();
        let list: Answer = serde_json::from_str(r#"["nausea","headache"]"#).unwrap();
        let text: Answer = serde_json::from_str(r#""tired""#).unwrap();
        let flag: Answer = serde_json::from_str("true").unwrap();

        assert_eq!(number.as_number(), Some(7.0));
        assert_eq!(list.to_string(), "nausea, headache");
        assert_eq!(text, Answer::Text("tired".to_string()));
        assert_eq!(flag.as_number(), None);
    }

    #[test]
    fn test_metric_category_parsing() {
        assert_eq!(MetricCategory::from_category(" Mood "), Some(MetricCategory::Mood));
        assert_eq!(
            MetricCategory::from_category("symptoms"),
            Some(MetricCategory::Symptoms)
        );
        assert_eq!(MetricCategory::from_category("medication"), None);
    }

    #[test]
    fn test_check_in_record_metric_lookup() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let mut record = CheckInRecord::new("user-1", date);
        record.pain_level = Some(4.0);

        assert_eq!(record.metric(MetricCategory::Pain), Some(4.0));
        assert_eq!(record.metric(MetricCategory::Mood), None);
        assert_eq!(record.metric(MetricCategory::Symptoms), None);
    }

    #[test]
    fn test_insight_serializes_type_field() {
        let insight = Insight {
            id: "i-1".to_string(),
            insight_type: InsightType::Medication,
            title: "t".to_string(),
            description: "d".to_string(),
            severity: Severity::Low,
            confidence: 0.9,
            supporting_data: vec![],
            related_metrics: vec![],
            timeframe: "Ongoing".to_string(),
        };
        let value = serde_json::to_value(&insight).unwrap();
        assert_eq!(value["type"], "medication");
        assert_eq!(value["severity"], "low");
    }

    #[test]
    fn test_prescription_summary_skips_missing_parts() {
        let rx = Prescription {
            id: None,
            medication_name: "Metformin".to_string(),
            dosage: Some("500mg".to_string()),
            frequency: None,
        };
        assert_eq!(rx.summary(), "Metformin 500mg");
    }

    #[test]
    fn test_record_from_responses_keeps_first_numeric_answer() {
        let response = |category: &str, answer: Answer| CheckInResponse {
            question_id: category.to_string(),
            question_text: category.to_string(),
            answer,
            category: category.to_string(),
            timestamp: None,
        };
        let responses = vec![
            response("mood", Answer::Text("fine".to_string())),
            response("mood", Answer::Number(6.0)),
            response("mood", Answer::Number(2.0)),
            response("symptoms", Answer::List(vec!["nausea".to_string(), "fatigue".to_string()])),
            response("symptoms", Answer::Text("headache".to_string())),
            response("notes", Answer::Text("slept late".to_string())),
        ];

        let date = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        let record = CheckInRecord::from_responses("user-1", date, &responses);
        assert_eq!(record.mood_score, Some(6.0));
        assert_eq!(record.energy_level, None);
        assert_eq!(record.symptoms, vec!["nausea", "fatigue", "headache"]);
    }
}
