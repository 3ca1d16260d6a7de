//! Semantic interaction text
//!
//! A check-in interaction is serialized to a deterministic block of text
//! before it is sent to the embedding provider. The same record yields the
//! same text, so re-embedding is stable.

use crate::types::{CheckInRecord, CheckInResponse, MetricCategory};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

/// Embedding dimension expected from the provider
pub const SEMANTIC_DIMENSION: usize = 1536;

/// A check-in together with the answers that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionRecord {
    pub user_id: String,
    #[serde(default)]
    pub check_in_id: Option<String>,
    pub timestamp: DateTime<Utc>,
    pub check_in: CheckInRecord,
    #[serde(default)]
    pub responses: Vec<CheckInResponse>,
    /// Risk score from this check-in's analysis, when already known
    #[serde(default)]
    pub risk_score: Option<f64>,
    #[serde(default)]
    pub sentiment_score: Option<f64>,
}

impl InteractionRecord {
    /// Text fed to the embedding provider
    pub fn to_text(&self) -> String {
        let mut parts = vec![
            format!("User: {}", self.user_id),
            format!(
                "Date: {}",
                self.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
            ),
        ];

        for category in MetricCategory::SCORED {
            if let Some(value) = self.check_in.metric(category) {
                parts.push(format!("{}: {value}/10", category.label()));
            }
        }

        if !self.check_in.symptoms.is_empty() {
            parts.push(format!("Symptoms: {}", self.check_in.symptoms.join(", ")));
        }

        for response in &self.responses {
            parts.push(format!("Q: {}", response.question_text));
            parts.push(format!("A: {}", response.answer));
            parts.push(format!("Category: {}", response.category));
        }

        parts.join("\n")
    }

    /// Short "question: answer" digest of every response
    pub fn response_digest(&self) -> String {
        self.responses
            .iter()
            .map(|r| format!("{}: {}", r.question_text, r.answer))
            .collect::<Vec<_>>()
            .join("; ")
    }

    /// Metadata stored beside the embedding
    pub fn metadata(&self) -> InteractionMetadata {
        InteractionMetadata {
            check_in_id: self.check_in_id.clone(),
            mood_score: self.check_in.mood_score,
            energy_level: self.check_in.energy_level,
            sleep_quality: self.check_in.sleep_quality,
            pain_level: self.check_in.pain_level,
            stress_level: self.check_in.stress_level,
            symptoms: self.check_in.symptoms.clone(),
            risk_score: self.risk_score,
            sentiment_score: self.sentiment_score,
            response_digest: self.response_digest(),
            category: self
                .responses
                .first()
                .map(|r| r.category.clone())
                .unwrap_or_else(|| "general".to_string()),
        }
    }
}

/// Metadata stored with a semantic vector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionMetadata {
    pub check_in_id: Option<String>,
    pub mood_score: Option<f64>,
    pub energy_level: Option<f64>,
    pub sleep_quality: Option<f64>,
    pub pain_level: Option<f64>,
    pub stress_level: Option<f64>,
    pub symptoms: Vec<String>,
    pub risk_score: Option<f64>,
    pub sentiment_score: Option<f64>,
    pub response_digest: String,
    pub category: String,
}

impl InteractionMetadata {
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
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Answer;
    use chrono::{NaiveDate, TimeZone};
    use pretty_assertions::assert_eq;

    fn interaction() -> InteractionRecord {
        let date = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let mut check_in = CheckInRecord::new("user-1", date);
        check_in.mood_score = Some(7.0);
        check_in.pain_level = Some(2.5);
        check_in.symptoms = vec!["headache".to_string(), "nausea".to_string()];

        InteractionRecord {
            user_id: "user-1".to_string(),
            check_in_id: Some("c-1".to_string()),
            timestamp: Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap(),
            check_in,
            responses: vec![
                CheckInResponse {
                    question_id: "q1".to_string(),
                    question_text: "How is your mood?".to_string(),
                    answer: Answer::Number(7.0),
                    category: "mood".to_string(),
                    timestamp: None,
                },
                CheckInResponse {
                    question_id: "q2".to_string(),
                    question_text: "Any symptoms?".to_string(),
                    answer: Answer::List(vec!["headache".to_string(), "nausea".to_string()]),
                    category: "symptoms".to_string(),
                    timestamp: None,
                },
            ],
            risk_score: Some(4.0),
            sentiment_score: None,
        }
    }

    #[test]
    fn test_text_serialization() {
        let expected = "User: user-1\n\
                        Date: 2024-03-04T08:00:00.000Z\n\
                        Mood: 7/10\n\
                        Pain: 2.5/10\n\
                        Symptoms: headache, nausea\n\
                        Q: How is your mood?\n\
                        A: 7\n\
                        Category: mood\n\
                        Q: Any symptoms?\n\
                        A: headache, nausea\n\
                        Category: symptoms";
        assert_eq!(interaction().to_text(), expected);
    }

    #[test]
    fn test_text_is_deterministic() {
        assert_eq!(interaction().to_text(), interaction().to_text());
    }

    #[test]
    fn test_metadata() {
        let metadata = interaction().metadata();
        assert_eq!(metadata.category, "mood");
        assert_eq!(metadata.metric(MetricCategory::Pain), Some(2.5));
        assert_eq!(metadata.risk_score, Some(4.0));
        assert_eq!(
            metadata.response_digest,
            "How is your mood?: 7; Any symptoms?: headache, nausea"
        );
    }

    #[test]
    fn test_metadata_defaults_to_general_category() {
        let mut record = interaction();
        record.responses.clear();
        assert_eq!(record.metadata().category, "general");
    }
}
