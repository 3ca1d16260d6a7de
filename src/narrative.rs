//! Narrative analysis
//!
//! Builds prompts for the text-generation provider and turns whatever comes
//! back into structured fields. Provider output is untrusted: parsing walks a
//! fixed chain of tiers and records which one produced the result.
//!
//! 1. `Parsed`: the first `{ ... }` block is a JSON object
//! 2. `TextFallback`: no JSON block, but labelled lines were recognised
//! 3. `StaticDefault`: the JSON block was invalid or nothing was recognised
//!
//! `QuantitativeOnly` marks results where no provider answered at all.

use crate::anomaly::GENERIC_ACTION;
use crate::baseline::BaselineMetrics;
use crate::trend::BehaviorTrends;
use crate::types::{
    AnomalyRecord, CheckInResponse, DeviationDirection, Insight, InsightType, MetricCategory,
    ResponseAnalysisResult, RiskLevel, SentimentLabel, Severity, TrendDirection, TrendMagnitude,
    TrendRecord, UserHealthContext, UserProfile,
};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::OnceLock;
use uuid::Uuid;

/// Which path produced the prose fields of an analysis
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NarrativeTier {
    Parsed,
    TextFallback,
    StaticDefault,
    QuantitativeOnly,
}

impl NarrativeTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            NarrativeTier::Parsed => "parsed",
            NarrativeTier::TextFallback => "text_fallback",
            NarrativeTier::StaticDefault => "static_default",
            NarrativeTier::QuantitativeOnly => "quantitative_only",
        }
    }
}

/// Structured fields recovered from a narrative response
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NarrativeAnalysis {
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<SentimentLabel>,
    pub health_concerns: Vec<String>,
    pub emotional_indicators: Vec<String>,
    pub risk_level: Option<RiskLevel>,
    pub risk_score: Option<f64>,
    pub key_insights: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub anomalies: Vec<AnomalyRecord>,
    pub trends: Vec<TrendRecord>,
}

impl NarrativeAnalysis {
    /// Fields used when a response could not be understood
    pub fn static_default() -> Self {
        Self {
            sentiment_score: Some(0.0),
            sentiment_label: Some(SentimentLabel::Neutral),
            risk_level: Some(RiskLevel::Low),
            risk_score: Some(0.0),
            key_insights: vec!["Analysis unavailable".to_string()],
            recommended_actions: vec!["Check back later".to_string()],
            ..Default::default()
        }
    }

    /// Sentiment-only analysis derived from the mood answer
    pub fn quantitative_only(responses: &[CheckInResponse]) -> Self {
        let mood = responses
            .iter()
            .filter(|r| r.metric_category() == Some(MetricCategory::Mood))
            .find_map(|r| r.answer.as_number());

        let (sentiment_score, sentiment_label) = match mood {
            Some(mood) => {
                let label = if mood >= 7.0 {
                    SentimentLabel::Positive
                } else if mood <= 4.0 {
                    SentimentLabel::Negative
                } else {
                    SentimentLabel::Neutral
                };
                (((mood - 5.5) / 5.5).clamp(-1.0, 1.0), label)
            }
            None => (0.0, SentimentLabel::Neutral),
        };

        Self {
            sentiment_score: Some(sentiment_score),
            sentiment_label: Some(sentiment_label),
            key_insights: vec!["Limited analysis available".to_string()],
            recommended_actions: vec!["Continue monitoring your health".to_string()],
            ..Default::default()
        }
    }
}

/// Parsed narrative plus the tier that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct NarrativeOutcome {
    pub tier: NarrativeTier,
    pub analysis: NarrativeAnalysis,
}

impl NarrativeOutcome {
    pub fn quantitative_only(responses: &[CheckInResponse]) -> Self {
        Self {
            tier: NarrativeTier::QuantitativeOnly,
            analysis: NarrativeAnalysis::quantitative_only(responses),
        }
    }
}

const OBJECT_PATTERN: &str = r"(?s)\{.*\}";
const ARRAY_PATTERN: &str = r"(?s)\[.*\]";

fn compiled(
    cell: &'static OnceLock<Result<Regex, regex::Error>>,
    pattern: &str,
) -> Option<&'static Regex> {
    match cell.get_or_init(|| Regex::new(pattern)) {
        Ok(re) => Some(re),
        Err(err) => {
            tracing::error!(pattern, error = %err, "narrative pattern failed to compile");
            None
        }
    }
}

fn object_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    compiled(&PATTERN, OBJECT_PATTERN)
}

fn array_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Result<Regex, regex::Error>> = OnceLock::new();
    compiled(&PATTERN, ARRAY_PATTERN)
}

/// Run the parse chain over a provider response
pub fn parse_analysis_response(response: &str) -> NarrativeOutcome {
    if let Some(block) = object_pattern().and_then(|re| re.find(response)) {
        return match serde_json::from_str::<Value>(block.as_str()) {
            Ok(Value::Object(object)) => NarrativeOutcome {
                tier: NarrativeTier::Parsed,
                analysis: analysis_from_json(&object),
            },
            _ => {
                tracing::warn!("narrative response held an unparseable JSON block");
                static_default_outcome()
            }
        };
    }

    match parse_text_response(response) {
        Some(analysis) => NarrativeOutcome {
            tier: NarrativeTier::TextFallback,
            analysis,
        },
        None => static_default_outcome(),
    }
}

fn static_default_outcome() -> NarrativeOutcome {
    NarrativeOutcome {
        tier: NarrativeTier::StaticDefault,
        analysis: NarrativeAnalysis::static_default(),
    }
}

/// Labelled-line parser; `None` when no label yields a usable value
fn parse_text_response(text: &str) -> Option<NarrativeAnalysis> {
    let mut analysis = NarrativeAnalysis::default();
    let mut recognised = false;

    for line in text.lines() {
        if let Some(value) = labelled_value(line, "Sentiment Score:") {
            if let Some(score) = finite_number(value) {
                analysis.sentiment_score = Some(score.clamp(-1.0, 1.0));
                recognised = true;
            }
        } else if let Some(value) = labelled_value(line, "Sentiment Label:") {
            if let Some(label) = SentimentLabel::parse(value) {
                analysis.sentiment_label = Some(label);
                recognised = true;
            }
        } else if let Some(value) = labelled_value(line, "Risk Level:") {
            if let Some(level) = RiskLevel::parse(value) {
                analysis.risk_level = Some(level);
                recognised = true;
            }
        } else if let Some(value) = labelled_value(line, "Risk Score:") {
            if let Some(score) = finite_number(value) {
                analysis.risk_score = Some(score);
                recognised = true;
            }
        }
    }

    recognised.then_some(analysis)
}

/// Parses a number, rejecting `NaN` and infinities
fn finite_number(value: &str) -> Option<f64> {
    value.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}

fn labelled_value<'a>(line: &'a str, label: &str) -> Option<&'a str> {
    let start = line.find(label)? + label.len();
    Some(line[start..].trim())
}

fn string_list(object: &serde_json::Map<String, Value>, keys: &[&str]) -> Vec<String> {
    keys.iter()
        .find_map(|key| object.get(*key))
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Null => None,
                    other => Some(other.to_string()),
                })
                .collect()
        })
        .unwrap_or_default()
}

fn field<'a>(object: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a Value> {
    keys.iter().find_map(|key| object.get(*key))
}

fn number_field(object: &serde_json::Map<String, Value>, keys: &[&str]) -> Option<f64> {
    match field(object, keys)? {
        Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
        Value::String(s) => finite_number(s),
        _ => None,
    }
}

fn str_field<'a>(object: &'a serde_json::Map<String, Value>, keys: &[&str]) -> Option<&'a str> {
    field(object, keys).and_then(Value::as_str)
}

fn analysis_from_json(object: &serde_json::Map<String, Value>) -> NarrativeAnalysis {
    let anomalies = field(object, &["anomalies"])
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(anomaly_from_json)
                .collect()
        })
        .unwrap_or_default();

    let trends = field(object, &["trends"])
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_object)
                .filter_map(trend_from_json)
                .collect()
        })
        .unwrap_or_default();

    NarrativeAnalysis {
        sentiment_score: number_field(object, &["sentimentScore", "sentiment_score"])
            .map(|s| s.clamp(-1.0, 1.0)),
        sentiment_label: str_field(object, &["sentimentLabel", "sentiment_label"])
            .and_then(SentimentLabel::parse),
        health_concerns: string_list(object, &["healthConcerns", "health_concerns"]),
        emotional_indicators: string_list(object, &["emotionalIndicators", "emotional_indicators"]),
        risk_level: str_field(object, &["riskLevel", "risk_level"]).and_then(RiskLevel::parse),
        risk_score: number_field(object, &["riskScore", "risk_score"]),
        key_insights: string_list(object, &["keyInsights", "key_insights"]),
        recommended_actions: string_list(object, &["recommendedActions", "recommended_actions"]),
        anomalies,
        trends,
    }
}

fn anomaly_from_json(object: &serde_json::Map<String, Value>) -> Option<AnomalyRecord> {
    let category = str_field(object, &["metricCategory", "metric_category", "type", "category"])
        .and_then(|c| MetricCategory::from_category(c.trim_end_matches("_anomaly")))?;
    let description = str_field(object, &["description"]).unwrap_or_default().to_string();
    let lowered = description.to_ascii_lowercase();
    let direction = if lowered.contains("higher") || lowered.contains("increase") {
        DeviationDirection::Increase
    } else {
        DeviationDirection::Decrease
    };
    let severity = str_field(object, &["severity"])
        .and_then(Severity::parse)
        .unwrap_or(Severity::Low);

    Some(AnomalyRecord {
        metric_category: category,
        description,
        severity,
        confidence: number_field(object, &["confidence"])
            .unwrap_or(0.5)
            .clamp(0.0, 1.0),
        direction,
        percent_diff: 0.0,
        suggested_action: str_field(object, &["suggestedAction", "suggested_action"])
            .map(str::to_string)
            .unwrap_or_else(|| GENERIC_ACTION.to_string()),
    })
}

fn trend_from_json(object: &serde_json::Map<String, Value>) -> Option<TrendRecord> {
    let metric = str_field(object, &["metric"]).and_then(MetricCategory::from_category)?;
    let direction = match str_field(object, &["direction"])?.trim().to_ascii_lowercase().as_str() {
        "improving" => TrendDirection::Improving,
        "declining" => TrendDirection::Declining,
        "stable" => TrendDirection::Stable,
        _ => return None,
    };
    let magnitude = match str_field(object, &["magnitude", "significance"])
        .map(|m| m.trim().to_ascii_lowercase())
        .as_deref()
    {
        Some("significant") | Some("high") => TrendMagnitude::Significant,
        Some("moderate") | Some("medium") => TrendMagnitude::Moderate,
        _ => TrendMagnitude::Slight,
    };

    Some(TrendRecord {
        metric,
        direction,
        magnitude,
        data_points: 0,
        confidence: 0.5,
        timeframe: "Current".to_string(),
    })
}

/// Extra insights from a provider response; unparseable input yields none
pub fn parse_ai_insights(response: &str) -> Vec<Insight> {
    let Some(block) = array_pattern().and_then(|re| re.find(response)) else {
        tracing::warn!("insight response held no JSON array");
        return Vec::new();
    };

    let items = match serde_json::from_str::<Value>(block.as_str()) {
        Ok(Value::Array(items)) => items,
        _ => {
            tracing::warn!("insight response JSON array did not parse");
            return Vec::new();
        }
    };

    items
        .iter()
        .filter_map(Value::as_object)
        .enumerate()
        .map(|(index, object)| Insight {
            id: format!("ai_insight_{}_{index}", Uuid::new_v4().simple()),
            insight_type: str_field(object, &["type"])
                .and_then(InsightType::parse)
                .unwrap_or(InsightType::Trend),
            title: str_field(object, &["title"])
                .filter(|t| !t.is_empty())
                .unwrap_or("Health Insight")
                .to_string(),
            description: str_field(object, &["description"]).unwrap_or_default().to_string(),
            severity: str_field(object, &["severity"])
                .and_then(Severity::parse)
                .unwrap_or(Severity::Low),
            confidence: number_field(object, &["confidence"])
                .filter(|c| *c > 0.0)
                .unwrap_or(0.7)
                .clamp(0.0, 1.0),
            supporting_data: string_list(object, &["supportingData", "supporting_data"]),
            related_metrics: string_list(object, &["relatedMetrics", "related_metrics"]),
            timeframe: str_field(object, &["timeframe"])
                .filter(|t| !t.is_empty())
                .unwrap_or("Current")
                .to_string(),
        })
        .collect()
}

fn format_average(value: Option<f64>) -> String {
    value.map_or_else(|| "n/a".to_string(), |v| format!("{v:.2}"))
}

/// Prompt asking for a structured analysis of one check-in
pub fn build_analysis_prompt(
    responses: &[CheckInResponse],
    baseline: Option<&BaselineMetrics>,
    profile: Option<&UserProfile>,
) -> String {
    let mut prompt = String::from("Please analyze the following daily health check-in responses:\n\n");

    for response in responses {
        prompt.push_str(&format!("Question: {}\n", response.question_text));
        prompt.push_str(&format!("Answer: {}\n", response.answer));
        prompt.push_str(&format!("Category: {}\n\n", response.category));
    }

    if let Some(baseline) = baseline.filter(|b| !b.is_unavailable()) {
        prompt.push_str("Historical context:\n");
        prompt.push_str(&format!("Average mood score: {}\n", format_average(baseline.avg_mood_score)));
        prompt.push_str(&format!("Average energy level: {}\n", format_average(baseline.avg_energy_level)));
        prompt.push_str(&format!("Average sleep quality: {}\n", format_average(baseline.avg_sleep_quality)));
        prompt.push_str(&format!("Average pain level: {}\n", format_average(baseline.avg_pain_level)));
        prompt.push_str(&format!("Average stress level: {}\n\n", format_average(baseline.avg_stress_level)));
    }

    if let Some(profile) = profile {
        prompt.push_str("User profile:\n");
        if let Some(age) = profile.age {
            prompt.push_str(&format!("Age: {age}\n"));
        }
        if let Some(gender) = &profile.gender {
            prompt.push_str(&format!("Gender: {gender}\n"));
        }
        if !profile.prescriptions.is_empty() {
            let medications: Vec<String> =
                profile.prescriptions.iter().map(|p| p.summary()).collect();
            prompt.push_str(&format!("Current medications: {}\n", medications.join(", ")));
        }
        prompt.push('\n');
    }

    prompt.push_str(
        "Based on the above information, please provide an analysis in the following format:\n\
         1. Sentiment Score (-1 to 1, where -1 is very negative and 1 is very positive)\n\
         2. Sentiment Label (positive, neutral, or negative)\n\
         3. Health Concerns (list)\n\
         4. Emotional Indicators (list)\n\
         5. Risk Level (low, medium, or high)\n\
         6. Risk Score (0-10)\n\
         7. Key Insights (list)\n\
         8. Recommended Actions (list)\n\
         9. Anomalies (list with type, description, severity, and suggested action)\n\
         10. Trends (list with metric, direction, significance, and description)\n\n\
         Please format your response as JSON.",
    );

    prompt
}

/// Prompt asking for two or three personalised insights
pub fn build_insights_prompt(
    analysis: &ResponseAnalysisResult,
    trends: &BehaviorTrends,
    similar_patterns: usize,
    context: &UserHealthContext,
) -> String {
    let age = context
        .age
        .map_or_else(|| "Not specified".to_string(), |a| a.to_string());
    let gender = context.gender.as_deref().unwrap_or("Not specified");
    let sentiment_label = match analysis.sentiment_label {
        SentimentLabel::Positive => "positive",
        SentimentLabel::Neutral => "neutral",
        SentimentLabel::Negative => "negative",
    };
    let risk_level = match analysis.risk_level {
        RiskLevel::Low => "low",
        RiskLevel::Medium => "medium",
        RiskLevel::High => "high",
    };

    format!(
        "You are a healthcare assistant generating personalized health insights from daily check-in data.\n\n\
         User Context:\n\
         - Age: {age}\n\
         - Gender: {gender}\n\
         - Medications: {medications} active prescriptions\n\
         - Care Group: {care_group}\n\n\
         Current Analysis:\n\
         - Sentiment Score: {sentiment:.2} ({sentiment_label})\n\
         - Risk Level: {risk_level}\n\
         - Risk Score: {risk:.1}/10\n\
         - Key Insights: {insights}\n\
         - Health Concerns: {concerns}\n\n\
         Behavior Trends:\n\
         - Overall Trend: {overall}\n\
         - Mood Trend: {mood}\n\
         - Energy Trend: {energy}\n\
         - Sleep Trend: {sleep}\n\n\
         Similar Patterns Found: {similar_patterns} similar interactions\n\n\
         Generate 2-3 personalized health insights in JSON format:\n\
         [\n  {{\n    \"type\": \"positive|concern|trend|medication|lifestyle\",\n    \
         \"title\": \"Brief insight title\",\n    \
         \"description\": \"Detailed description of the insight\",\n    \
         \"severity\": \"low|medium|high\",\n    \
         \"confidence\": 0.8,\n    \
         \"supportingData\": [\"data point 1\", \"data point 2\"],\n    \
         \"relatedMetrics\": [\"metric1\", \"metric2\"],\n    \
         \"timeframe\": \"Current|Last 7 days|Last 30 days\"\n  }}\n]\n\n\
         Focus on actionable, personalized insights that consider the user's specific context and patterns.\n",
        medications = context.prescriptions.len(),
        care_group = if context.has_caregiver { "Yes" } else { "No" },
        sentiment = analysis.sentiment_score,
        risk = analysis.risk_score,
        insights = analysis.key_insights.join(", "),
        concerns = analysis.health_concerns.join(", "),
        overall = trends.overall_trend.as_str(),
        mood = trends.mood_trend.as_str(),
        energy = trends.energy_trend.as_str(),
        sleep = trends.sleep_trend.as_str(),
    )
}
