//! Insight generation
//!
//! Structured insights come from fixed rules over anomalies, behavior trends
//! and the user's context, each with a constant confidence. A text provider
//! may add a few narrative insights on top; if it fails, the structured set
//! is returned unchanged.

use crate::interaction::{InteractionInsights, PatternAnomaly};
use crate::narrative::{build_insights_prompt, parse_ai_insights};
use crate::providers::{CompletionOptions, TextGenerationProvider};
use crate::types::{
    AnomalyRecord, Insight, InsightType, MetricCategory, Prescription, ResponseAnalysisResult,
    Severity, TrendDirection, UserHealthContext,
};
use std::sync::Arc;
use uuid::Uuid;

pub const ANOMALY_CONFIDENCE: f64 = 0.8;
pub const IMPROVING_TREND_CONFIDENCE: f64 = 0.9;
pub const DECLINING_TREND_CONFIDENCE: f64 = 0.85;
pub const MEDICATION_CONFIDENCE: f64 = 0.9;
pub const RECURRING_SYMPTOM_CONFIDENCE: f64 = 0.8;

/// Everything the generator reads
#[derive(Debug, Clone, Copy)]
pub struct InsightInputs<'a> {
    pub analysis: &'a ResponseAnalysisResult,
    pub interaction: &'a InteractionInsights,
    pub context: &'a UserHealthContext,
}

fn insight_id(prefix: &str) -> String {
    format!("{prefix}_{}", Uuid::new_v4().simple())
}

fn anomaly_insight(anomaly: &AnomalyRecord) -> Insight {
    Insight {
        id: insight_id("anomaly"),
        insight_type: InsightType::Concern,
        title: format!("{} Anomaly Detected", anomaly.metric_category.label()),
        description: anomaly.description.clone(),
        severity: anomaly.severity,
        confidence: ANOMALY_CONFIDENCE,
        supporting_data: vec![anomaly.description.clone(), anomaly.suggested_action.clone()],
        related_metrics: vec![anomaly.metric_category.as_str().to_string()],
        timeframe: "Current".to_string(),
    }
}

fn pattern_anomaly_insight(anomaly: &PatternAnomaly) -> Insight {
    Insight {
        id: insight_id("pattern"),
        insight_type: InsightType::Concern,
        title: format!("{} Anomaly Detected", anomaly.metric.label()),
        description: anomaly.description.clone(),
        severity: anomaly.severity,
        confidence: ANOMALY_CONFIDENCE,
        supporting_data: vec![anomaly.description.clone()],
        related_metrics: vec![anomaly.metric.as_str().to_string()],
        timeframe: "Current".to_string(),
    }
}

fn trend_insight(overall: TrendDirection) -> Option<Insight> {
    let related = || {
        [MetricCategory::Mood, MetricCategory::Energy, MetricCategory::Sleep]
            .iter()
            .map(|m| m.as_str().to_string())
            .collect()
    };

    match overall {
        TrendDirection::Improving => Some(Insight {
            id: insight_id("trend_positive"),
            insight_type: InsightType::Positive,
            title: "Positive Health Trend".to_string(),
            description: "Your overall health metrics are showing improvement over time."
                .to_string(),
            severity: Severity::Low,
            confidence: IMPROVING_TREND_CONFIDENCE,
            supporting_data: vec![
                "Overall trend analysis".to_string(),
                "Multiple metric improvements".to_string(),
            ],
            related_metrics: related(),
            timeframe: "Last 30 days".to_string(),
        }),
        TrendDirection::Declining => Some(Insight {
            id: insight_id("trend_concern"),
            insight_type: InsightType::Concern,
            title: "Declining Health Trend".to_string(),
            description: "Your health metrics are showing a concerning downward trend."
                .to_string(),
            severity: Severity::Medium,
            confidence: DECLINING_TREND_CONFIDENCE,
            supporting_data: vec![
                "Trend analysis".to_string(),
                "Multiple declining metrics".to_string(),
            ],
            related_metrics: related(),
            timeframe: "Last 30 days".to_string(),
        }),
        TrendDirection::Stable => None,
    }
}

fn medication_insight(prescriptions: &[Prescription]) -> Option<Insight> {
    if prescriptions.is_empty() {
        return None;
    }
    let names: Vec<&str> = prescriptions
        .iter()
        .map(|p| p.medication_name.as_str())
        .collect();

    Some(Insight {
        id: insight_id("medication"),
        insight_type: InsightType::Medication,
        title: "Medication Monitoring".to_string(),
        description: format!(
            "You are currently taking {} medication(s): {}. Monitor for any side effects or changes in effectiveness.",
            prescriptions.len(),
            names.join(", ")
        ),
        severity: Severity::Low,
        confidence: MEDICATION_CONFIDENCE,
        supporting_data: vec![format!("{} active prescriptions", prescriptions.len())],
        related_metrics: vec!["symptoms".to_string(), "side_effects".to_string()],
        timeframe: "Ongoing".to_string(),
    })
}

fn recurring_symptom_insight(interaction: &InteractionInsights) -> Option<Insight> {
    let recommendation = interaction
        .recommendations
        .iter()
        .find_map(|r| r.strip_prefix("Monitor recurring symptoms: "))?;

    Some(Insight {
        id: insight_id("symptom_pattern"),
        insight_type: InsightType::Trend,
        title: "Recurring Symptoms".to_string(),
        description: format!("Similar past check-ins also reported: {recommendation}."),
        severity: Severity::Low,
        confidence: RECURRING_SYMPTOM_CONFIDENCE,
        supporting_data: vec![format!(
            "{} similar check-ins",
            interaction.similar_patterns.len()
        )],
        related_metrics: vec!["symptoms".to_string()],
        timeframe: "Similar past check-ins".to_string(),
    })
}

/// Order by severity, highest first; ties keep generation order
pub fn rank_insights(insights: &mut [Insight]) {
    insights.sort_by(|a, b| b.severity.cmp(&a.severity));
}

/// Builds ranked insights, optionally augmented by a text provider
pub struct InsightGenerator {
    text: Option<Arc<dyn TextGenerationProvider>>,
    options: CompletionOptions,
}

impl InsightGenerator {
    /// Generator without narrative augmentation
    pub fn structured_only() -> Self {
        Self {
            text: None,
            options: CompletionOptions {
                model: String::new(),
                temperature: 0.0,
                max_tokens: 0,
            },
        }
    }

    pub fn with_provider(provider: Arc<dyn TextGenerationProvider>, options: CompletionOptions) -> Self {
        Self {
            text: Some(provider),
            options,
        }
    }

    /// Rule-based insights, unranked
    pub fn structured_insights(&self, inputs: &InsightInputs<'_>) -> Vec<Insight> {
        let mut insights: Vec<Insight> = inputs
            .analysis
            .anomalies
            .iter()
            .map(anomaly_insight)
            .collect();

        insights.extend(inputs.interaction.anomalies.iter().map(pattern_anomaly_insight));
        insights.extend(trend_insight(inputs.interaction.behavior_trends.overall_trend));
        insights.extend(recurring_symptom_insight(inputs.interaction));
        insights.extend(medication_insight(&inputs.context.prescriptions));

        insights
    }

    /// Structured plus narrative insights, ranked by severity
    pub async fn generate(&self, inputs: &InsightInputs<'_>) -> Vec<Insight> {
        let mut insights = self.structured_insights(inputs);

        if let Some(provider) = &self.text {
            let prompt = build_insights_prompt(
                inputs.analysis,
                &inputs.interaction.behavior_trends,
                inputs.interaction.similar_patterns.len(),
                inputs.context,
            );
            match provider.complete(&prompt, &self.options).await {
                Ok(response) => {
                    let extra = parse_ai_insights(&response);
                    tracing::debug!(count = extra.len(), "narrative insights parsed");
                    insights.extend(extra);
                }
                Err(err) => {
                    tracing::warn!(error = %err, "insight augmentation failed");
                }
            }
        }

        rank_insights(&mut insights);
        insights
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;
    use crate::narrative::NarrativeTier;
    use crate::trend::BehaviorTrends;
    use crate::types::{DeviationDirection, RiskLevel, SentimentLabel};
    use async_trait::async_trait;

    struct FixedText(Result<String, ()>);

    #[async_trait]
    impl TextGenerationProvider for FixedText {
        async fn complete(
            &self,
            _prompt: &str,
            _options: &CompletionOptions,
        ) -> Result<String, AnalysisError> {
            self.0
                .clone()
                .map_err(|_| AnalysisError::provider("text", "unavailable"))
        }
    }

    fn options() -> CompletionOptions {
        CompletionOptions {
            model: "test".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
        }
    }

    fn analysis(anomalies: Vec<AnomalyRecord>) -> ResponseAnalysisResult {
        ResponseAnalysisResult {
            sentiment_score: 0.0,
            sentiment_label: SentimentLabel::Neutral,
            health_concerns: vec![],
            emotional_indicators: vec![],
            risk_level: RiskLevel::Low,
            risk_score: 3.0,
            key_insights: vec![],
            recommended_actions: vec![],
            anomalies,
            trends: vec![],
            narrative_tier: NarrativeTier::QuantitativeOnly,
        }
    }

    fn mood_anomaly(severity: Severity) -> AnomalyRecord {
        AnomalyRecord {
            metric_category: MetricCategory::Mood,
            description: "2.0 points lower than usual (28.57% change)".to_string(),
            severity,
            confidence: 0.79,
            direction: DeviationDirection::Decrease,
            percent_diff: -0.2857,
            suggested_action: "Monitor mood over the next few days".to_string(),
        }
    }

    fn context(prescriptions: Vec<Prescription>) -> UserHealthContext {
        UserHealthContext {
            prescriptions,
            ..Default::default()
        }
    }

    fn prescription(name: &str) -> Prescription {
        Prescription {
            id: None,
            medication_name: name.to_string(),
            dosage: None,
            frequency: None,
        }
    }

    #[test]
    fn test_structured_insights() {
        let analysis = analysis(vec![mood_anomaly(Severity::High)]);
        let interaction = InteractionInsights {
            behavior_trends: BehaviorTrends {
                overall_trend: TrendDirection::Declining,
                ..Default::default()
            },
            ..Default::default()
        };
        let context = context(vec![prescription("Metformin"), prescription("Aspirin")]);
        let inputs = InsightInputs {
            analysis: &analysis,
            interaction: &interaction,
            context: &context,
        };

        let insights = InsightGenerator::structured_only().structured_insights(&inputs);
        assert_eq!(insights.len(), 3);

        assert_eq!(insights[0].insight_type, InsightType::Concern);
        assert_eq!(insights[0].title, "Mood Anomaly Detected");
        assert_eq!(insights[0].severity, Severity::High);
        assert_eq!(insights[0].confidence, 0.8);

        assert_eq!(insights[1].title, "Declining Health Trend");
        assert_eq!(insights[1].severity, Severity::Medium);
        assert_eq!(insights[1].confidence, 0.85);

        assert_eq!(insights[2].insight_type, InsightType::Medication);
        assert_eq!(insights[2].severity, Severity::Low);
        assert!(insights[2].description.contains("2 medication(s): Metformin, Aspirin"));
    }

    #[test]
    fn test_stable_trend_adds_nothing_and_improving_is_positive() {
        let analysis = analysis(vec![]);
        let context = context(vec![]);
        let stable = InteractionInsights::default();
        let inputs = InsightInputs {
            analysis: &analysis,
            interaction: &stable,
            context: &context,
        };
        assert!(InsightGenerator::structured_only()
            .structured_insights(&inputs)
            .is_empty());

        let improving = InteractionInsights {
            behavior_trends: BehaviorTrends {
                overall_trend: TrendDirection::Improving,
                ..Default::default()
            },
            ..Default::default()
        };
        let inputs = InsightInputs {
            interaction: &improving,
            ..inputs
        };
        let insights = InsightGenerator::structured_only().structured_insights(&inputs);
        assert_eq!(insights[0].insight_type, InsightType::Positive);
        assert_eq!(insights[0].confidence, 0.9);
        assert_eq!(insights[0].timeframe, "Last 30 days");
    }

    #[test]
    fn test_pattern_anomalies_and_recurring_symptoms() {
        let analysis = analysis(vec![]);
        let context = context(vec![]);
        let interaction = InteractionInsights {
            recommendations: vec!["Monitor recurring symptoms: headache, nausea".to_string()],
            anomalies: vec![PatternAnomaly {
                metric: MetricCategory::Energy,
                description: "Energy level significantly lower than usual".to_string(),
                severity: Severity::Medium,
                z_score: 2.5,
            }],
            ..Default::default()
        };
        let inputs = InsightInputs {
            analysis: &analysis,
            interaction: &interaction,
            context: &context,
        };

        let insights = InsightGenerator::structured_only().structured_insights(&inputs);
        assert_eq!(insights.len(), 2);
        assert_eq!(insights[0].title, "Energy Anomaly Detected");
        assert_eq!(insights[1].insight_type, InsightType::Trend);
        assert!(insights[1].description.contains("headache, nausea"));
    }

    #[tokio::test]
    async fn test_generate_ranks_and_appends_narrative() {
        let analysis = analysis(vec![mood_anomaly(Severity::Low)]);
        let interaction = InteractionInsights::default();
        let context = context(vec![prescription("Metformin")]);
        let inputs = InsightInputs {
            analysis: &analysis,
            interaction: &interaction,
            context: &context,
        };

        let provider = Arc::new(FixedText(Ok(
            r#"[{"type": "lifestyle", "title": "Hydrate", "severity": "high"}]"#.to_string(),
        )));
        let insights = InsightGenerator::with_provider(provider, options())
            .generate(&inputs)
            .await;

        assert_eq!(insights.len(), 3);
        assert_eq!(insights[0].title, "Hydrate");
        // Equal severities keep generation order
        assert_eq!(insights[1].title, "Mood Anomaly Detected");
        assert_eq!(insights[2].title, "Medication Monitoring");
    }

    #[tokio::test]
    async fn test_generate_survives_provider_failure() {
        let analysis = analysis(vec![mood_anomaly(Severity::Medium)]);
        let interaction = InteractionInsights::default();
        let context = context(vec![]);
        let inputs = InsightInputs {
            analysis: &analysis,
            interaction: &interaction,
            context: &context,
        };

        let failing = InsightGenerator::with_provider(Arc::new(FixedText(Err(()))), options());
        let insights = failing.generate(&inputs).await;
        assert_eq!(insights.len(), 1);
        assert_eq!(insights[0].severity, Severity::Medium);

        let garbage = InsightGenerator::with_provider(
            Arc::new(FixedText(Ok("no insights".to_string()))),
            options(),
        );
        assert_eq!(garbage.generate(&inputs).await.len(), 1);
    }
}
