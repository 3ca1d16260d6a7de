//! Pipeline orchestration
//!
//! `Analyzer` is the public entry point. It fetches what a call needs from the
//! collaborators once, runs the pure stages in order (baseline, anomaly,
//! trend, risk, narrative, combination) and degrades to the quantitative path
//! whenever a provider fails.

use crate::anomaly::AnomalyDetector;
use crate::baseline::{BaselineCalculator, BaselineMetrics};
use crate::behavior::{BehaviorEncoder, BehaviorEvent, BehaviorMetadata};
use crate::config::AnalysisConfig;
use crate::error::AnalysisError;
use crate::health_score::{ConsistencyRatio, HealthScoreCalculator, HealthScoreInputs};
use crate::insights::{InsightGenerator, InsightInputs};
use crate::interaction::InteractionInsights;
use crate::narrative::{build_analysis_prompt, parse_analysis_response, NarrativeOutcome};
use crate::providers::{
    AlertDispatcher, CompletionOptions, EmbeddingProvider, HistoryStore, TextGenerationProvider,
};
use crate::risk::{RiskInputs, RiskScorer};
use crate::rules::{dispatch_matches, EvaluationData, NotificationRule, RuleRegistry};
use crate::trend::{TrendAnalysis, TrendAnalyzer};
use crate::types::{
    AnomalyRecord, CheckInRecord, CheckInResponse, Insight, MetricCategory, ResponseAnalysisResult,
    RiskLevel, SentimentLabel, TrendDirection, TrendRecord, UserHealthContext, UserProfile,
};
use crate::vector::{
    Behavioral, InteractionRecord, MemorySimilarityIndex, Semantic, SimilarityIndex,
    SimilarityMatch,
};
use chrono::{Duration, NaiveDate};
use std::collections::HashSet;
use std::sync::Arc;

/// Quantitative half of a response analysis
#[derive(Debug, Clone, PartialEq)]
pub struct QuantitativeAnalysis {
    pub baseline: BaselineMetrics,
    pub anomalies: Vec<AnomalyRecord>,
    pub risk_score: f64,
    pub risk_level: RiskLevel,
    pub trends: Vec<TrendRecord>,
}

impl QuantitativeAnalysis {
    /// Run anomaly, risk and trend stages for one check-in.
    ///
    /// `history` must already be restricted to days before the check-in.
    pub fn compute(
        current: &CheckInRecord,
        responses: &[CheckInResponse],
        history: &[CheckInRecord],
        baseline: BaselineMetrics,
    ) -> Self {
        let current_values: Vec<(MetricCategory, f64)> = MetricCategory::SCORED
            .iter()
            .filter_map(|metric| current.metric(*metric).map(|v| (*metric, v)))
            .collect();
        let anomalies = AnomalyDetector::detect_all(&current_values, &baseline);

        let risk_score = RiskScorer::score(&RiskInputs::from_responses(responses), Some(&baseline));

        // Trends run over history plus the current check-in
        let mut series = history.to_vec();
        series.push(current.clone());
        let trends = TrendAnalyzer::metric_trends(&series);

        Self {
            baseline,
            anomalies,
            risk_level: RiskScorer::level(risk_score),
            risk_score,
            trends,
        }
    }
}

/// Merge the quantitative result with whatever the narrative tier produced.
///
/// Risk always comes from the quantitative side. On a category collision the
/// quantitative anomaly wins and the narrative one is dropped.
pub fn combine_analysis(
    quantitative: QuantitativeAnalysis,
    narrative: NarrativeOutcome,
) -> ResponseAnalysisResult {
    let NarrativeOutcome { tier, analysis } = narrative;

    let flagged: HashSet<MetricCategory> = quantitative
        .anomalies
        .iter()
        .map(|a| a.metric_category)
        .collect();

    let mut anomalies = quantitative.anomalies;
    anomalies.extend(
        analysis
            .anomalies
            .into_iter()
            .filter(|a| !flagged.contains(&a.metric_category)),
    );

    let mut trends = quantitative.trends;
    trends.extend(analysis.trends);

    let mut recommended_actions = analysis.recommended_actions;
    for anomaly in &anomalies {
        if !recommended_actions.contains(&anomaly.suggested_action) {
            recommended_actions.push(anomaly.suggested_action.clone());
        }
    }

    ResponseAnalysisResult {
        sentiment_score: analysis
            .sentiment_score
            .filter(|s| s.is_finite())
            .unwrap_or(0.0)
            .clamp(-1.0, 1.0),
        sentiment_label: analysis.sentiment_label.unwrap_or(SentimentLabel::Neutral),
        health_concerns: analysis.health_concerns,
        emotional_indicators: analysis.emotional_indicators,
        risk_level: quantitative.risk_level,
        risk_score: quantitative.risk_score,
        key_insights: analysis.key_insights,
        recommended_actions,
        anomalies,
        trends,
        narrative_tier: tier,
    }
}

/// Keep the value of a recoverable failure's default; invariant violations
/// still propagate.
fn recover<T: Default>(result: Result<T, AnalysisError>, what: &str) -> Result<T, AnalysisError> {
    match result {
        Ok(value) => Ok(value),
        Err(err) if err.is_invariant_violation() => Err(err),
        Err(err) => {
            tracing::warn!(error = %err, stage = what, "falling back after provider failure");
            Ok(T::default())
        }
    }
}

/// Stateless analysis front end over pluggable collaborators.
///
/// The only shared mutable state is the rule registry, which is updated by
/// snapshot swap.
pub struct Analyzer {
    config: AnalysisConfig,
    history: Arc<dyn HistoryStore>,
    embeddings: Option<Arc<dyn EmbeddingProvider>>,
    text: Option<Arc<dyn TextGenerationProvider>>,
    alerts: Option<Arc<dyn AlertDispatcher>>,
    semantic_index: Arc<dyn SimilarityIndex<Semantic>>,
    behavioral_index: Arc<dyn SimilarityIndex<Behavioral>>,
    behavior_encoder: BehaviorEncoder,
    rules: RuleRegistry,
}

impl Analyzer {
    /// Analyzer with default config, in-memory indices and the built-in rules
    pub fn new(history: Arc<dyn HistoryStore>) -> Self {
        Self {
            config: AnalysisConfig::default(),
            history,
            embeddings: None,
            text: None,
            alerts: None,
            semantic_index: Arc::new(MemorySimilarityIndex::<Semantic>::new()),
            behavioral_index: Arc::new(MemorySimilarityIndex::<Behavioral>::new()),
            behavior_encoder: BehaviorEncoder::new(),
            rules: RuleRegistry::default(),
        }
    }

    /// Replace the config after validating it
    pub fn with_config(mut self, config: AnalysisConfig) -> Result<Self, AnalysisError> {
        config.validate()?;
        self.config = config;
        Ok(self)
    }

    pub fn with_embeddings(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embeddings = Some(provider);
        self
    }

    pub fn with_text_provider(mut self, provider: Arc<dyn TextGenerationProvider>) -> Self {
        self.text = Some(provider);
        self
    }

    pub fn with_alerts(mut self, dispatcher: Arc<dyn AlertDispatcher>) -> Self {
        self.alerts = Some(dispatcher);
        self
    }

    pub fn with_semantic_index(mut self, index: Arc<dyn SimilarityIndex<Semantic>>) -> Self {
        self.semantic_index = index;
        self
    }

    pub fn with_behavioral_index(mut self, index: Arc<dyn SimilarityIndex<Behavioral>>) -> Self {
        self.behavioral_index = index;
        self
    }

    pub fn with_rules(mut self, rules: RuleRegistry) -> Self {
        self.rules = rules;
        self
    }

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn rules(&self) -> &RuleRegistry {
        &self.rules
    }

    /// Text provider, but only when narrative augmentation is switched on
    fn narrative_provider(&self) -> Option<&Arc<dyn TextGenerationProvider>> {
        self.text.as_ref().filter(|_| self.config.narrative_enabled)
    }

    fn completion_options(&self, settings: &crate::config::CompletionSettings) -> CompletionOptions {
        CompletionOptions {
            model: self.config.model.clone(),
            temperature: settings.temperature,
            max_tokens: settings.max_tokens,
        }
    }

    /// History in the baseline window before `date`, plus the profile
    async fn fetch_context(
        &self,
        user_id: &str,
        date: NaiveDate,
    ) -> Result<(Vec<CheckInRecord>, Option<UserProfile>), AnalysisError> {
        let window = self.config.baseline_window();
        let since = window.since(date);

        let (history, profile) = tokio::join!(
            self.history.recent_check_ins(user_id, since, usize::MAX),
            self.history.user_profile(user_id),
        );

        let history = recover(history, "check-in history")?;
        let profile = recover(profile, "user profile")?;

        Ok((BaselineCalculator::window_records(&history, date, window), profile))
    }

    /// Analyze one check-in's responses against the user's history
    pub async fn analyze_responses(
        &self,
        user_id: &str,
        date: NaiveDate,
        responses: &[CheckInResponse],
    ) -> Result<ResponseAnalysisResult, AnalysisError> {
        // Stage 1: fetch history and profile together
        let (history, profile) = self.fetch_context(user_id, date).await?;

        // Stage 2: baseline, anomalies, risk and trends
        let baseline = BaselineCalculator::from_records(&history);
        let current = CheckInRecord::from_responses(user_id, date, responses);
        let quantitative = QuantitativeAnalysis::compute(&current, responses, &history, baseline);

        // Stage 3: optional narrative
        let narrative = match self.narrative_provider() {
            Some(provider) => {
                let prompt =
                    build_analysis_prompt(responses, Some(&quantitative.baseline), profile.as_ref());
                let options = self.completion_options(&self.config.analysis_completion);
                match provider.complete(&prompt, &options).await {
                    Ok(response) => parse_analysis_response(&response),
                    Err(err) => {
                        tracing::warn!(user_id, error = %err, "narrative analysis failed");
                        NarrativeOutcome::quantitative_only(responses)
                    }
                }
            }
            None => NarrativeOutcome::quantitative_only(responses),
        };

        // Stage 4: combine
        let result = combine_analysis(quantitative, narrative);

        tracing::info!(
            user_id,
            history = history.len(),
            risk_score = result.risk_score,
            anomalies = result.anomalies.len(),
            tier = result.narrative_tier.as_str(),
            "responses analyzed"
        );

        Ok(result)
    }

    /// Health context built from the stored profile; empty when unavailable
    pub async fn user_health_context(&self, user_id: &str) -> Result<UserHealthContext, AnalysisError> {
        let profile = recover(self.history.user_profile(user_id).await, "user profile")?;
        Ok(profile.map(UserHealthContext::from).unwrap_or_default())
    }

    /// Ranked insights for an analysis result
    pub async fn generate_insights(
        &self,
        analysis: &ResponseAnalysisResult,
        interaction: &InteractionInsights,
        context: &UserHealthContext,
    ) -> Vec<Insight> {
        let generator = match self.narrative_provider() {
            Some(provider) => InsightGenerator::with_provider(
                Arc::clone(provider),
                self.completion_options(&self.config.insight_completion),
            ),
            None => InsightGenerator::structured_only(),
        };

        generator
            .generate(&InsightInputs {
                analysis,
                interaction,
                context,
            })
            .await
    }

    pub fn compute_health_score(
        &self,
        analysis: &ResponseAnalysisResult,
        overall_trend: TrendDirection,
        consistency: ConsistencyRatio,
    ) -> u8 {
        HealthScoreCalculator::compute(&HealthScoreInputs::from_analysis(
            analysis,
            overall_trend,
            consistency,
        ))
    }

    /// Share of expected days with at least one check-in, ending before `as_of`
    pub async fn check_in_consistency(
        &self,
        user_id: &str,
        as_of: NaiveDate,
    ) -> Result<ConsistencyRatio, AnalysisError> {
        let expected = self.config.expected_check_in_days;
        let since = as_of - Duration::days(i64::from(expected));
        let records = recover(
            self.history.recent_check_ins(user_id, since, usize::MAX).await,
            "check-in history",
        )?;

        let days: HashSet<NaiveDate> = records
            .iter()
            .map(|r| r.date)
            .filter(|d| *d < as_of)
            .collect();
        let present = u32::try_from(days.len()).unwrap_or(u32::MAX);

        Ok(ConsistencyRatio::from_days(present, expected))
    }

    /// Matching rules for `data`, forwarded to the alert dispatcher if one is set
    pub async fn evaluate_notification_rules(
        &self,
        user_id: &str,
        data: &EvaluationData,
    ) -> Vec<NotificationRule> {
        let matches = self.rules.evaluate_rules(data);

        if let Some(dispatcher) = &self.alerts {
            if !matches.is_empty() {
                dispatch_matches(dispatcher.as_ref(), user_id, &matches).await;
            }
        }

        matches
    }

    /// Embed an interaction and keep it in the semantic index
    pub async fn store_interaction(&self, record: &InteractionRecord) -> Result<String, AnalysisError> {
        let embeddings = self
            .embeddings
            .as_ref()
            .ok_or_else(|| AnalysisError::Config("no embedding provider configured".to_string()))?;

        let vector = embeddings.embed(&record.to_text()).await?;
        let id = self
            .semantic_index
            .store(&record.user_id, record.timestamp, vector, record.metadata())
            .await?;

        tracing::debug!(user_id = %record.user_id, vector_id = %id, "interaction stored");
        Ok(id)
    }

    /// Embed and store several interactions with one embedding round trip
    pub async fn store_interactions(
        &self,
        records: &[InteractionRecord],
    ) -> Result<Vec<String>, AnalysisError> {
        if records.is_empty() {
            return Ok(Vec::new());
        }
        let embeddings = self
            .embeddings
            .as_ref()
            .ok_or_else(|| AnalysisError::Config("no embedding provider configured".to_string()))?;

        let texts: Vec<String> = records.iter().map(InteractionRecord::to_text).collect();
        let vectors = embeddings.embed_batch(&texts).await?;
        if vectors.len() != records.len() {
            return Err(AnalysisError::MalformedResponse(format!(
                "expected {} embeddings, got {}",
                records.len(),
                vectors.len()
            )));
        }

        let mut ids = Vec::with_capacity(records.len());
        for (record, vector) in records.iter().zip(vectors) {
            ids.push(
                self.semantic_index
                    .store(&record.user_id, record.timestamp, vector, record.metadata())
                    .await?,
            );
        }
        Ok(ids)
    }

    async fn similar_interactions(
        &self,
        user_id: &str,
        current: &InteractionRecord,
    ) -> Result<Vec<SimilarityMatch<crate::vector::InteractionMetadata>>, AnalysisError> {
        let Some(embeddings) = &self.embeddings else {
            return Ok(Vec::new());
        };
        let vector = embeddings.embed(&current.to_text()).await?;
        self.semantic_index
            .query(user_id, &vector, self.config.similar_pattern_limit, false)
            .await
    }

    /// Trends, recommendations, risk factors and anomalies from stored
    /// interactions.
    ///
    /// Embedding or index failures leave the similar patterns empty.
    pub async fn interaction_insights(
        &self,
        user_id: &str,
        current: Option<&InteractionRecord>,
    ) -> Result<InteractionInsights, AnalysisError> {
        let similar = async {
            match current {
                Some(record) => self.similar_interactions(user_id, record).await,
                None => Ok(Vec::new()),
            }
        };
        let history = self
            .semantic_index
            .history(user_id, self.config.interaction_history_limit);

        let (similar, history) = tokio::join!(similar, history);
        let similar = recover(similar, "similar interactions")?;
        let history = recover(history, "interaction history")?;

        Ok(InteractionInsights::derive(similar, &history, current))
    }

    /// Encode a notification interaction and keep it in the behavioral index
    pub async fn track_behavior(&self, event: &BehaviorEvent) -> Result<String, AnalysisError> {
        let vector = self.behavior_encoder.encode(event);
        self.behavioral_index
            .store(&event.user_id, event.timestamp, vector, event.metadata())
            .await
    }

    /// Behavior most similar to `event`, across every user
    pub async fn find_similar_behaviors(
        &self,
        event: &BehaviorEvent,
        k: usize,
    ) -> Result<Vec<SimilarityMatch<BehaviorMetadata>>, AnalysisError> {
        let vector = self.behavior_encoder.encode(event);
        self.behavioral_index
            .query(&event.user_id, &vector, k, true)
            .await
    }

    /// Remove a user's vectors from both indices
    pub async fn delete_user_data(&self, user_id: &str) -> Result<usize, AnalysisError> {
        let (semantic, behavioral) = tokio::join!(
            self.semantic_index.delete_all_for(user_id),
            self.behavioral_index.delete_all_for(user_id),
        );
        let removed = semantic? + behavioral?;

        tracing::info!(user_id, removed, "user vectors deleted");
        Ok(removed)
    }

    /// Full trend report over the baseline window before `as_of`
    pub async fn trend_analysis(
        &self,
        user_id: &str,
        as_of: NaiveDate,
    ) -> Result<TrendAnalysis, AnalysisError> {
        let (history, _) = self.fetch_context(user_id, as_of).await?;
        Ok(TrendAnalyzer::trend_analysis(&history))
    }
}
