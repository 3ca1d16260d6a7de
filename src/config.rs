//! Analysis configuration
//!
//! Every tunable of the pipeline lives here. Missing JSON fields fall back to
//! their defaults, so a partial config file only needs the values it changes.

use crate::baseline::{BaselineWindow, DEFAULT_LOOKBACK_DAYS};
use crate::error::AnalysisError;
use serde::{Deserialize, Serialize};

/// Sampling settings for one text-generation use
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionSettings {
    pub temperature: f32,
    pub max_tokens: u32,
}

impl CompletionSettings {
    fn with_max_tokens(max_tokens: u32) -> Self {
        Self {
            temperature: 0.3,
            max_tokens,
        }
    }
}

impl Default for CompletionSettings {
    fn default() -> Self {
        Self::with_max_tokens(1000)
    }
}

/// Pipeline configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Days of history feeding the baseline
    pub lookback_days: u32,
    /// Cap on baseline records, most recent first
    pub baseline_record_cap: Option<usize>,
    /// Check-in days expected in a consistency period
    pub expected_check_in_days: u32,
    /// Text-generation model name
    pub model: String,
    /// Narrative analysis sampling
    pub analysis_completion: CompletionSettings,
    /// Insight augmentation sampling
    pub insight_completion: CompletionSettings,
    /// Neighbours returned by a similar-pattern query
    pub similar_pattern_limit: usize,
    /// Stored interactions read for interaction insights
    pub interaction_history_limit: usize,
    /// Ask the text provider for narrative analysis and extra insights
    pub narrative_enabled: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            baseline_record_cap: None,
            expected_check_in_days: 30,
            model: "gpt-4".to_string(),
            analysis_completion: CompletionSettings::with_max_tokens(2000),
            insight_completion: CompletionSettings::with_max_tokens(1000),
            similar_pattern_limit: 10,
            interaction_history_limit: 30,
            narrative_enabled: true,
        }
    }
}

impl AnalysisConfig {
    /// Parse and validate a JSON config
    pub fn from_json(json: &str) -> Result<Self, AnalysisError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String, AnalysisError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), AnalysisError> {
        if self.lookback_days == 0 {
            return Err(AnalysisError::Config(
                "lookback_days must be at least 1".to_string(),
            ));
        }
        if self.expected_check_in_days == 0 {
            return Err(AnalysisError::Config(
                "expected_check_in_days must be at least 1".to_string(),
            ));
        }
        for (name, settings) in [
            ("analysis_completion", &self.analysis_completion),
            ("insight_completion", &self.insight_completion),
        ] {
            if !(0.0..=2.0).contains(&settings.temperature) {
                return Err(AnalysisError::Config(format!(
                    "{name}.temperature must be within [0, 2], got {}",
                    settings.temperature
                )));
            }
        }
        Ok(())
    }

    /// Baseline window described by this config
    pub fn baseline_window(&self) -> BaselineWindow {
        BaselineWindow {
            lookback_days: self.lookback_days,
            max_records: self.baseline_record_cap,
        }
    }
}
