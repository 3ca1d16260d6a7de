//! wellsignal - Statistical health-signal analysis for daily check-ins
//!
//! wellsignal turns a user's daily check-in answers into baselines, anomalies,
//! trends and a bounded risk score, then layers ranked insights, a composite
//! health score and declarative notification rules on top:
//! history → baseline → anomaly/trend/risk → narrative → insights → rules.
//!
//! ## Modules
//!
//! - **Analysis core**: `baseline`, `anomaly`, `trend`, `risk`, `health_score`
//! - **Narrative**: tiered parsing of optional text-generation output
//! - **Interaction memory**: semantic and behavioral vector indices
//! - **Rules**: snapshot-swapped notification rule registry
//!
//! Persistence, embeddings, text generation and alert delivery are
//! collaborators behind the async traits in `providers`.

pub mod anomaly;
pub mod baseline;
pub mod behavior;
pub mod config;
pub mod error;
pub mod health_score;
pub mod insights;
pub mod interaction;
pub mod narrative;
pub mod pipeline;
pub mod providers;
pub mod risk;
pub mod rules;
pub mod trend;
pub mod types;
pub mod vector;

pub use config::AnalysisConfig;
pub use error::AnalysisError;
pub use pipeline::Analyzer;

// Stage exports
pub use anomaly::AnomalyDetector;
pub use baseline::{BaselineCalculator, BaselineMetrics, BaselineWindow};
pub use health_score::{ConsistencyRatio, HealthScoreCalculator};
pub use insights::InsightGenerator;
pub use narrative::{NarrativeOutcome, NarrativeTier};
pub use risk::RiskScorer;
pub use rules::{EvaluationData, NotificationRule, RuleRegistry};
pub use trend::TrendAnalyzer;

/// Crate version reported by the CLI
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
