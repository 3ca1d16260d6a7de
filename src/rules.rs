//! Notification rules
//!
//! A small predicate evaluator. Rules live in an immutable `RuleSet`; the
//! registry hands out `Arc` snapshots to readers and swaps in a modified copy
//! on every toggle or addition, so an evaluation never sees a list change
//! under it.

use crate::providers::{Alert, AlertDispatcher};
use crate::types::{Insight, InsightType, Prescription, Severity};
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use thiserror::Error;

/// Symptoms that suggest a medication side effect
pub const MEDICATION_SIDE_EFFECTS: [&str; 3] = ["nausea", "dizziness", "fatigue"];

/// Failure inside a rule predicate; always treated as "no match"
#[derive(Debug, Error)]
pub enum RuleError {
    #[error("missing field: {0}")]
    MissingField(&'static str),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerType {
    Insight,
    RiskAlert,
    FollowUp,
    Engagement,
}

impl TriggerType {
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "insight" => Some(TriggerType::Insight),
            "risk_alert" => Some(TriggerType::RiskAlert),
            "follow_up" => Some(TriggerType::FollowUp),
            "engagement" => Some(TriggerType::Engagement),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulePriority {
    Low,
    Medium,
    High,
    Critical,
}

/// Per-user context attached to an evaluation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserRuleContext {
    pub user_id: String,
    pub duration_days: Option<u32>,
    pub last_activity: Option<DateTime<Utc>>,
    pub engagement_score: Option<f64>,
    pub risk_factors: Vec<String>,
    /// Free-form extras
    pub extra: HashMap<String, serde_json::Value>,
}

/// Evidence a rule set is evaluated against
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EvaluationData {
    pub insight: Option<Insight>,
    pub risk_score: Option<f64>,
    pub trends: Vec<String>,
    pub symptoms: Vec<String>,
    pub prescriptions: Vec<Prescription>,
    pub missed_days: Option<u32>,
    pub total_check_ins: Option<u32>,
    pub last_check_in: Option<DateTime<Utc>>,
    pub user_context: Option<UserRuleContext>,
}

/// Extra context supplied when evaluating an insight
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InsightRuleContext {
    pub symptoms: Vec<String>,
    pub prescriptions: Vec<Prescription>,
    pub user_context: Option<UserRuleContext>,
}

/// Evaluation data for a freshly generated insight.
///
/// The insight's confidence is rescaled to a 0-10 risk score and its type is
/// the only trend.
pub fn insight_evaluation_data(insight: &Insight, context: InsightRuleContext) -> EvaluationData {
    EvaluationData {
        risk_score: Some(insight.confidence * 10.0),
        trends: vec![insight.insight_type.as_str().to_string()],
        insight: Some(insight.clone()),
        symptoms: context.symptoms,
        prescriptions: context.prescriptions,
        user_context: context.user_context,
        ..Default::default()
    }
}

/// Evaluation data for engagement checks
pub fn engagement_evaluation_data(
    missed_days: u32,
    total_check_ins: u32,
    last_check_in: Option<DateTime<Utc>>,
) -> EvaluationData {
    EvaluationData {
        missed_days: Some(missed_days),
        total_check_ins: Some(total_check_ins),
        last_check_in,
        ..Default::default()
    }
}

pub type Predicate = Arc<dyn Fn(&EvaluationData) -> Result<bool, RuleError> + Send + Sync>;

/// One declarative rule
#[derive(Clone)]
pub struct NotificationRule {
    pub id: String,
    pub name: String,
    pub description: String,
    pub trigger_type: TriggerType,
    pub priority: RulePriority,
    pub enabled: bool,
    predicate: Predicate,
}

impl fmt::Debug for NotificationRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationRule")
            .field("id", &self.id)
            .field("trigger_type", &self.trigger_type)
            .field("priority", &self.priority)
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl NotificationRule {
    pub fn new<F>(
        id: impl Into<String>,
        name: impl Into<String>,
        description: impl Into<String>,
        trigger_type: TriggerType,
        priority: RulePriority,
        predicate: F,
    ) -> Self
    where
        F: Fn(&EvaluationData) -> Result<bool, RuleError> + Send + Sync + 'static,
    {
        Self {
            id: id.into(),
            name: name.into(),
            description: description.into(),
            trigger_type,
            priority,
            enabled: true,
            predicate: Arc::new(predicate),
        }
    }

    /// Evaluate the predicate; errors and panics count as no match
    pub fn matches(&self, data: &EvaluationData) -> bool {
        match catch_unwind(AssertUnwindSafe(|| (self.predicate)(data))) {
            Ok(Ok(matched)) => matched,
            Ok(Err(err)) => {
                tracing::warn!(rule_id = %self.id, error = %err, "rule predicate failed");
                false
            }
            Err(_) => {
                tracing::warn!(rule_id = %self.id, "rule predicate panicked");
                false
            }
        }
    }

    /// Serializable view without the predicate
    pub fn summary(&self) -> RuleSummary {
        RuleSummary {
            id: self.id.clone(),
            name: self.name.clone(),
            description: self.description.clone(),
            trigger_type: self.trigger_type,
            priority: self.priority,
            enabled: self.enabled,
        }
    }
}

/// A rule as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub trigger_type: TriggerType,
    pub priority: RulePriority,
    pub enabled: bool,
}

/// An immutable, ordered list of rules
#[derive(Debug, Clone, Default)]
pub struct RuleSet {
    rules: Vec<NotificationRule>,
}

impl RuleSet {
    pub fn new(rules: Vec<NotificationRule>) -> Self {
        Self { rules }
    }

    /// The built-in rules
    pub fn defaults() -> Self {
        Self::new(vec![
            NotificationRule::new(
                "high_risk_score",
                "High Risk Score Alert",
                "Trigger critical alert when risk score is 8 or higher",
                TriggerType::RiskAlert,
                RulePriority::Critical,
                |data| Ok(data.risk_score.unwrap_or(0.0) >= 8.0),
            ),
            NotificationRule::new(
                "declining_trend",
                "Declining Health Trend",
                "Alert when health metrics show declining trend for 3+ days",
                TriggerType::Insight,
                RulePriority::High,
                |data| {
                    let declining = data.trends.iter().any(|t| t == "declining");
                    let duration = data
                        .user_context
                        .as_ref()
                        .and_then(|c| c.duration_days)
                        .unwrap_or(0);
                    Ok(declining && duration >= 3)
                },
            ),
            NotificationRule::new(
                "missed_checkins",
                "Missed Check-ins Follow-up",
                "Engage users who missed 2 or more check-ins",
                TriggerType::Engagement,
                RulePriority::Medium,
                |data| Ok(data.missed_days.unwrap_or(0) >= 2),
            ),
            NotificationRule::new(
                "medication_concern",
                "Medication Side Effects Alert",
                "Alert when symptoms suggest medication side effects",
                TriggerType::Insight,
                RulePriority::High,
                |data| {
                    let side_effect = data.symptoms.iter().any(|s| {
                        let lowered = s.to_lowercase();
                        MEDICATION_SIDE_EFFECTS.contains(&lowered.as_str())
                    });
                    Ok(side_effect && !data.prescriptions.is_empty())
                },
            ),
            NotificationRule::new(
                "high_severity_insight",
                "High Severity Health Insight",
                "Alert for high severity health insights",
                TriggerType::Insight,
                RulePriority::High,
                |data| {
                    Ok(data.insight.as_ref().is_some_and(|i| {
                        i.severity == Severity::High || i.insight_type == InsightType::Concern
                    }))
                },
            ),
        ])
    }

    pub fn rules(&self) -> &[NotificationRule] {
        &self.rules
    }

    /// Every enabled rule whose predicate holds, in rule order
    pub fn evaluate(&self, data: &EvaluationData) -> Vec<NotificationRule> {
        let matching: Vec<NotificationRule> = self
            .rules
            .iter()
            .filter(|rule| rule.enabled && rule.matches(data))
            .cloned()
            .collect();

        tracing::debug!(
            evaluated = self.rules.len(),
            matched = matching.len(),
            matching_rule_ids = ?matching.iter().map(|r| r.id.as_str()).collect::<Vec<_>>(),
            "rules evaluated"
        );

        matching
    }
}

/// Process-wide rule registry with single-writer snapshot updates
#[derive(Debug)]
pub struct RuleRegistry {
    current: RwLock<Arc<RuleSet>>,
}

impl Default for RuleRegistry {
    fn default() -> Self {
        Self::new(RuleSet::defaults())
    }
}

impl RuleRegistry {
    pub fn new(rules: RuleSet) -> Self {
        Self {
            current: RwLock::new(Arc::new(rules)),
        }
    }

    /// The rule set as of now; later updates do not affect it
    pub fn snapshot(&self) -> Arc<RuleSet> {
        Arc::clone(&self.current.read())
    }

    pub fn evaluate_rules(&self, data: &EvaluationData) -> Vec<NotificationRule> {
        self.snapshot().evaluate(data)
    }

    pub fn all_rules(&self) -> Vec<NotificationRule> {
        self.snapshot().rules().to_vec()
    }

    pub fn rules_by_trigger_type(&self, trigger_type: TriggerType) -> Vec<NotificationRule> {
        self.snapshot()
            .rules()
            .iter()
            .filter(|r| r.trigger_type == trigger_type)
            .cloned()
            .collect()
    }

    /// Enable or disable a rule; `false` when no rule has that id
    pub fn toggle_rule(&self, rule_id: &str, enabled: bool) -> bool {
        let mut guard = self.current.write();
        let Some(position) = guard.rules.iter().position(|r| r.id == rule_id) else {
            return false;
        };

        let mut next = RuleSet::clone(&guard);
        next.rules[position].enabled = enabled;
        *guard = Arc::new(next);

        tracing::info!(rule_id, enabled, "rule toggled");
        true
    }

    /// Append a rule after the existing ones
    pub fn add_rule(&self, rule: NotificationRule) {
        let mut guard = self.current.write();
        let mut next = RuleSet::clone(&guard);
        tracing::info!(rule_id = %rule.id, "rule added");
        next.rules.push(rule);
        *guard = Arc::new(next);
    }
}

/// Send every matched rule to the dispatcher; returns how many were delivered.
///
/// A failed delivery is logged and does not stop the rest.
pub async fn dispatch_matches(
    dispatcher: &dyn AlertDispatcher,
    user_id: &str,
    matches: &[NotificationRule],
) -> usize {
    let mut delivered = 0;
    for rule in matches {
        let alert = Alert::Rule {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            trigger_type: rule.trigger_type,
            priority: rule.priority,
        };
        match dispatcher.notify(user_id, alert).await {
            Ok(()) => delivered += 1,
            Err(err) => {
                tracing::warn!(rule_id = %rule.id, user_id, error = %err, "alert dispatch failed");
            }
        }
    }
    delivered
}
