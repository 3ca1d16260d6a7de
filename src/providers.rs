//! Collaborator contracts
//!
//! Persistence, embeddings, text generation and alert delivery all live
//! outside this crate. Each is an async trait so callers can plug in real
//! clients; `MemoryHistoryStore` is a small in-process store used by the CLI
//! and tests.

use crate::error::AnalysisError;
use crate::types::{CheckInRecord, Insight, UserProfile};
use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Source of check-in history and profiles
#[async_trait]
pub trait HistoryStore: Send + Sync {
    /// Check-ins on or after `since`, newest first, at most `limit`
    async fn recent_check_ins(
        &self,
        user_id: &str,
        since: NaiveDate,
        limit: usize,
    ) -> Result<Vec<CheckInRecord>, AnalysisError>;

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AnalysisError>;
}

/// Text embedding service
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, AnalysisError>;

    /// Embed several texts in one round trip
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, AnalysisError>;
}

/// Sampling options for one completion
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletionOptions {
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

/// Free-text generation service used for narrative decoration
#[async_trait]
pub trait TextGenerationProvider: Send + Sync {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, AnalysisError>;
}

/// What gets handed to the alert collaborator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Alert {
    Insight(Insight),
    Rule {
        rule_id: String,
        rule_name: String,
        trigger_type: crate::rules::TriggerType,
        priority: crate::rules::RulePriority,
    },
}

/// Delivery of alerts; delivery itself happens elsewhere
#[async_trait]
pub trait AlertDispatcher: Send + Sync {
    async fn notify(&self, user_id: &str, alert: Alert) -> Result<(), AnalysisError>;
}

/// History held in memory, keyed by user
#[derive(Debug, Default)]
pub struct MemoryHistoryStore {
    check_ins: RwLock<HashMap<String, Vec<CheckInRecord>>>,
    profiles: RwLock<HashMap<String, UserProfile>>,
}

impl MemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_check_in(&self, record: CheckInRecord) {
        self.check_ins
            .write()
            .entry(record.user_id.clone())
            .or_default()
            .push(record);
    }

    pub fn extend_check_ins(&self, records: impl IntoIterator<Item = CheckInRecord>) {
        for record in records {
            self.insert_check_in(record);
        }
    }

    pub fn set_profile(&self, user_id: impl Into<String>, profile: UserProfile) {
        self.profiles.write().insert(user_id.into(), profile);
    }
}

#[async_trait]
impl HistoryStore for MemoryHistoryStore {
    async fn recent_check_ins(
        &self,
        user_id: &str,
        since: NaiveDate,
        limit: usize,
    ) -> Result<Vec<CheckInRecord>, AnalysisError> {
        let mut records: Vec<CheckInRecord> = self
            .check_ins
            .read()
            .get(user_id)
            .map(|records| records.iter().filter(|r| r.date >= since).cloned().collect())
            .unwrap_or_default();

        records.sort_by(|a, b| b.date.cmp(&a.date));
        records.truncate(limit);
        Ok(records)
    }

    async fn user_profile(&self, user_id: &str) -> Result<Option<UserProfile>, AnalysisError> {
        Ok(self.profiles.read().get(user_id).cloned())
    }
}
