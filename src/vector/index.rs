//! Typed similarity indices
//!
//! `SimilarityIndex<S>` is the contract a vector store implements for one
//! encoding scheme. The scheme fixes the vector dimension and the metadata
//! type at compile time, so a behavioral vector cannot be stored in the
//! semantic index. Dimension checks at runtime still guard every write and
//! query, since provider output is only known at runtime.

use crate::behavior::{BehaviorMetadata, BEHAVIOR_DIMENSION};
use crate::error::AnalysisError;
use crate::vector::cosine_similarity;
use crate::vector::semantic::{InteractionMetadata, SEMANTIC_DIMENSION};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::marker::PhantomData;
use uuid::Uuid;

/// A family of vectors sharing one dimension and metadata shape
pub trait EncodingScheme: Send + Sync + 'static {
    const NAME: &'static str;
    const DIMENSION: usize;
    type Metadata: Debug + Clone + Send + Sync + Serialize + DeserializeOwned + 'static;
}

/// Provider embeddings of check-in interactions
#[derive(Debug, Clone, Copy)]
pub struct Semantic;

impl EncodingScheme for Semantic {
    const NAME: &'static str = "semantic";
    const DIMENSION: usize = SEMANTIC_DIMENSION;
    type Metadata = InteractionMetadata;
}

/// Hand-encoded notification behavior vectors
#[derive(Debug, Clone, Copy)]
pub struct Behavioral;

impl EncodingScheme for Behavioral {
    const NAME: &'static str = "behavioral";
    const DIMENSION: usize = BEHAVIOR_DIMENSION;
    type Metadata = BehaviorMetadata;
}

/// A vector as held by an index
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredVector<M> {
    pub id: String,
    pub owner_id: String,
    pub timestamp: DateTime<Utc>,
    pub vector: Vec<f32>,
    pub metadata: M,
}

/// One ranked query hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityMatch<M> {
    pub id: String,
    pub owner_id: String,
    pub similarity: f32,
    pub metadata: M,
    pub timestamp: DateTime<Utc>,
}

/// Nearest-neighbour store for one encoding scheme
#[async_trait]
pub trait SimilarityIndex<S: EncodingScheme>: Send + Sync {
    /// Store a vector and return its id
    async fn store(
        &self,
        owner_id: &str,
        timestamp: DateTime<Utc>,
        vector: Vec<f32>,
        metadata: S::Metadata,
    ) -> Result<String, AnalysisError>;

    /// Up to `k` matches ordered by descending cosine similarity.
    ///
    /// Only `owner_id`'s vectors are searched unless `include_others` is set.
    async fn query(
        &self,
        owner_id: &str,
        vector: &[f32],
        k: usize,
        include_others: bool,
    ) -> Result<Vec<SimilarityMatch<S::Metadata>>, AnalysisError>;

    /// Up to `limit` of the owner's vectors, newest first
    async fn history(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredVector<S::Metadata>>, AnalysisError>;

    /// Remove every vector owned by `owner_id`; returns how many were removed
    async fn delete_all_for(&self, owner_id: &str) -> Result<usize, AnalysisError>;
}

fn check_dimension<S: EncodingScheme>(vector: &[f32]) -> Result<(), AnalysisError> {
    if vector.len() != S::DIMENSION {
        return Err(AnalysisError::DimensionMismatch {
            scheme: S::NAME,
            expected: S::DIMENSION,
            actual: vector.len(),
        });
    }
    Ok(())
}

/// In-process index backed by a concurrent map
pub struct MemorySimilarityIndex<S: EncodingScheme> {
    vectors: DashMap<String, StoredVector<S::Metadata>>,
    _scheme: PhantomData<S>,
}

impl<S: EncodingScheme> Default for MemorySimilarityIndex<S> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S: EncodingScheme> MemorySimilarityIndex<S> {
    pub fn new() -> Self {
        Self {
            vectors: DashMap::new(),
            _scheme: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }
}

#[async_trait]
impl<S: EncodingScheme> SimilarityIndex<S> for MemorySimilarityIndex<S> {
    async fn store(
        &self,
        owner_id: &str,
        timestamp: DateTime<Utc>,
        vector: Vec<f32>,
        metadata: S::Metadata,
    ) -> Result<String, AnalysisError> {
        check_dimension::<S>(&vector)?;

        let id = Uuid::new_v4().to_string();
        self.vectors.insert(
            id.clone(),
            StoredVector {
                id: id.clone(),
                owner_id: owner_id.to_string(),
                timestamp,
                vector,
                metadata,
            },
        );

        Ok(id)
    }

    async fn query(
        &self,
        owner_id: &str,
        vector: &[f32],
        k: usize,
        include_others: bool,
    ) -> Result<Vec<SimilarityMatch<S::Metadata>>, AnalysisError> {
        check_dimension::<S>(vector)?;

        let mut results: Vec<_> = self
            .vectors
            .iter()
            .filter(|entry| include_others || entry.value().owner_id == owner_id)
            .map(|entry| {
                let stored = entry.value();
                SimilarityMatch {
                    id: stored.id.clone(),
                    owner_id: stored.owner_id.clone(),
                    similarity: cosine_similarity(vector, &stored.vector),
                    metadata: stored.metadata.clone(),
                    timestamp: stored.timestamp,
                }
            })
            .collect();

        results.sort_by(|a, b| {
            b.similarity
                .total_cmp(&a.similarity)
                .then_with(|| b.timestamp.cmp(&a.timestamp))
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(k);

        Ok(results)
    }

    async fn history(
        &self,
        owner_id: &str,
        limit: usize,
    ) -> Result<Vec<StoredVector<S::Metadata>>, AnalysisError> {
        let mut owned: Vec<_> = self
            .vectors
            .iter()
            .filter(|entry| entry.value().owner_id == owner_id)
            .map(|entry| entry.value().clone())
            .collect();

        owned.sort_by(|a, b| b.timestamp.cmp(&a.timestamp).then_with(|| a.id.cmp(&b.id)));
        owned.truncate(limit);

        Ok(owned)
    }

    async fn delete_all_for(&self, owner_id: &str) -> Result<usize, AnalysisError> {
        let mut removed = 0;
        self.vectors.retain(|_, stored| {
            let keep = stored.owner_id != owner_id;
            if !keep {
                removed += 1;
            }
            keep
        });
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::behavior::{BehaviorEncoder, BehaviorEvent, NotificationAction, NotificationCategory};
    use chrono::{Duration, TimeZone};

    fn at(minutes: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 8, 0, 0).unwrap() + Duration::minutes(minutes)
    }

    fn behavior_vector(hour: u32, action: NotificationAction) -> (Vec<f32>, BehaviorMetadata) {
        let mut event = BehaviorEvent::at(
            "user-1",
            "n-1",
            action,
            NotificationCategory::HealthCheck,
            at(0),
        );
        event.hour_of_day = hour;
        (BehaviorEncoder::new().encode(&event), event.metadata())
    }

    #[tokio::test]
    async fn test_query_orders_by_descending_similarity() {
        let index = MemorySimilarityIndex::<Behavioral>::new();

        let (exact, meta) = behavior_vector(9, NotificationAction::Opened);
        let (close, close_meta) = behavior_vector(10, NotificationAction::Opened);
        let (far, far_meta) = behavior_vector(22, NotificationAction::Ignored);

        index.store("user-1", at(1), far, far_meta).await.unwrap();
        index.store("user-1", at(2), close, close_meta).await.unwrap();
        let exact_id = index.store("user-1", at(3), exact.clone(), meta).await.unwrap();

        let results = index.query("user-1", &exact, 10, false).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].id, exact_id);
        assert!((results[0].similarity - 1.0).abs() < 1e-5);
        for pair in results.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[tokio::test]
    async fn test_query_respects_owner_scope_and_k() {
        let index = MemorySimilarityIndex::<Behavioral>::new();
        let (vector, meta) = behavior_vector(9, NotificationAction::Opened);

        index.store("user-1", at(0), vector.clone(), meta.clone()).await.unwrap();
        index.store("user-2", at(1), vector.clone(), meta.clone()).await.unwrap();
        index.store("user-2", at(2), vector.clone(), meta).await.unwrap();

        let own = index.query("user-1", &vector, 10, false).await.unwrap();
        assert_eq!(own.len(), 1);
        assert_eq!(own[0].owner_id, "user-1");

        let everyone = index.query("user-1", &vector, 2, true).await.unwrap();
        assert_eq!(everyone.len(), 2);
    }

    #[tokio::test]
    async fn test_mismatched_dimension_is_rejected() {
        let index = MemorySimilarityIndex::<Semantic>::new();
        let err = index
            .store("user-1", at(0), vec![0.1; BEHAVIOR_DIMENSION], InteractionMetadata::default())
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            AnalysisError::DimensionMismatch {
                scheme: "semantic",
                expected: SEMANTIC_DIMENSION,
                actual: BEHAVIOR_DIMENSION,
            }
        ));
        assert!(index.is_empty());

        let query_err = index.query("user-1", &[1.0, 0.0], 5, false).await.unwrap_err();
        assert!(query_err.is_invariant_violation());
    }

    #[tokio::test]
    async fn test_history_newest_first_and_delete() {
        let index = MemorySimilarityIndex::<Semantic>::new();
        let vector = vec![0.1; SEMANTIC_DIMENSION];

        for minute in [5, 1, 3] {
            let metadata = InteractionMetadata {
                mood_score: Some(minute as f64),
                ..Default::default()
            };
            index.store("user-1", at(minute), vector.clone(), metadata).await.unwrap();
        }
        index
            .store("user-2", at(0), vector.clone(), InteractionMetadata::default())
            .await
            .unwrap();

        let history = index.history("user-1", 2).await.unwrap();
        let moods: Vec<_> = history.iter().map(|h| h.metadata.mood_score).collect();
        assert_eq!(moods, vec![Some(5.0), Some(3.0)]);

        assert_eq!(index.delete_all_for("user-1").await.unwrap(), 3);
        assert_eq!(index.len(), 1);
        assert!(index.history("user-1", 10).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_delete_count_ignores_concurrent_stores() {
        let index = std::sync::Arc::new(MemorySimilarityIndex::<Behavioral>::new());
        let (vector, meta) = behavior_vector(9, NotificationAction::Opened);
        for i in 0..20 {
            index.store("user-1", at(i), vector.clone(), meta.clone()).await.unwrap();
        }

        let writer = {
            let index = index.clone();
            let (vector, meta) = (vector.clone(), meta.clone());
            tokio::spawn(async move {
                for i in 0..200 {
                    index.store("user-2", at(i), vector.clone(), meta.clone()).await.unwrap();
                }
            })
        };
        let removed = index.delete_all_for("user-1").await.unwrap();
        writer.await.unwrap();

        assert_eq!(removed, 20);
        assert_eq!(index.len(), 200);
    }
}
