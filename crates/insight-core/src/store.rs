//! Insight persistence
//!
//! Provides the persistence collaborator contract and an in-memory store:
//! - All-or-nothing commit of a run's records
//! - Sequential identifier assignment
//! - Lookup by id, by originating metric, and newest-first listing

use crate::error::PersistenceError;
use crate::types::{BatchId, BatchRef, InsightRecord, MetricId};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier assigned by a store
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct InsightId(pub u64);

impl fmt::Display for InsightId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Record as persisted
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredInsight {
    /// Assigned identifier
    pub id: InsightId,
    /// Originating batch
    pub batch_id: BatchId,
    /// Insight content
    pub record: InsightRecord,
    /// Commit time
    pub created_at: DateTime<Utc>,
}

/// Persistence collaborator
#[async_trait]
pub trait InsightStore: Send + Sync {
    /// Store a run's records; either all are stored or none
    async fn store(
        &self,
        batch: &BatchRef,
        records: &[InsightRecord],
    ) -> Result<Vec<StoredInsight>, PersistenceError>;
}

/// In-memory insight store
#[derive(Debug)]
pub struct InMemoryInsightStore {
    /// Stored insights
    insights: DashMap<InsightId, StoredInsight>,
    /// Metric ids of each committed batch
    batches: DashMap<BatchId, Vec<MetricId>>,
    /// Next identifier
    next_id: AtomicU64,
}

impl InMemoryInsightStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            insights: DashMap::new(),
            batches: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Get by id
    #[must_use]
    pub fn get(&self, id: InsightId) -> Option<StoredInsight> {
        self.insights.get(&id).map(|entry| entry.value().clone())
    }

    /// All insights, newest first
    #[must_use]
    pub fn list(&self) -> Vec<StoredInsight> {
        let mut all: Vec<StoredInsight> = self
            .insights
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        all
    }

    /// Insights derived from batches containing `metric_id`, newest first
    #[must_use]
    pub fn for_metric(&self, metric_id: MetricId) -> Vec<StoredInsight> {
        self.list()
            .into_iter()
            .filter(|insight| {
                self.batches
                    .get(&insight.batch_id)
                    .is_some_and(|ids| ids.contains(&metric_id))
            })
            .collect()
    }

    /// Delete by id; returns the removed insight
    pub fn delete(&self, id: InsightId) -> Option<StoredInsight> {
        self.insights.remove(&id).map(|(_, insight)| insight)
    }

    /// Number of stored insights
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.insights.len()
    }

    /// Check if empty
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.insights.is_empty()
    }
}

impl Default for InMemoryInsightStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InsightStore for InMemoryInsightStore {
    async fn store(
        &self,
        batch: &BatchRef,
        records: &[InsightRecord],
    ) -> Result<Vec<StoredInsight>, PersistenceError> {
        match self.batches.entry(batch.batch_id) {
            Entry::Occupied(_) => {
                return Err(PersistenceError::Conflict(format!(
                    "batch {} already committed",
                    batch.batch_id
                )));
            }
            Entry::Vacant(slot) => {
                slot.insert(batch.metric_ids.clone());
            }
        }

        let created_at = Utc::now();
        let first = self
            .next_id
            .fetch_add(records.len() as u64, Ordering::SeqCst);
        let stored: Vec<StoredInsight> = records
            .iter()
            .zip(first..)
            .map(|(record, id)| StoredInsight {
                id: InsightId(id),
                batch_id: batch.batch_id,
                record: record.clone(),
                created_at,
            })
            .collect();

        for insight in &stored {
            self.insights.insert(insight.id, insight.clone());
        }

        tracing::debug!(
            batch = %batch.batch_id,
            stored = stored.len(),
            "committed insights"
        );
        Ok(stored)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Confidence, InsightType};

    fn record(text: &str) -> InsightRecord {
        InsightRecord {
            text: text.to_string(),
            kind: InsightType::Observation,
            confidence: Confidence::from_points(60),
        }
    }

    fn batch(metric_ids: Vec<MetricId>) -> BatchRef {
        BatchRef {
            batch_id: BatchId::new(),
            metric_ids,
        }
    }

    #[tokio::test]
    async fn assigns_sequential_ids() {
        let store = InMemoryInsightStore::new();
        let stored = store
            .store(&batch(vec![1]), &[record("a"), record("b")])
            .await
            .unwrap();
        assert_eq!(stored[0].id, InsightId(1));
        assert_eq!(stored[1].id, InsightId(2));

        let more = store.store(&batch(vec![2]), &[record("c")]).await.unwrap();
        assert_eq!(more[0].id, InsightId(3));
        assert_eq!(store.len(), 3);
    }

    #[tokio::test]
    async fn duplicate_batch_is_a_conflict_and_stores_nothing() {
        let store = InMemoryInsightStore::new();
        let reference = batch(vec![1]);
        store.store(&reference, &[record("a")]).await.unwrap();

        let err = store
            .store(&reference, &[record("b"), record("c")])
            .await
            .unwrap_err();
        assert!(matches!(err, PersistenceError::Conflict(_)));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn lookup_by_metric_and_delete() {
        let store = InMemoryInsightStore::new();
        store
            .store(&batch(vec![1, 2]), &[record("for 1 and 2")])
            .await
            .unwrap();
        let stored = store
            .store(&batch(vec![3]), &[record("for 3")])
            .await
            .unwrap();

        assert_eq!(store.for_metric(2).len(), 1);
        assert_eq!(store.for_metric(3)[0].record.text, "for 3");
        assert!(store.for_metric(99).is_empty());

        let removed = store.delete(stored[0].id).unwrap();
        assert_eq!(removed.record.text, "for 3");
        assert!(store.get(stored[0].id).is_none());
        assert!(store.for_metric(3).is_empty());
    }

    #[tokio::test]
    async fn list_is_newest_first() {
        let store = InMemoryInsightStore::new();
        store.store(&batch(vec![1]), &[record("old")]).await.unwrap();
        store.store(&batch(vec![1]), &[record("new")]).await.unwrap();

        let all = store.list();
        assert_eq!(all[0].record.text, "new");
        assert_eq!(all[1].record.text, "old");
    }
}
