use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use crate::error::StoreError;
use crate::models::{CounterDocument, CounterLabels, Dimension, SubmissionRecord};

/// The remote document store. Every method is one network round trip.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    fn backend_tag(&self) -> &'static str;

    /// Appends to the submissions log under a freshly generated id.
    async fn append_submission(&self, record: &SubmissionRecord) -> Result<Uuid, StoreError>;

    async fn get_counter(
        &self,
        dimension: Dimension,
        key: &str,
    ) -> Result<Option<CounterDocument>, StoreError>;

    /// Atomic `count += 1` on an existing document. Fails with
    /// [`StoreError::NotFound`] if the document is missing.
    async fn increment_counter(&self, dimension: Dimension, key: &str) -> Result<(), StoreError>;

    /// Writes `document` as-is, replacing whatever is stored under its key.
    async fn create_counter(
        &self,
        dimension: Dimension,
        document: &CounterDocument,
    ) -> Result<(), StoreError>;

    /// Increments the document if present, else creates it with `count = 1`
    /// and `labels`, as a single atomic step. Labels of an existing document
    /// are left alone. Returns the new count.
    async fn upsert_increment(
        &self,
        dimension: Dimension,
        key: &str,
        labels: &CounterLabels,
    ) -> Result<u64, StoreError>;

    /// Top `limit` documents by count descending, ties by key.
    async fn top_counters(
        &self,
        dimension: Dimension,
        limit: usize,
    ) -> Result<Vec<CounterDocument>, StoreError>;
}

/// In-process store. Each call suspends once before touching state so that
/// concurrent callers interleave the way remote clients do.
#[derive(Default)]
pub struct MemoryStore {
    pub submissions: Mutex<Vec<(Uuid, SubmissionRecord)>>,
    pub counters: Mutex<HashMap<Dimension, HashMap<String, CounterDocument>>>,
    pub round_trips: AtomicU64,
    pub latency: Option<Duration>,
    pub fail_submissions: AtomicBool,
    pub fail_counters: AtomicBool,
    pub fail_reads: AtomicBool,
}

impl MemoryStore {
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency: Some(latency),
            ..Self::default()
        }
    }

    async fn round_trip(&self, flag: &AtomicBool, operation: &str) -> Result<(), StoreError> {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
        match self.latency {
            Some(latency) => tokio::time::sleep(latency).await,
            None => tokio::task::yield_now().await,
        }
        if flag.load(Ordering::Relaxed) {
            debug!(operation, "memory store injected failure");
            return Err(StoreError::Unavailable(format!("{operation} rejected")));
        }
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn backend_tag(&self) -> &'static str {
        "memory"
    }

    async fn append_submission(&self, record: &SubmissionRecord) -> Result<Uuid, StoreError> {
        self.round_trip(&self.fail_submissions, "append_submission")
            .await?;
        let id = Uuid::new_v4();
        self.submissions.lock().await.push((id, record.clone()));
        Ok(id)
    }

    async fn get_counter(
        &self,
        dimension: Dimension,
        key: &str,
    ) -> Result<Option<CounterDocument>, StoreError> {
        self.round_trip(&self.fail_counters, "get_counter").await?;
        Ok(self
            .counters
            .lock()
            .await
            .get(&dimension)
            .and_then(|documents| documents.get(key))
            .cloned())
    }

    async fn increment_counter(&self, dimension: Dimension, key: &str) -> Result<(), StoreError> {
        self.round_trip(&self.fail_counters, "increment_counter")
            .await?;
        let mut counters = self.counters.lock().await;
        match counters
            .get_mut(&dimension)
            .and_then(|documents| documents.get_mut(key))
        {
            Some(document) => {
                document.count += 1;
                Ok(())
            }
            None => Err(StoreError::NotFound {
                collection: dimension.collection(),
                key: key.to_string(),
            }),
        }
    }

    async fn create_counter(
        &self,
        dimension: Dimension,
        document: &CounterDocument,
    ) -> Result<(), StoreError> {
        self.round_trip(&self.fail_counters, "create_counter").await?;
        self.counters
            .lock()
            .await
            .entry(dimension)
            .or_default()
            .insert(document.key.clone(), document.clone());
        Ok(())
    }

    async fn upsert_increment(
        &self,
        dimension: Dimension,
        key: &str,
        labels: &CounterLabels,
    ) -> Result<u64, StoreError> {
        self.round_trip(&self.fail_counters, "upsert_increment")
            .await?;
        let mut counters = self.counters.lock().await;
        let document = counters
            .entry(dimension)
            .or_default()
            .entry(key.to_string())
            .and_modify(|document| document.count += 1)
            .or_insert_with(|| CounterDocument::first(key, labels));
        Ok(document.count)
    }

    async fn top_counters(
        &self,
        dimension: Dimension,
        limit: usize,
    ) -> Result<Vec<CounterDocument>, StoreError> {
        self.round_trip(&self.fail_reads, "top_counters").await?;
        let counters = self.counters.lock().await;
        let mut documents: Vec<CounterDocument> = counters
            .get(&dimension)
            .map(|documents| documents.values().cloned().collect())
            .unwrap_or_default();
        documents.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        documents.truncate(limit);
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn labels(label: &str) -> CounterLabels {
        CounterLabels {
            label: Some(label.to_string()),
            short_label: None,
        }
    }

    #[tokio::test]
    async fn upsert_creates_then_increments_without_touching_labels() {
        let store = MemoryStore::default();

        let first = store
            .upsert_increment(Dimension::Country, "+27", &labels("South Africa"))
            .await
            .unwrap();
        let second = store
            .upsert_increment(Dimension::Country, "+27", &labels("Renamed"))
            .await
            .unwrap();

        assert_eq!((first, second), (1, 2));
        let document = store
            .get_counter(Dimension::Country, "+27")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(document.label.as_deref(), Some("South Africa"));
    }

    #[tokio::test]
    async fn increment_of_missing_document_is_not_found() {
        let store = MemoryStore::default();
        let err = store
            .increment_counter(Dimension::University, "uct")
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { collection: "university_cache", .. }));
    }

    #[tokio::test]
    async fn dimensions_are_separate_collections() {
        let store = MemoryStore::default();
        store
            .upsert_increment(Dimension::Country, "uct", &CounterLabels::default())
            .await
            .unwrap();

        assert!(store
            .get_counter(Dimension::University, "uct")
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn top_counters_orders_by_count_then_key() {
        let store = MemoryStore::default();
        for (key, count) in [("+1", 3), ("+44", 5), ("+27", 3), ("+91", 1)] {
            let document = CounterDocument {
                key: key.to_string(),
                label: None,
                short_label: None,
                count,
            };
            store
                .create_counter(Dimension::Country, &document)
                .await
                .unwrap();
        }

        let top = store.top_counters(Dimension::Country, 3).await.unwrap();
        let keys: Vec<&str> = top.iter().map(|d| d.key.as_str()).collect();
        assert_eq!(keys, ["+44", "+1", "+27"]);
    }

    #[tokio::test]
    async fn injected_failures_surface_as_unavailable() {
        let store = MemoryStore::default();
        store.fail_reads.store(true, Ordering::Relaxed);

        let err = store
            .top_counters(Dimension::Country, 20)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Unavailable(_)));
        assert_eq!(store.round_trips.load(Ordering::Relaxed), 1);
    }
}
