use tracing::{debug, error};

use crate::error::ReadError;
use crate::lookup::LabelResolver;
use crate::models::{CounterDocument, Dimension, Leaderboard, LeaderboardEntry};
use crate::store::DocumentStore;

pub const DEFAULT_LIMIT: usize = 20;

/// Reads the top `n` counters of one dimension. Zero counts are dropped, and
/// an empty result is [`Leaderboard::Empty`] rather than an error.
pub async fn top_n<S: DocumentStore + ?Sized>(
    store: &S,
    dimension: Dimension,
    n: usize,
    resolver: &dyn LabelResolver,
) -> Result<Leaderboard, ReadError> {
    let documents = store
        .top_counters(dimension, n)
        .await
        .map_err(|source| {
            error!(%dimension, error = %source, "leaderboard query failed");
            ReadError { dimension, source }
        })?;

    debug!(%dimension, fetched = documents.len(), "leaderboard fetched");

    let entries: Vec<LeaderboardEntry> = documents
        .into_iter()
        .filter(|document| document.count > 0)
        .take(n)
        .map(|document| to_entry(document, resolver))
        .collect();

    if entries.is_empty() {
        Ok(Leaderboard::Empty)
    } else {
        Ok(Leaderboard::Ranked(entries))
    }
}

fn to_entry(document: CounterDocument, resolver: &dyn LabelResolver) -> LeaderboardEntry {
    let stored = |value: Option<String>| value.filter(|value| !value.trim().is_empty());

    let label = stored(document.label).unwrap_or_else(|| resolver.fallback_label(&document.key));
    let short_label =
        stored(document.short_label).or_else(|| resolver.labels(&document.key).short_label);

    LeaderboardEntry {
        key: document.key,
        label,
        short_label,
        count: document.count,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;

    use super::*;
    use crate::error::StoreError;
    use crate::lookup::Directories;
    use crate::store::MemoryStore;

    async fn seed(store: &MemoryStore, dimension: Dimension, key: &str, label: Option<&str>, count: u64) {
        let document = CounterDocument {
            key: key.to_string(),
            label: label.map(str::to_string),
            short_label: None,
            count,
        };
        store.create_counter(dimension, &document).await.unwrap();
    }

    #[tokio::test]
    async fn empty_collection_is_the_no_data_state() {
        let store = MemoryStore::default();
        let directories = Directories::bundled().unwrap();

        let board = top_n(&store, Dimension::Country, DEFAULT_LIMIT, &directories.countries)
            .await
            .unwrap();
        assert_eq!(board, Leaderboard::Empty);
    }

    #[tokio::test]
    async fn zero_counts_are_filtered_out() {
        let store = MemoryStore::default();
        let directories = Directories::bundled().unwrap();
        seed(&store, Dimension::Country, "+1", None, 0).await;

        let board = top_n(&store, Dimension::Country, DEFAULT_LIMIT, &directories.countries)
            .await
            .unwrap();
        assert_eq!(board, Leaderboard::Empty);

        seed(&store, Dimension::Country, "+27", None, 2).await;
        let board = top_n(&store, Dimension::Country, DEFAULT_LIMIT, &directories.countries)
            .await
            .unwrap();
        let keys: Vec<&str> = board.entries().iter().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, ["+27"]);
    }

    #[tokio::test]
    async fn returns_at_most_n_sorted_descending() {
        let store = MemoryStore::default();
        let directories = Directories::bundled().unwrap();
        for index in 0..30u64 {
            seed(&store, Dimension::Country, &format!("+{}", 200 + index), None, index % 7 + 1).await;
        }

        let board = top_n(&store, Dimension::Country, DEFAULT_LIMIT, &directories.countries)
            .await
            .unwrap();
        let entries = board.entries();

        assert_eq!(entries.len(), DEFAULT_LIMIT);
        assert!(entries.windows(2).all(|pair| pair[0].count >= pair[1].count));
        assert_eq!(entries[0].count, 7);
    }

    #[tokio::test]
    async fn stored_label_wins_over_lookup() {
        let store = MemoryStore::default();
        let directories = Directories::bundled().unwrap();
        seed(&store, Dimension::Country, "+27", Some("Mzansi"), 3).await;
        seed(&store, Dimension::Country, "+44", None, 2).await;
        seed(&store, Dimension::Country, "+999", Some(""), 1).await;

        let board = top_n(&store, Dimension::Country, DEFAULT_LIMIT, &directories.countries)
            .await
            .unwrap();
        let labels: Vec<&str> = board.entries().iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, ["Mzansi", "United Kingdom", "+999"]);
    }

    #[tokio::test]
    async fn university_entries_fall_back_to_lookup_names() {
        let store = MemoryStore::default();
        let directories = Directories::bundled().unwrap();
        seed(&store, Dimension::University, "uct", None, 4).await;

        let board = top_n(
            &store,
            Dimension::University,
            DEFAULT_LIMIT,
            directories.resolver(Dimension::University),
        )
        .await
        .unwrap();

        let entry = &board.entries()[0];
        assert_eq!(entry.label, "University of Cape Town");
        assert_eq!(entry.short_label.as_deref(), Some("UCT"));
    }

    #[tokio::test]
    async fn query_failure_is_an_error_not_empty() {
        let store = MemoryStore::default();
        let directories = Directories::bundled().unwrap();
        store.fail_reads.store(true, Ordering::Relaxed);

        let err = top_n(&store, Dimension::Country, DEFAULT_LIMIT, &directories.countries)
            .await
            .unwrap_err();
        assert_eq!(err.dimension, Dimension::Country);
        assert!(matches!(err.source, StoreError::Unavailable(_)));
    }
}
