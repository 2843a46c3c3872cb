use std::str::FromStr;

use tracing::{debug, warn};

use crate::error::CounterError;
use crate::models::{CounterDocument, CounterLabels, Dimension};
use crate::store::DocumentStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CounterStrategy {
    Naive,
    #[default]
    Atomic,
}

impl FromStr for CounterStrategy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "naive" => Ok(CounterStrategy::Naive),
            "atomic" => Ok(CounterStrategy::Atomic),
            other => Err(format!("unknown counter strategy `{other}` (expected naive or atomic)")),
        }
    }
}

pub async fn bump_counter<S: DocumentStore + ?Sized>(
    store: &S,
    strategy: CounterStrategy,
    dimension: Dimension,
    key: &str,
    labels: &CounterLabels,
) -> Result<(), CounterError> {
    let result = match strategy {
        CounterStrategy::Atomic => store
            .upsert_increment(dimension, key, labels)
            .await
            .map(|count| debug!(%dimension, key, count, "counter bumped")),
        CounterStrategy::Naive => match store.get_counter(dimension, key).await {
            Ok(Some(_)) => store.increment_counter(dimension, key).await,
            Ok(None) => {
                store
                    .create_counter(dimension, &CounterDocument::first(key, labels))
                    .await
            }
            Err(err) => Err(err),
        },
    };

    result.map_err(|source| CounterError {
        dimension,
        key: key.to_string(),
        source,
    })
}

/// Secondary effect of a successful submission: failures are logged and
/// dropped so they can never reach the caller.
pub async fn bump_best_effort<S: DocumentStore + ?Sized>(
    store: &S,
    strategy: CounterStrategy,
    dimension: Dimension,
    key: &str,
    labels: &CounterLabels,
) {
    if let Err(err) = bump_counter(store, strategy, dimension, key, labels).await {
        warn!(
            %dimension,
            key,
            backend = store.backend_tag(),
            error = %err,
            "counter update skipped"
        );
    }
}
