use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tokio::task::JoinSet;
use tracing::info;

use crate::counter::{bump_counter, CounterStrategy};
use crate::models::{CounterLabels, Dimension};
use crate::store::{DocumentStore, MemoryStore};

pub const RACE_KEY: &str = "+263";

#[derive(Debug, Clone)]
pub struct SimulationReport {
    pub strategy: CounterStrategy,
    pub clients: usize,
    pub final_counts: Vec<u64>,
}

impl SimulationReport {
    pub fn lost_updates(&self) -> u64 {
        self.final_counts
            .iter()
            .map(|count| (self.clients as u64).saturating_sub(*count))
            .sum()
    }

    pub fn undercounted_trials(&self) -> usize {
        self.final_counts
            .iter()
            .filter(|count| **count < self.clients as u64)
            .count()
    }
}

/// One trial: `clients` concurrent bumps of [`RACE_KEY`] on a fresh store.
/// Returns the final stored count.
pub async fn race_new_key(
    strategy: CounterStrategy,
    clients: usize,
    latency: Option<Duration>,
) -> anyhow::Result<u64> {
    let store = Arc::new(match latency {
        Some(latency) => MemoryStore::with_latency(latency),
        None => MemoryStore::default(),
    });
    let labels = CounterLabels {
        label: Some("Zimbabwe".to_string()),
        short_label: None,
    };

    let mut clients_set = JoinSet::new();
    for _ in 0..clients {
        let store = Arc::clone(&store);
        let labels = labels.clone();
        clients_set.spawn(async move {
            bump_counter(store.as_ref(), strategy, Dimension::Country, RACE_KEY, &labels).await
        });
    }

    while let Some(joined) = clients_set.join_next().await {
        joined.context("simulated client panicked")??;
    }

    let count = store
        .get_counter(Dimension::Country, RACE_KEY)
        .await?
        .map(|document| document.count)
        .unwrap_or(0);

    Ok(count)
}

pub async fn run(
    strategy: CounterStrategy,
    clients: usize,
    trials: usize,
    latency: Option<Duration>,
) -> anyhow::Result<SimulationReport> {
    let mut final_counts = Vec::with_capacity(trials);
    for trial in 0..trials {
        let count = race_new_key(strategy, clients, latency).await?;
        info!(?strategy, trial, clients, count, "simulation trial finished");
        final_counts.push(count);
    }

    Ok(SimulationReport {
        strategy,
        clients,
        final_counts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLIENTS: usize = 25;
    const TRIALS: usize = 5;

    #[tokio::test]
    async fn naive_strategy_loses_updates_on_a_fresh_key() {
        let report = run(CounterStrategy::Naive, CLIENTS, TRIALS, None)
            .await
            .unwrap();

        assert!(report.undercounted_trials() >= 1, "{report:?}");
        assert!(report.lost_updates() > 0);
        assert!(report.final_counts.iter().all(|count| *count >= 1));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn naive_strategy_loses_updates_with_latency() {
        let report = run(
            CounterStrategy::Naive,
            CLIENTS,
            TRIALS,
            Some(Duration::from_millis(5)),
        )
        .await
        .unwrap();

        assert!(report.undercounted_trials() >= 1, "{report:?}");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn atomic_strategy_counts_every_client() {
        let report = run(CounterStrategy::Atomic, CLIENTS, TRIALS * 2, None)
            .await
            .unwrap();

        assert!(report
            .final_counts
            .iter()
            .all(|count| *count == CLIENTS as u64), "{report:?}");
        assert_eq!(report.lost_updates(), 0);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn atomic_strategy_counts_every_client_with_latency() {
        let report = run(
            CounterStrategy::Atomic,
            CLIENTS,
            TRIALS,
            Some(Duration::from_millis(2)),
        )
        .await
        .unwrap();

        assert_eq!(report.undercounted_trials(), 0, "{report:?}");
    }

    #[test]
    fn report_arithmetic() {
        let report = SimulationReport {
            strategy: CounterStrategy::Naive,
            clients: 10,
            final_counts: vec![10, 1, 7],
        };
        assert_eq!(report.lost_updates(), 12);
        assert_eq!(report.undercounted_trials(), 2);
    }
}
