use rand::seq::SliceRandom;
use tracing::{debug, info};

use crate::counter::{bump_best_effort, CounterStrategy};
use crate::error::{SubmitError, WriteError};
use crate::lookup::Directories;
use crate::models::{Dimension, SubmissionForm, SubmissionRecord};
use crate::store::DocumentStore;
use crate::validation::{validate_form, EmailPolicy};

pub const SUCCESS_MESSAGES: [&str; 5] = [
    "Your Valentine's surprise is on the way!",
    "Love is coming your way!",
    "Cupid has been notified!",
    "Something special is headed to you!",
    "Get ready for your Valentine's treat!",
];

pub fn success_message() -> &'static str {
    SUCCESS_MESSAGES
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(SUCCESS_MESSAGES[0])
}

/// Appends one record to the submissions log. No retry on failure.
pub async fn submit<S: DocumentStore + ?Sized>(
    store: &S,
    record: &SubmissionRecord,
) -> Result<(), WriteError> {
    let id = store.append_submission(record).await?;
    info!(
        %id,
        country_code = %record.country_code,
        university = record.university.as_deref().unwrap_or("-"),
        "submission recorded"
    );
    Ok(())
}

#[derive(Debug, Clone)]
pub struct SubmitOutcome {
    pub record: SubmissionRecord,
    pub message: &'static str,
}

/// Validate, write, then bump the per-dimension counters.
pub struct Pipeline<'a, S: ?Sized> {
    store: &'a S,
    directories: &'a Directories,
    strategy: CounterStrategy,
    email_policy: EmailPolicy,
}

impl<'a, S: DocumentStore + ?Sized> Pipeline<'a, S> {
    pub fn new(store: &'a S, directories: &'a Directories) -> Self {
        Self {
            store,
            directories,
            strategy: CounterStrategy::default(),
            email_policy: EmailPolicy::default(),
        }
    }

    pub fn with_strategy(mut self, strategy: CounterStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_email_policy(mut self, email_policy: EmailPolicy) -> Self {
        self.email_policy = email_policy;
        self
    }

    pub async fn submit_form(&self, form: &SubmissionForm) -> Result<SubmitOutcome, SubmitError> {
        let record = validate_form(form, self.email_policy, &self.directories.universities)?;

        submit(self.store, &record).await?;
        self.bump_counters(&record).await;

        Ok(SubmitOutcome {
            record,
            message: success_message(),
        })
    }

    /// Country always, university only when one was selected. The two touch
    /// different collections and run concurrently.
    async fn bump_counters(&self, record: &SubmissionRecord) {
        if !self.directories.countries.contains(&record.country_code) {
            debug!(
                country_code = %record.country_code,
                "country code not in lookup table, label falls back to the code"
            );
        }

        let country = async {
            let labels = self
                .directories
                .resolver(Dimension::Country)
                .labels(&record.country_code);
            bump_best_effort(
                self.store,
                self.strategy,
                Dimension::Country,
                &record.country_code,
                &labels,
            )
            .await;
        };

        let university = async {
            if let Some(key) = &record.university {
                let labels = self.directories.resolver(Dimension::University).labels(key);
                bump_best_effort(self.store, self.strategy, Dimension::University, key, &labels)
                    .await;
            }
        };

        tokio::join!(country, university);
    }
}
