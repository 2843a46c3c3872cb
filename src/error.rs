use std::collections::BTreeMap;
use std::fmt;

use thiserror::Error;

use crate::models::Dimension;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{collection} document {key} does not exist")]
    NotFound {
        collection: &'static str,
        key: String,
    },

    #[error("corrupt {collection} document {key}: {reason}")]
    Corrupt {
        collection: &'static str,
        key: String,
        reason: String,
    },

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Field {
    Name,
    Phone,
    Email,
    University,
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Field::Name => "name",
            Field::Phone => "phone",
            Field::Email => "email",
            Field::University => "university",
        };
        f.write_str(name)
    }
}

/// Per-field validation failures. Never reaches the network.
#[derive(Error, Debug, Clone, Default, PartialEq, Eq)]
#[error("invalid submission: {}", joined(.errors))]
pub struct FieldErrors {
    errors: BTreeMap<Field, &'static str>,
}

impl FieldErrors {
    pub fn insert(&mut self, field: Field, message: &'static str) {
        self.errors.insert(field, message);
    }

    #[cfg(test)]
    pub fn get(&self, field: Field) -> Option<&'static str> {
        self.errors.get(&field).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Field, &'static str)> + '_ {
        self.errors.iter().map(|(field, message)| (*field, *message))
    }
}

fn joined(errors: &BTreeMap<Field, &'static str>) -> String {
    errors
        .iter()
        .map(|(field, message)| format!("{field}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub const WRITE_FALLBACK_MESSAGE: &str = "Failed to submit. Please try again later.";

#[derive(Error, Debug)]
#[error("{message}")]
pub struct WriteError {
    pub message: String,
    #[source]
    pub source: StoreError,
}

impl From<StoreError> for WriteError {
    fn from(source: StoreError) -> Self {
        let message = match &source {
            StoreError::Unavailable(reason) if reason.trim().is_empty() => {
                WRITE_FALLBACK_MESSAGE.to_string()
            }
            other => other.to_string(),
        };
        Self { message, source }
    }
}

#[derive(Error, Debug)]
#[error("{dimension} counter {key} was not updated: {source}")]
pub struct CounterError {
    pub dimension: Dimension,
    pub key: String,
    #[source]
    pub source: StoreError,
}

#[derive(Error, Debug)]
#[error("Failed to load {dimension} chart data: {source}")]
pub struct ReadError {
    pub dimension: Dimension,
    #[source]
    pub source: StoreError,
}

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error(transparent)]
    Invalid(#[from] FieldErrors),

    #[error(transparent)]
    Write(#[from] WriteError),
}
