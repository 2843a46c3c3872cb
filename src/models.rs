use std::fmt;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, clap::ValueEnum)]
pub enum Dimension {
    Country,
    University,
}

impl Dimension {
    /// Name of the collection holding this dimension's counter documents.
    pub fn collection(self) -> &'static str {
        match self {
            Dimension::Country => "valentine_chart",
            Dimension::University => "university_cache",
        }
    }
}

impl fmt::Display for Dimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dimension::Country => f.write_str("country"),
            Dimension::University => f.write_str("university"),
        }
    }
}

/// Raw form input as typed by the visitor.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SubmissionForm {
    pub name: String,
    pub country_code: String,
    pub phone: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub university: Option<String>,
}

/// A validated, normalized submission ready to be appended to `valentines`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRecord {
    pub name: String,
    pub phone: String,
    pub country_code: String,
    pub email: Option<String>,
    pub university: Option<String>,
}

/// Display labels denormalized onto a counter document when it is first created.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CounterLabels {
    pub label: Option<String>,
    pub short_label: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterDocument {
    pub key: String,
    pub label: Option<String>,
    pub short_label: Option<String>,
    pub count: u64,
}

impl CounterDocument {
    pub fn first(key: &str, labels: &CounterLabels) -> Self {
        Self {
            key: key.to_string(),
            label: labels.label.clone(),
            short_label: labels.short_label.clone(),
            count: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    pub key: String,
    pub label: String,
    pub short_label: Option<String>,
    pub count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Leaderboard {
    Ranked(Vec<LeaderboardEntry>),
    Empty,
}

impl Leaderboard {
    pub fn entries(&self) -> &[LeaderboardEntry] {
        match self {
            Leaderboard::Ranked(entries) => entries,
            Leaderboard::Empty => &[],
        }
    }
}
