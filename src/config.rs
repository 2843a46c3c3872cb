use std::{env, fmt::Display, str::FromStr};

use anyhow::{anyhow, Context};
use tracing::{info, warn};

use crate::counter::CounterStrategy;
use crate::leaderboard::DEFAULT_LIMIT;

pub struct Config {
    pub database_url: Option<String>,
    pub max_connections: u32,
    pub leaderboard_limit: usize,
    pub counter_strategy: CounterStrategy,
}

impl Config {
    pub fn load() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            max_connections: try_load(&lookup, "DATABASE_MAX_CONNECTIONS", "5")?,
            leaderboard_limit: try_load(&lookup, "LEADERBOARD_LIMIT", &DEFAULT_LIMIT.to_string())?,
            counter_strategy: try_load(&lookup, "COUNTER_STRATEGY", "atomic")?,
        })
    }

    pub fn database_url(&self) -> anyhow::Result<&str> {
        self.database_url
            .as_deref()
            .context("DATABASE_URL must be set to a production Postgres instance")
    }
}

fn try_load<T, F>(lookup: &F, key: &str, default: &str) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    let value = lookup(key).unwrap_or_else(|| {
        info!("{key} not set, using default: {default}");
        default.to_string()
    });

    value.trim().parse().map_err(|e| {
        warn!("Invalid {key} value: {e}");
        anyhow!("invalid {key} value `{value}`: {e}")
    })
}
