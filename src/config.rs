// Copyright (c) 2025 Soumyadip Sarkar.
// All rights reserved.
//
// This source code is licensed under the license found in the
// LICENSE file in the root directory of this source tree.

//! Runtime settings, read from the environment:
//! - `BUDGIT_DB` - database file. Defaults to the platform data directory.
//! - `BUDGIT_TICK_INTERVAL_SECS` - scheduler interval. Defaults to `3600`.
//! - `BUDGIT_MAX_CATCH_UP` - occurrences one rule may replay per run. Defaults to `10000`.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_TICK_INTERVAL_SECS: u64 = 3600;
pub const DEFAULT_MAX_CATCH_UP: usize = 10_000;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Explicit database path; `None` means the platform data directory.
    pub db_path: Option<PathBuf>,
    pub tick_interval: Duration,
    pub max_catch_up: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: None,
            tick_interval: Duration::from_secs(DEFAULT_TICK_INTERVAL_SECS),
            max_catch_up: DEFAULT_MAX_CATCH_UP,
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let db_path = lookup("BUDGIT_DB")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .map(PathBuf::from);

        let tick_secs = positive(&lookup, "BUDGIT_TICK_INTERVAL_SECS", DEFAULT_TICK_INTERVAL_SECS)?;
        let max_catch_up = positive(&lookup, "BUDGIT_MAX_CATCH_UP", DEFAULT_MAX_CATCH_UP as u64)?;

        Ok(Self {
            db_path,
            tick_interval: Duration::from_secs(tick_secs),
            max_catch_up: max_catch_up as usize,
        })
    }
}

fn positive<F>(lookup: &F, key: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(key) else {
        return Ok(default);
    };
    let value: u64 = raw
        .trim()
        .parse()
        .map_err(|e| ConfigError::InvalidValue(key.to_string(), format!("{}", e)))?;
    if value == 0 {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be greater than zero".to_string(),
        ));
    }
    Ok(value)
}
