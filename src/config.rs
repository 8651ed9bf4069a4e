//! Settings loading.
//!
//! Loading flow:
//! 1. Start from [`Config::default()`]
//! 2. If `config.json` exists in the data directory, its fields override the defaults
//! 3. Environment variables override both
//!
//! Invalid environment values are ignored. A refresh interval outside
//! 1..=3600 seconds from the file falls back to the default.

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, warn};

pub const CONFIG_FILE: &str = "config.json";

const REFRESH_SECS_RANGE: std::ops::RangeInclusive<u64> = 1..=3600;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    /// How often the task lists are re-partitioned against the clock.
    pub refresh_interval_secs: u64,
    /// End time given to tasks created without one.
    pub default_end_time: String,
    /// `tracing` filter directive, overridden by `RUST_LOG`.
    pub log_filter: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            refresh_interval_secs: 30,
            default_end_time: "23:59".to_string(),
            log_filter: "info".to_string(),
        }
    }
}

impl Config {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn config_path(&self) -> PathBuf {
        self.data_dir.join(CONFIG_FILE)
    }
}

pub fn default_data_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".medsync")
}

/// Loads settings for `data_dir` (or the default directory) and applies
/// environment overrides. An explicit `config_file` wins over the one in the
/// data directory.
pub fn load(data_dir: Option<&Path>, config_file: Option<&Path>) -> Result<Config> {
    load_with_env(data_dir, config_file, |key| std::env::var(key).ok())
}

fn load_with_env(
    data_dir: Option<&Path>,
    config_file: Option<&Path>,
    env: impl Fn(&str) -> Option<String>,
) -> Result<Config> {
    let dir = data_dir
        .map(Path::to_path_buf)
        .or_else(|| env("MEDSYNC_DATA_DIR").map(PathBuf::from))
        .unwrap_or_else(default_data_dir);
    let path = config_file
        .map(Path::to_path_buf)
        .unwrap_or_else(|| dir.join(CONFIG_FILE));

    let mut config = if path.exists() {
        debug!(?path, "loading config");
        let content = std::fs::read_to_string(&path)?;
        serde_json::from_str::<Config>(&content)?
    } else {
        debug!(?path, "config not found, using defaults");
        Config::default()
    };
    // The directory the user pointed at wins over whatever the file says.
    if data_dir.is_some() || config_file.is_none() {
        config.data_dir = dir;
    }
    if !REFRESH_SECS_RANGE.contains(&config.refresh_interval_secs) {
        warn!(
            secs = config.refresh_interval_secs,
            "refresh interval out of range, using default"
        );
        config.refresh_interval_secs = Config::default().refresh_interval_secs;
    }

    if let Some(secs) = env("MEDSYNC_REFRESH_SECS")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .filter(|secs| REFRESH_SECS_RANGE.contains(secs))
    {
        config.refresh_interval_secs = secs;
    }
    if let Some(filter) = env("MEDSYNC_LOG").filter(|v| !v.trim().is_empty()) {
        config.log_filter = filter;
    }
    Ok(config)
}
