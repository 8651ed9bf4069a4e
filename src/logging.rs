use crate::config::Config;
use std::{fs::OpenOptions, path::PathBuf, sync::Mutex};
use tracing_subscriber::EnvFilter;

pub const LOG_FILE: &str = "medsync.log";

/// Sends `tracing` output to `medsync.log` in the data directory; the
/// terminal belongs to the TUI. `RUST_LOG` takes precedence over the
/// configured filter.
pub fn init(config: &Config) -> std::io::Result<PathBuf> {
    std::fs::create_dir_all(&config.data_dir)?;
    let path = config.data_dir.join(LOG_FILE);
    let file = OpenOptions::new().create(true).append(true).open(&path)?;

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    // A second init (tests, embedding) keeps the first subscriber.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(Mutex::new(file))
        .with_ansi(false)
        .try_init();
    Ok(path)
}
