use std::str::FromStr;

use anyhow::{Result, anyhow};
use tracing::Level;
use tracing_subscriber::fmt::Subscriber;

fn log_level_from(value: Option<&str>) -> Level {
    value
        .ok_or_else(|| anyhow!("LOG_LEVEL environment variable is not set"))
        .and_then(|l| Level::from_str(l).map_err(|e| anyhow!("Invalid log level: {}", e)))
        .unwrap_or(Level::INFO)
}

/// Installs the global subscriber. Logs go to stderr so command output on
/// stdout stays clean.
pub fn init_tracing() -> Result<()> {
    let log_level = log_level_from(std::env::var("LOG_LEVEL").ok().as_deref());

    let subscriber = Subscriber::builder()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| anyhow!("failed to set subscriber: {}", e))
}
