//! File logging. The terminal belongs to the UI, so everything goes to a
//! daily rolling file under the configured log directory.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{AppError, Result};

pub const LOG_FILE_PREFIX: &str = "mimnav.log";

/// Build the filter: `RUST_LOG` when set, otherwise `level`.
fn build_filter(env: Option<&str>, level: &str) -> Result<EnvFilter> {
    let directive = env.filter(|s| !s.trim().is_empty()).unwrap_or(level);
    EnvFilter::try_new(directive)
        .map_err(|e| AppError::Config(format!("bad log filter {:?}: {}", directive, e)))
}

/// Install the global subscriber. Keep the returned guard alive until exit
/// or buffered lines are lost.
pub fn init(dir: &Path, level: &str) -> Result<WorkerGuard> {
    std::fs::create_dir_all(dir)?;

    let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let env = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(env.as_deref(), level)?;

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .map_err(|e| AppError::Config(format!("logging already initialized: {}", e)))?;

    tracing::info!(dir = %dir.display(), "logging initialized");
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_wins_over_config_level() {
        let filter = build_filter(Some("mimnav=trace"), "warn").unwrap();
        assert_eq!(filter.to_string(), "mimnav=trace");
    }

    #[test]
    fn blank_env_falls_back_to_level() {
        let filter = build_filter(Some("  "), "debug").unwrap();
        assert_eq!(filter.to_string(), "debug");
        let filter = build_filter(None, "info").unwrap();
        assert_eq!(filter.to_string(), "info");
    }

    #[test]
    fn invalid_level_is_config_error() {
        let err = build_filter(None, "mimnav=[").unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
    }
}
