//! Application configuration: TOML file loading, CLI overrides, and defaults.
//!
//! Resolution order (first found wins, values merge/override):
//! 1. CLI flags (`--token`, `--publish`, `--log-level`, etc.)
//! 2. Explicit `--config <file>`
//! 3. `$MIMNAV_CONFIG` environment variable (path to config file)
//! 4. Project-local `.mimnav.toml` in the current working directory
//! 5. Global `~/.config/mimnav/config.toml`
//! 6. Built-in defaults

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::nav::preload::Viewport;

// ── Section configs ──────────────────────────────────────────────────────────

/// Content server connection.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ServerConfig {
    /// Base URL, e.g. `http://localhost:8080`.
    pub url: Option<String>,
    /// Session token sent as the `MIMSRV_TOKEN` cookie.
    pub token: Option<String>,
    /// Per-request timeout.
    pub timeout_secs: Option<u64>,
}

/// Size images are requested at.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ViewerConfig {
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Look-ahead windows.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct PreloadConfig {
    /// Images fetched ahead after a direct selection.
    pub selection_window: Option<usize>,
    /// Images fetched ahead while stepping through files.
    pub navigation_window: Option<usize>,
    /// Concurrent warm-up requests.
    pub max_in_flight: Option<usize>,
}

/// Cross-tab channel names for the first tab.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ChannelsConfig {
    pub publish: Option<String>,
    pub subscribe: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct GeneralConfig {
    /// Path opened on startup.
    pub start_path: Option<String>,
    /// Enable mouse support.
    pub mouse: Option<bool>,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive, e.g. `info` or `mimnav=debug`.
    pub level: Option<String>,
    /// Directory for log files.
    pub dir: Option<String>,
}

// ── Top-level config ─────────────────────────────────────────────────────────

/// Top-level application configuration.
///
/// All fields are optional so that partial configs from different sources
/// can be merged together (CLI overrides file, file overrides defaults).
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub viewer: ViewerConfig,
    pub preload: PreloadConfig,
    pub channels: ChannelsConfig,
    pub general: GeneralConfig,
    pub log: LogConfig,
}

// ── Default constants ────────────────────────────────────────────────────────

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_VIEWER_WIDTH: u32 = 1024;
pub const DEFAULT_VIEWER_HEIGHT: u32 = 768;
pub const DEFAULT_SELECTION_WINDOW: usize = 1;
pub const DEFAULT_NAVIGATION_WINDOW: usize = 3;
pub const DEFAULT_MAX_IN_FLIGHT: usize = 4;
pub const DEFAULT_LOG_LEVEL: &str = "info";

// ── Config file locator ──────────────────────────────────────────────────────

/// Return the list of candidate config file paths in priority order.
///
/// Does NOT include the CLI `--config` path; that is handled separately.
fn candidate_paths() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Ok(env_path) = std::env::var("MIMNAV_CONFIG") {
        paths.push(PathBuf::from(env_path));
    }

    if let Ok(cwd) = std::env::current_dir() {
        paths.push(cwd.join(".mimnav.toml"));
    }

    if let Some(config_dir) = dirs::config_dir() {
        paths.push(config_dir.join("mimnav").join("config.toml"));
    }

    paths
}

/// Try to read and parse a TOML config file. Returns `None` if the file
/// doesn't exist or can't be parsed (with a warning printed to stderr).
///
/// Logging is not up yet when config loads, hence stderr.
fn load_file(path: &Path) -> Option<AppConfig> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => Some(cfg),
        Err(e) => {
            eprintln!(
                "Warning: failed to parse config file {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

// ── Merge logic ──────────────────────────────────────────────────────────────

impl AppConfig {
    /// Merge `other` on top of `self`; `other`'s `Some` values win.
    pub fn merge(self, other: &AppConfig) -> AppConfig {
        AppConfig {
            server: ServerConfig {
                url: other.server.url.clone().or(self.server.url),
                token: other.server.token.clone().or(self.server.token),
                timeout_secs: other.server.timeout_secs.or(self.server.timeout_secs),
            },
            viewer: ViewerConfig {
                width: other.viewer.width.or(self.viewer.width),
                height: other.viewer.height.or(self.viewer.height),
            },
            preload: PreloadConfig {
                selection_window: other
                    .preload
                    .selection_window
                    .or(self.preload.selection_window),
                navigation_window: other
                    .preload
                    .navigation_window
                    .or(self.preload.navigation_window),
                max_in_flight: other.preload.max_in_flight.or(self.preload.max_in_flight),
            },
            channels: ChannelsConfig {
                publish: other.channels.publish.clone().or(self.channels.publish),
                subscribe: other.channels.subscribe.clone().or(self.channels.subscribe),
            },
            general: GeneralConfig {
                start_path: other
                    .general
                    .start_path
                    .clone()
                    .or(self.general.start_path),
                mouse: other.general.mouse.or(self.general.mouse),
            },
            log: LogConfig {
                level: other.log.level.clone().or(self.log.level),
                dir: other.log.dir.clone().or(self.log.dir),
            },
        }
    }

    /// Load the final merged configuration.
    ///
    /// `cli_config_path` is an explicit config file path from `--config`.
    /// `cli_overrides` are partial overrides derived from CLI flags.
    pub fn load(cli_config_path: Option<&Path>, cli_overrides: Option<&AppConfig>) -> AppConfig {
        let mut config = AppConfig::default();

        // Walk in reverse so that highest-priority (env var) overwrites lower.
        for path in candidate_paths().iter().rev() {
            if let Some(file_cfg) = load_file(path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(cli_path) = cli_config_path {
            if let Some(file_cfg) = load_file(cli_path) {
                config = config.merge(&file_cfg);
            }
        }

        if let Some(overrides) = cli_overrides {
            config = config.merge(overrides);
        }

        config
    }

    // ── Convenience getters with built-in defaults ──────────────────────────

    pub fn server_url(&self) -> &str {
        self.server.url.as_deref().unwrap_or(DEFAULT_SERVER_URL)
    }

    pub fn token(&self) -> Option<&str> {
        self.server.token.as_deref().filter(|t| !t.is_empty())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.server.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS))
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.viewer.width.unwrap_or(DEFAULT_VIEWER_WIDTH),
            height: self.viewer.height.unwrap_or(DEFAULT_VIEWER_HEIGHT),
        }
    }

    pub fn selection_window(&self) -> usize {
        self.preload
            .selection_window
            .unwrap_or(DEFAULT_SELECTION_WINDOW)
    }

    pub fn navigation_window(&self) -> usize {
        self.preload
            .navigation_window
            .unwrap_or(DEFAULT_NAVIGATION_WINDOW)
    }

    /// At least one warm-up request is always allowed.
    pub fn max_in_flight(&self) -> usize {
        self.preload
            .max_in_flight
            .unwrap_or(DEFAULT_MAX_IN_FLIGHT)
            .max(1)
    }

    pub fn start_path(&self) -> Option<&str> {
        self.general.start_path.as_deref()
    }

    /// Whether mouse support is enabled.
    pub fn mouse_enabled(&self) -> bool {
        self.general.mouse.unwrap_or(true)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Log directory, falling back to the platform cache dir.
    pub fn log_dir(&self) -> PathBuf {
        match &self.log.dir {
            Some(dir) => PathBuf::from(dir),
            None => dirs::cache_dir()
                .unwrap_or_else(std::env::temp_dir)
                .join("mimnav"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
