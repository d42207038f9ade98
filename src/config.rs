//! Configuration file parser for ~/.config/feedmark/config.toml.
//!
//! The config file is optional; a missing file yields `Config::default()`.
//! Unknown keys are ignored by serde, though we log a warning when the file
//! contains potential typos.
//!
//! The poll interval is deliberately not here: it lives in the settings
//! table so it can be changed while the poller runs (see [`parse_interval`]).
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Poll interval used when the stored setting is missing or unusable.
pub const DEFAULT_INTERVAL_SECS: u64 = 300;

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    /// Config file exceeds maximum allowed size.
    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
///
/// All fields use `#[serde(default)]` so any subset of keys can be specified.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// SQLite database holding feeds, watermarks and settings.
    /// `None` means `feedmark.db` next to the config file.
    pub database_path: Option<PathBuf>,

    /// Whole-request timeout in seconds. 0 = no timeout.
    pub request_timeout_secs: u64,

    /// Connection timeout in seconds.
    pub connect_timeout_secs: u64,

    /// Largest feed document accepted, in bytes.
    pub max_feed_size: usize,

    /// User-Agent header sent with every request.
    pub user_agent: String,

    /// Fire one tick as soon as the poller starts.
    pub poll_on_start: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            request_timeout_secs: 30,
            connect_timeout_secs: 10,
            max_feed_size: 10 * 1024 * 1024,
            user_agent: concat!("feedmark/", env!("CARGO_PKG_VERSION")).to_string(),
            poll_on_start: true,
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 6] = [
        "database_path",
        "request_timeout_secs",
        "connect_timeout_secs",
        "max_feed_size",
        "user_agent",
        "poll_on_start",
    ];

    /// Load the config file at `path`.
    ///
    /// A missing or blank file yields [`Config::default()`]. Unknown keys
    /// are logged and ignored so an older binary can read a newer file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let Some(content) = Self::read_source(path)? else {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            return Ok(Self::default());
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Blank config file, using defaults");
            return Ok(Self::default());
        }

        warn_unknown_keys(&content);
        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// File contents, or `None` when there is no file. Oversized files are
    /// rejected before they are read.
    fn read_source(path: &Path) -> Result<Option<String>, ConfigError> {
        let not_found = |e: &std::io::Error| e.kind() == std::io::ErrorKind::NotFound;

        let len = match std::fs::metadata(path) {
            Ok(meta) => meta.len(),
            Err(e) if not_found(&e) => return Ok(None),
            Err(e) => return Err(ConfigError::Io(e)),
        };
        if len > Self::MAX_FILE_SIZE {
            return Err(ConfigError::TooLarge(format!(
                "{} is {len} bytes, limit is {}",
                path.display(),
                Self::MAX_FILE_SIZE
            )));
        }

        match std::fs::read_to_string(path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if not_found(&e) => Ok(None),
            Err(e) => Err(ConfigError::Io(e)),
        }
    }

    /// Database location, defaulting to `feedmark.db` inside `config_dir`.
    pub fn database_path_in(&self, config_dir: &Path) -> PathBuf {
        self.database_path
            .clone()
            .unwrap_or_else(|| config_dir.join("feedmark.db"))
    }
}

fn warn_unknown_keys(content: &str) {
    let Ok(table) = content.parse::<toml::Table>() else {
        return;
    };
    for key in table.keys().filter(|k| !Config::KNOWN_KEYS.contains(&k.as_str())) {
        tracing::warn!(key = %key, "Ignoring unknown config key");
    }
}

/// Interpret a stored interval setting.
///
/// Anything other than a positive whole number of seconds falls back to
/// [`DEFAULT_INTERVAL_SECS`].
pub fn parse_interval(raw: &str) -> Duration {
    match raw.trim().parse::<u64>() {
        Ok(secs) if secs > 0 => Duration::from_secs(secs),
        _ => {
            tracing::warn!(
                value = %raw,
                fallback_secs = DEFAULT_INTERVAL_SECS,
                "Invalid poll interval, using default"
            );
            Duration::from_secs(DEFAULT_INTERVAL_SECS)
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
