//! Configuration file parser for `feedwatch.toml`.
//!
//! The config file is optional at load time (a missing file yields
//! `Config::default()`), but [`Config::validate`] rejects a config with no
//! feeds or no channel, so a bare default never reaches the poller.
//! Unknown top-level keys are ignored by serde and logged as a warning.
use secrecy::SecretString;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::util::validate_feed_url;

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

    /// Semantically invalid configuration (bad interval, duplicate feed, ...).
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// The bot token environment variable is unset or blank.
    #[error("{0} environment variable not set")]
    MissingToken(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Wire format of a feed body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    Json,
    Csv,
}

/// Where the previously seen identifiers of a feed are kept between cycles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotMode {
    /// Process lifetime only; the first cycle after start seeds the baseline.
    #[default]
    Memory,
    /// CSV file under `cache_dir`, survives restarts.
    File,
}

/// One polled endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct FeedSpec {
    /// Unique name, also used as the snapshot file stem.
    pub name: String,
    pub url: String,
    pub format: FeedFormat,
    /// JSON pointer to the record array (e.g. `/data/items`). Root when unset.
    #[serde(default)]
    pub records_pointer: Option<String>,
    pub id_field: String,
    #[serde(default)]
    pub title_field: Option<String>,
    #[serde(default)]
    pub text_fields: Vec<String>,
    #[serde(default)]
    pub snapshot: SnapshotMode,
    /// Message template with `{id}`, `{title}`, `{feed}` and `{<field>}` placeholders.
    #[serde(default)]
    pub template: Option<String>,
}

/// Top-level application configuration.
///
/// All top-level fields use `#[serde(default)]` so any subset of keys can be
/// specified. The bot token is not a config key: it is read from
/// the environment variable named by `token_env`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Channel that receives every notification.
    pub channel_id: u64,

    /// Polling interval in minutes (1..=55).
    pub interval_minutes: u64,

    /// Prefix for chat commands (`!ping`, `!hello`).
    pub command_prefix: String,

    /// Name of the environment variable holding the bot token.
    pub token_env: String,

    /// Directory for CSV snapshots. Required when any feed uses `snapshot = "file"`.
    pub cache_dir: Option<PathBuf>,

    /// Per-request HTTP timeout in seconds.
    pub request_timeout_secs: u64,

    /// Maximum messages per feed per cycle (0 = unlimited).
    pub max_notifications_per_cycle: usize,

    /// Allow feed URLs on localhost or private networks.
    pub allow_private_hosts: bool,

    pub feeds: Vec<FeedSpec>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_id: 0,
            interval_minutes: 5,
            command_prefix: "!".to_string(),
            token_env: "DISCORD_TOKEN".to_string(),
            cache_dir: None,
            request_timeout_secs: 30,
            max_notifications_per_cycle: 0,
            allow_private_hosts: false,
            feeds: Vec::new(),
        }
    }
}

impl Config {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    pub const MIN_INTERVAL_MINUTES: u64 = 1;
    pub const MAX_INTERVAL_MINUTES: u64 = 55;

    const KNOWN_KEYS: [&'static str; 9] = [
        "channel_id",
        "interval_minutes",
        "command_prefix",
        "token_env",
        "cache_dir",
        "request_timeout_secs",
        "max_notifications_per_cycle",
        "allow_private_hosts",
        "feeds",
    ];

    /// Load configuration from a TOML file.
    ///
    /// - Missing file → `Ok(Config::default())`
    /// - Empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → silently accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text, warning on unknown top-level keys.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(content)?;
        tracing::info!(
            feeds = config.feeds.len(),
            interval_minutes = config.interval_minutes,
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Check cross-field constraints the type system cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.channel_id == 0 {
            return Err(ConfigError::Invalid("channel_id must be set".into()));
        }
        if !(Self::MIN_INTERVAL_MINUTES..=Self::MAX_INTERVAL_MINUTES)
            .contains(&self.interval_minutes)
        {
            return Err(ConfigError::Invalid(format!(
                "interval_minutes must be between {} and {}, got {}",
                Self::MIN_INTERVAL_MINUTES,
                Self::MAX_INTERVAL_MINUTES,
                self.interval_minutes
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be positive".into(),
            ));
        }
        if self.command_prefix.trim().is_empty() {
            return Err(ConfigError::Invalid("command_prefix must not be empty".into()));
        }
        if self.feeds.is_empty() {
            return Err(ConfigError::Invalid("no feeds configured".into()));
        }

        let mut names = HashSet::new();
        for feed in &self.feeds {
            if !is_valid_feed_name(&feed.name) {
                return Err(ConfigError::Invalid(format!(
                    "feed name '{}' may only contain letters, digits, '-' and '_'",
                    feed.name
                )));
            }
            if !names.insert(feed.name.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "duplicate feed name '{}'",
                    feed.name
                )));
            }
            if feed.id_field.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "feed '{}': id_field must not be empty",
                    feed.name
                )));
            }
            if feed.records_pointer.is_some() && feed.format == FeedFormat::Csv {
                return Err(ConfigError::Invalid(format!(
                    "feed '{}': records_pointer only applies to json feeds",
                    feed.name
                )));
            }
            if feed.snapshot == SnapshotMode::File && self.cache_dir.is_none() {
                return Err(ConfigError::Invalid(format!(
                    "feed '{}': snapshot = \"file\" requires cache_dir",
                    feed.name
                )));
            }
            validate_feed_url(&feed.url, self.allow_private_hosts).map_err(|e| {
                ConfigError::Invalid(format!("feed '{}': {}", feed.name, e))
            })?;
        }

        Ok(())
    }

    /// Read the bot token from the environment variable named by `token_env`.
    pub fn bot_token(&self) -> Result<SecretString, ConfigError> {
        match std::env::var(&self.token_env) {
            Ok(token) if !token.trim().is_empty() => Ok(SecretString::from(token.trim().to_owned())),
            _ => Err(ConfigError::MissingToken(self.token_env.clone())),
        }
    }
}

fn is_valid_feed_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

// ============================================================================
// Tests
// ============================================================================
