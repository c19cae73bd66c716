//! Configuration loading for `rss-config.toml`.
//!
//! The TOML file describes what to poll and when. Secrets and the target chat
//! come from the environment, and the runtime switches from CLI flags; both are
//! handed in as [`RuntimeOptions`]. [`Settings::resolve`] merges the two and
//! validates everything up front so a bad deployment fails at startup, not at
//! the first scheduled cycle.
use chrono::NaiveTime;
use chrono_tz::Tz;
use secrecy::SecretString;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

use crate::feed::MOCK_PREFIX;
use crate::schedule::{ScheduleConfig, MAX_INTERVAL_HOURS};

pub const DEFAULT_CONFIG_PATH: &str = "rss-config.toml";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),

    #[error("Invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },

    #[error("Missing required setting `{0}`")]
    Missing(&'static str),
}

fn invalid(key: &'static str, reason: impl Into<String>) -> ConfigError {
    ConfigError::Invalid {
        key,
        reason: reason.into(),
    }
}

// ============================================================================
// File Configuration
// ============================================================================

/// Raw contents of the TOML file.
///
/// Every key has a default so partial files deserialize; required keys are
/// enforced later by [`Settings::resolve`].
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    /// Base URL of the RSSHub instance, e.g. `https://rsshub.app`.
    pub rss_hub_url: Option<String>,

    /// Feed paths relative to `rss_hub_url`, or absolute URLs.
    pub feed_paths: Vec<String>,

    /// Poll interval in hours. Zero or negative disables periodic polling.
    pub check_interval: f64,

    /// Wall-clock start time, `HH:MM`, in `timezone`.
    pub start_time: Option<String>,

    /// IANA time zone name.
    pub timezone: String,

    /// Only the newest N items of each fetch are considered.
    pub max_items_per_feed: Option<usize>,

    /// Directory holding fixture feeds for `/mock/` identifiers.
    pub fixture_dir: PathBuf,

    /// Feed polled instead of `feed_paths` when mock data is enabled.
    pub mock_feed: String,

    pub telegram_api_base: String,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            rss_hub_url: None,
            feed_paths: Vec::new(),
            check_interval: 1.0,
            start_time: None,
            timezone: "Asia/Shanghai".to_string(),
            max_items_per_feed: None,
            fixture_dir: PathBuf::from("mock"),
            mock_feed: "/mock/36kr_newsflashes_rss.xml".to_string(),
            telegram_api_base: "https://api.telegram.org".to_string(),
        }
    }
}

impl FileConfig {
    /// Maximum config file size (1 MB).
    const MAX_FILE_SIZE: u64 = 1_048_576;

    const KNOWN_KEYS: [&'static str; 9] = [
        "rss_hub_url",
        "feed_paths",
        "check_interval",
        "start_time",
        "timezone",
        "max_items_per_feed",
        "fixture_dir",
        "mock_feed",
        "telegram_api_base",
    ];

    /// Load the TOML file.
    ///
    /// - Missing file → `Err(ConfigError::NotFound)`
    /// - Larger than 1 MB → `Err(ConfigError::TooLarge)`
    /// - Invalid TOML → `Err(ConfigError::Parse)` with line number info
    /// - Unknown keys → accepted, logged as warning
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
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ConfigError::NotFound(path.to_path_buf()));
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        if let Ok(raw) = content.parse::<toml::Table>() {
            for key in raw.keys() {
                if !Self::KNOWN_KEYS.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        Ok(toml::from_str(content)?)
    }
}

// ============================================================================
// Runtime Options
// ============================================================================

/// Values that come from the environment and command line rather than the file.
#[derive(Debug, Clone, Default)]
pub struct RuntimeOptions {
    pub chat_id: Option<String>,
    pub bot_token: Option<SecretString>,
    /// Deliver every item on every cycle.
    pub debug_mode: bool,
    /// Poll `mock_feed` from the fixture directory instead of `feed_paths`.
    pub use_mock_data: bool,
    /// Log messages instead of sending them to Telegram.
    pub simulate_bot_only: bool,
    /// Skip the startup cycle in immediate mode.
    pub skip_initial_check: bool,
}

// ============================================================================
// Validated Settings
// ============================================================================

/// Fully validated configuration, fixed for the life of the process.
#[derive(Clone)]
pub struct Settings {
    /// Base URL without a trailing slash.
    pub rss_hub_url: String,
    /// The feeds each cycle polls, in order.
    pub feeds: Vec<String>,
    pub schedule: ScheduleConfig,
    pub max_items_per_feed: Option<usize>,
    pub fixture_dir: PathBuf,
    pub telegram_api_base: String,
    pub chat_id: String,
    /// Absent only when simulating.
    pub bot_token: Option<SecretString>,
    pub debug_mode: bool,
    pub use_mock_data: bool,
    pub simulate_bot_only: bool,
    pub skip_initial_check: bool,
}

impl std::fmt::Debug for Settings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Settings")
            .field("rss_hub_url", &self.rss_hub_url)
            .field("feeds", &self.feeds)
            .field("schedule", &self.schedule)
            .field("max_items_per_feed", &self.max_items_per_feed)
            .field("fixture_dir", &self.fixture_dir)
            .field("telegram_api_base", &self.telegram_api_base)
            .field("chat_id", &self.chat_id)
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[REDACTED]"))
            .field("debug_mode", &self.debug_mode)
            .field("use_mock_data", &self.use_mock_data)
            .field("simulate_bot_only", &self.simulate_bot_only)
            .field("skip_initial_check", &self.skip_initial_check)
            .finish()
    }
}

impl Settings {
    /// Load the file at `path` and merge it with `options`.
    pub fn load(path: &Path, options: RuntimeOptions) -> Result<Self, ConfigError> {
        let file = FileConfig::load(path)?;
        let settings = Self::resolve(file, options)?;
        tracing::info!(
            path = %path.display(),
            feeds = settings.feeds.len(),
            interval_hours = settings.schedule.interval_hours,
            timezone = %settings.schedule.timezone,
            "Loaded configuration"
        );
        Ok(settings)
    }

    pub fn resolve(file: FileConfig, options: RuntimeOptions) -> Result<Self, ConfigError> {
        let rss_hub_url = validate_base_url(
            "rss_hub_url",
            file.rss_hub_url.as_deref().ok_or(ConfigError::Missing("rss_hub_url"))?,
        )?;
        let telegram_api_base = validate_base_url("telegram_api_base", &file.telegram_api_base)?;

        let feed_paths: Vec<String> = file
            .feed_paths
            .iter()
            .map(|p| p.trim().to_string())
            .collect();
        if feed_paths.is_empty() {
            return Err(invalid("feed_paths", "at least one feed is required"));
        }
        if feed_paths.iter().any(String::is_empty) {
            return Err(invalid("feed_paths", "entries must not be blank"));
        }

        let feeds = if options.use_mock_data {
            if !file.mock_feed.starts_with(MOCK_PREFIX) {
                return Err(invalid(
                    "mock_feed",
                    format!("must start with `{MOCK_PREFIX}`"),
                ));
            }
            vec![file.mock_feed.clone()]
        } else {
            feed_paths
        };

        if !file.check_interval.is_finite() {
            return Err(invalid("check_interval", "must be a finite number of hours"));
        }
        if file.check_interval > MAX_INTERVAL_HOURS {
            return Err(invalid(
                "check_interval",
                format!("must be at most {MAX_INTERVAL_HOURS} hours"),
            ));
        }

        let start_time = file
            .start_time
            .as_deref()
            .map(|s| {
                NaiveTime::parse_from_str(s.trim(), "%H:%M")
                    .map_err(|_| invalid("start_time", format!("`{s}` is not HH:MM")))
            })
            .transpose()?;

        let timezone: Tz = file
            .timezone
            .parse()
            .map_err(|_| invalid("timezone", format!("unknown time zone `{}`", file.timezone)))?;

        if file.max_items_per_feed == Some(0) {
            return Err(invalid("max_items_per_feed", "must be at least 1"));
        }

        let chat_id = options
            .chat_id
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .ok_or(ConfigError::Missing("CHAT_ID"))?;

        if options.bot_token.is_none() && !options.simulate_bot_only {
            return Err(ConfigError::Missing("TELEGRAM_BOT_TOKEN"));
        }

        Ok(Self {
            rss_hub_url,
            feeds,
            schedule: ScheduleConfig {
                interval_hours: file.check_interval,
                start_time,
                timezone,
            },
            max_items_per_feed: file.max_items_per_feed,
            fixture_dir: file.fixture_dir,
            telegram_api_base,
            chat_id,
            bot_token: options.bot_token,
            debug_mode: options.debug_mode,
            use_mock_data: options.use_mock_data,
            simulate_bot_only: options.simulate_bot_only,
            skip_initial_check: options.skip_initial_check,
        })
    }
}

fn validate_base_url(key: &'static str, raw: &str) -> Result<String, ConfigError> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).map_err(|e| invalid(key, format!("`{raw}`: {e}")))?;
    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(invalid(key, format!("`{raw}` must use http or https")));
    }
    if url.host_str().is_none() {
        return Err(invalid(key, format!("`{raw}` has no host")));
    }
    Ok(trimmed.to_string())
}

// ============================================================================
// Tests
// ============================================================================
