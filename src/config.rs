//! # Configuration Module
//!
//! Runtime configuration loaded from the environment (and `.env`), with
//! defaults for everything except the bot token.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

// Constants for bot configuration
pub const DEFAULT_DATABASE_URL: &str = "sqlite://bot_database.db";
pub const DEFAULT_PHOTOS_DIR: &str = "saved_photos";
pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
pub const DEFAULT_SELECTION_TTL_SECS: u64 = 600; // 10 minutes
pub const DEFAULT_PRUNE_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_MUSIC_SEARCH_RESULTS: usize = 5;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/115.0 Safari/537.36";

/// Media-fetch tool settings
#[derive(Debug, Clone)]
pub struct MediaConfig {
    /// Path or name of the yt-dlp executable
    pub ytdlp_path: String,
    /// Optional cookies file passed to every invocation
    pub cookies_file: Option<PathBuf>,
    /// User agent used for TikTok requests
    pub user_agent: String,
    /// Number of options presented for a music search
    pub search_results: usize,
    /// Timeout for a single yt-dlp invocation in seconds
    pub operation_timeout_secs: u64,
    /// Maximum number of retries on transient network failures
    pub max_retries: u32,
    /// Base delay between retries in milliseconds
    pub base_retry_delay_ms: u64,
    /// Maximum delay between retries in milliseconds
    pub max_retry_delay_ms: u64,
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            ytdlp_path: DEFAULT_YTDLP_PATH.to_string(),
            cookies_file: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            search_results: DEFAULT_MUSIC_SEARCH_RESULTS,
            operation_timeout_secs: 300, // 5 minutes
            max_retries: 2,
            base_retry_delay_ms: 1000, // 1 second
            max_retry_delay_ms: 8000,  // 8 seconds
        }
    }
}

impl MediaConfig {
    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }
}

/// Per-user storage limits
#[derive(Debug, Clone)]
pub struct LimitsConfig {
    pub max_quotes_per_user: i64,
    pub max_photos_per_user: i64,
    pub max_music_per_user: i64,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            max_quotes_per_user: 100,
            max_photos_per_user: 50,
            max_music_per_user: 30,
        }
    }
}

/// Top-level bot configuration
#[derive(Debug, Clone)]
pub struct BotConfig {
    pub bot_token: String,
    pub database_url: String,
    pub photos_dir: PathBuf,
    pub selection_ttl_secs: u64,
    pub prune_interval_secs: u64,
    pub json_logs: bool,
    pub media: MediaConfig,
    pub limits: LimitsConfig,
}

impl BotConfig {
    /// Build a configuration with defaults around the given token
    pub fn with_token(bot_token: impl Into<String>) -> Self {
        Self {
            bot_token: bot_token.into(),
            database_url: DEFAULT_DATABASE_URL.to_string(),
            photos_dir: PathBuf::from(DEFAULT_PHOTOS_DIR),
            selection_ttl_secs: DEFAULT_SELECTION_TTL_SECS,
            prune_interval_secs: DEFAULT_PRUNE_INTERVAL_SECS,
            json_logs: false,
            media: MediaConfig::default(),
            limits: LimitsConfig::default(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// `BOT_TOKEN` is required (`TELEGRAM_BOT_TOKEN` is accepted as well);
    /// every other variable falls back to its default.
    pub fn from_env() -> Result<Self> {
        let bot_token = env::var("BOT_TOKEN")
            .or_else(|_| env::var("TELEGRAM_BOT_TOKEN"))
            .context("BOT_TOKEN must be set")?;

        let mut config = Self::with_token(bot_token);

        if let Ok(url) = env::var("DATABASE_URL") {
            config.database_url = url;
        }
        if let Ok(dir) = env::var("PHOTOS_DIR") {
            config.photos_dir = PathBuf::from(dir);
        }
        config.selection_ttl_secs = parse_var("SELECTION_TTL_SECS", config.selection_ttl_secs)?;
        config.prune_interval_secs =
            parse_var("SELECTION_PRUNE_INTERVAL_SECS", config.prune_interval_secs)?;
        config.json_logs = env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));

        if let Ok(path) = env::var("YTDLP_PATH") {
            config.media.ytdlp_path = path;
        }
        config.media.cookies_file = env::var("YTDLP_COOKIES_FILE").ok().map(PathBuf::from);
        config.media.operation_timeout_secs =
            parse_var("MEDIA_TIMEOUT_SECS", config.media.operation_timeout_secs)?;
        config.media.max_retries = parse_var("MEDIA_MAX_RETRIES", config.media.max_retries)?;
        config.media.search_results =
            parse_var("MUSIC_SEARCH_RESULTS", config.media.search_results)?;

        Ok(config)
    }

    pub fn selection_ttl(&self) -> Duration {
        Duration::from_secs(self.selection_ttl_secs)
    }

    pub fn prune_interval(&self) -> Duration {
        Duration::from_secs(self.prune_interval_secs.max(1))
    }
}

fn parse_var<T>(name: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .with_context(|| format!("Invalid value for {name}: {raw}")),
        Err(_) => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_reasonable() {
        let config = BotConfig::with_token("token");

        assert_eq!(config.selection_ttl(), Duration::from_secs(600));
        assert!(config.prune_interval() <= config.selection_ttl());
        assert_eq!(config.media.search_results, 5);
        assert!(config.media.max_retries <= 5);
        assert!(config.media.base_retry_delay_ms <= config.media.max_retry_delay_ms);
        assert!(config.media.operation_timeout() > Duration::ZERO);
        assert_eq!(config.limits.max_quotes_per_user, 100);
        assert_eq!(config.limits.max_photos_per_user, 50);
        assert_eq!(config.limits.max_music_per_user, 30);
    }

    #[test]
    fn test_parse_var_fallback_and_error() {
        assert_eq!(parse_var("PORORO_TEST_UNSET_VAR", 7u64).unwrap(), 7);

        env::set_var("PORORO_TEST_BAD_VAR", "not-a-number");
        assert!(parse_var("PORORO_TEST_BAD_VAR", 7u64).is_err());

        env::set_var("PORORO_TEST_GOOD_VAR", " 42 ");
        assert_eq!(parse_var("PORORO_TEST_GOOD_VAR", 7u64).unwrap(), 42);
    }
}
