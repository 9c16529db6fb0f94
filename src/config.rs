//! Configuration and settings management
//!
//! Loads settings from config files and environment variables and defines
//! the defaults used by the download pipeline.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default scratch root for downloads
pub const DEFAULT_SCRATCH_DIR: &str = "downloads";
/// Default bind address for the health endpoint
pub const DEFAULT_HEALTH_ADDR: &str = "0.0.0.0:8080";
/// Default yt-dlp binary
pub const DEFAULT_YTDLP_PATH: &str = "yt-dlp";
/// Default ffmpeg binary
pub const DEFAULT_FFMPEG_PATH: &str = "ffmpeg";
/// Default yt-dlp format selector. Instagram mostly serves progressive mp4.
pub const DEFAULT_YTDLP_FORMAT: &str = "best[ext=mp4]/bestvideo[ext=mp4]+bestaudio[ext=m4a]/best";
/// Fetch step timeout in seconds
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 120;
/// Transcode step timeout in seconds
pub const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 120;
/// Idle lifetime of a pending session (1 hour)
pub const DEFAULT_SESSION_TTL_SECS: u64 = 3600;
/// Maximum number of pending sessions kept in memory
pub const DEFAULT_SESSION_MAX_CAPACITY: u64 = 10_000;
/// Bot API upload limit for bots (50 MiB)
pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 50 * 1024 * 1024;

/// Application settings loaded from environment variables
#[derive(Debug, Deserialize, Clone)]
pub struct Settings {
    /// Telegram Bot API token
    #[serde(default)]
    pub telegram_token: String,

    /// Root directory under which per-request scratch scopes are created
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,

    /// Bind address of the health endpoint
    #[serde(default = "default_health_addr")]
    pub health_addr: String,

    /// Path to the yt-dlp binary
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: String,
    /// Path to the ffmpeg binary
    #[serde(default = "default_ffmpeg_path")]
    pub ffmpeg_path: String,
    /// Format selector passed to yt-dlp `-f`
    #[serde(default = "default_ytdlp_format")]
    pub ytdlp_format: String,
    /// Optional Netscape cookies file for Instagram sessions
    pub cookies_file: Option<PathBuf>,

    /// Timeout of the fetch step
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    /// Timeout of the transcode step
    #[serde(default = "default_transcode_timeout_secs")]
    pub transcode_timeout_secs: u64,

    /// Idle lifetime of a pending session
    #[serde(default = "default_session_ttl_secs")]
    pub session_ttl_secs: u64,
    /// Maximum number of pending sessions
    #[serde(default = "default_session_max_capacity")]
    pub session_max_capacity: u64,

    /// Largest file the bot will try to upload
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SCRATCH_DIR)
}

fn default_health_addr() -> String {
    DEFAULT_HEALTH_ADDR.to_string()
}

fn default_ytdlp_path() -> String {
    DEFAULT_YTDLP_PATH.to_string()
}

fn default_ffmpeg_path() -> String {
    DEFAULT_FFMPEG_PATH.to_string()
}

fn default_ytdlp_format() -> String {
    DEFAULT_YTDLP_FORMAT.to_string()
}

const fn default_fetch_timeout_secs() -> u64 {
    DEFAULT_FETCH_TIMEOUT_SECS
}

const fn default_transcode_timeout_secs() -> u64 {
    DEFAULT_TRANSCODE_TIMEOUT_SECS
}

const fn default_session_ttl_secs() -> u64 {
    DEFAULT_SESSION_TTL_SECS
}

const fn default_session_max_capacity() -> u64 {
    DEFAULT_SESSION_MAX_CAPACITY
}

const fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            telegram_token: String::new(),
            scratch_dir: default_scratch_dir(),
            health_addr: default_health_addr(),
            ytdlp_path: default_ytdlp_path(),
            ffmpeg_path: default_ffmpeg_path(),
            ytdlp_format: default_ytdlp_format(),
            cookies_file: None,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            transcode_timeout_secs: DEFAULT_TRANSCODE_TIMEOUT_SECS,
            session_ttl_secs: DEFAULT_SESSION_TTL_SECS,
            session_max_capacity: DEFAULT_SESSION_MAX_CAPACITY,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
        }
    }
}

impl Settings {
    /// Create new settings by loading from environment and files
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use reelgrab::config::Settings;
    ///
    /// let settings = Settings::new().expect("Failed to load configuration");
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails or the bot token is missing.
    pub fn new() -> Result<Self, ConfigError> {
        let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
            // Local overrides, not checked into git
            .add_source(File::with_name("config/local").required(false))
            // Eg.. `APP__FETCH_TIMEOUT_SECS=60 ./target/reelgrab`
            .add_source(Environment::with_prefix("APP").separator("__"))
            // Plain env vars; UPPER_SNAKE_CASE maps to snake_case, empty means unset
            .add_source(Environment::default().ignore_empty(true))
            .build()?;

        let mut settings: Self = s.try_deserialize()?;

        // Older deployments export the token as BOT_TOKEN
        if settings.telegram_token.is_empty() {
            if let Ok(val) = std::env::var("BOT_TOKEN") {
                if !val.is_empty() {
                    settings.telegram_token = val;
                }
            }
        }

        settings.validate()?;
        Ok(settings)
    }

    /// Checks the invariants that cannot be expressed through serde defaults.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` when the token is missing or the health address
    /// does not parse.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.telegram_token.trim().is_empty() {
            return Err(ConfigError::NotFound(
                "telegram_token (set TELEGRAM_TOKEN or BOT_TOKEN)".to_string(),
            ));
        }
        self.health_socket_addr()?;
        Ok(())
    }

    /// Parsed bind address of the health endpoint
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if `health_addr` is not a socket address.
    pub fn health_socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.health_addr.parse().map_err(|e| {
            ConfigError::Message(format!("invalid health_addr '{}': {e}", self.health_addr))
        })
    }

    /// Fetch step timeout
    #[must_use]
    pub const fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    /// Transcode step timeout
    #[must_use]
    pub const fn transcode_timeout(&self) -> Duration {
        Duration::from_secs(self.transcode_timeout_secs)
    }

    /// Idle lifetime of pending sessions
    #[must_use]
    pub const fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_ttl_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    // Env vars are process-wide; keep every env mutation in this one test
    #[test]
    fn test_config_env_loading() -> Result<(), Box<dyn std::error::Error>> {
        // 1. Standard loading with defaults
        env::set_var("TELEGRAM_TOKEN", "dummy_token");
        env::remove_var("BOT_TOKEN");

        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "dummy_token");
        assert_eq!(settings.scratch_dir, PathBuf::from(DEFAULT_SCRATCH_DIR));
        assert_eq!(settings.fetch_timeout_secs, DEFAULT_FETCH_TIMEOUT_SECS);

        // 2. Overrides from plain env vars
        env::set_var("FETCH_TIMEOUT_SECS", "30");
        env::set_var("SCRATCH_DIR", "/tmp/reels");
        let settings = Settings::new()?;
        assert_eq!(settings.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(settings.scratch_dir, PathBuf::from("/tmp/reels"));
        env::remove_var("FETCH_TIMEOUT_SECS");
        env::remove_var("SCRATCH_DIR");
        env::remove_var("TELEGRAM_TOKEN");

        // 3. BOT_TOKEN fallback
        env::set_var("BOT_TOKEN", "legacy_token");
        let settings = Settings::new()?;
        assert_eq!(settings.telegram_token, "legacy_token");
        env::remove_var("BOT_TOKEN");

        // 4. Missing token is fatal
        assert!(Settings::new().is_err());
        Ok(())
    }

    #[test]
    fn test_validate_rejects_bad_health_addr() {
        let settings = Settings {
            telegram_token: "dummy".to_string(),
            health_addr: "not-an-address".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());

        let settings = Settings {
            telegram_token: "dummy".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_ok());
        assert_eq!(
            settings.health_socket_addr().map(|a| a.port()).ok(),
            Some(8080)
        );
    }
}
