//! Runtime configuration.
//!
//! Layered with figment, later sources winning:
//! 1. built-in defaults
//! 2. TOML file (`--config PATH`, or `tunefetch.toml` when present)
//! 3. `TUNEFETCH_*` environment variables
//! 4. the plain variables older deployments already set: `YTDL_BIN`,
//!    `PORT`, `WEBHOOK_URL`, `BOT_API_URL`
//!
//! The bot token is kept out of this struct; see [`bot_token`].

use crate::conversion::audio::AudioCodec;
use crate::core::retry::RetryConfig;
use crate::download::gate::{OversizePolicy, TELEGRAM_UPLOAD_LIMIT_BYTES};
use crate::download::pipeline::PipelineSettings;
use crate::download::resolver::ResolverSettings;
use crate::download::worker::WorkerSettings;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use url::Url;

/// Config file picked up from the working directory when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "tunefetch.toml";

/// Prefix for environment overrides (`TUNEFETCH_MAX_UPLOAD_BYTES=...`).
pub const ENV_PREFIX: &str = "TUNEFETCH_";

const LEGACY_ENV_KEYS: [&str; 4] = ["YTDL_BIN", "PORT", "WEBHOOK_URL", "BOT_API_URL"];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    MissingFile(PathBuf),

    #[error("failed to load configuration: {0}")]
    Load(#[from] Box<figment::Error>),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// yt-dlp executable
    pub ytdl_bin: String,
    /// ffmpeg executable, used by yt-dlp and for re-encoding
    pub ffmpeg_bin: String,
    /// Netscape cookies file handed to yt-dlp
    pub cookies_file: Option<String>,
    /// Parent of the per-request scratch directories (`~` is expanded)
    pub scratch_root: String,

    pub search_results: usize,
    pub duration_ceiling_secs: u64,
    pub reject_overlong: bool,

    pub audio_bitrate_kbps: u32,
    pub fetch_timeout_secs: u64,
    pub search_timeout_secs: u64,
    pub max_concurrent_jobs: usize,
    /// Total fetch attempts, first one included
    pub fetch_attempts: u32,
    pub retry_initial_delay_ms: u64,

    pub max_upload_bytes: u64,
    pub oversize_policy: OversizePolicy,
    /// Per-request timeout of the Telegram HTTP client
    pub upload_timeout_secs: u64,

    /// Local Bot API server, e.g. `http://localhost:8081`
    pub bot_api_url: Option<String>,
    /// Public URL Telegram should post updates to (webhook mode)
    pub webhook_url: Option<String>,
    pub port: u16,

    pub log_level: String,
    pub log_file: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ytdl_bin: "yt-dlp".to_string(),
            ffmpeg_bin: "ffmpeg".to_string(),
            cookies_file: None,
            scratch_root: std::env::temp_dir().join("tunefetch").to_string_lossy().into_owned(),
            search_results: 5,
            duration_ceiling_secs: 1200,
            reject_overlong: false,
            audio_bitrate_kbps: 192,
            fetch_timeout_secs: 150,
            search_timeout_secs: 30,
            max_concurrent_jobs: 5,
            fetch_attempts: 3,
            retry_initial_delay_ms: 1000,
            max_upload_bytes: TELEGRAM_UPLOAD_LIMIT_BYTES,
            oversize_policy: OversizePolicy::Reject,
            upload_timeout_secs: 300,
            bot_api_url: None,
            webhook_url: None,
            port: 5000,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl Config {
    /// Loads and validates the configuration.
    ///
    /// An explicit `path` must exist; the default file is optional.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let file = match path {
            Some(p) if !p.exists() => return Err(ConfigError::MissingFile(p.to_path_buf())),
            Some(p) => p.to_path_buf(),
            None => PathBuf::from(DEFAULT_CONFIG_FILE),
        };
        Self::from_figment(Self::figment(&file))
    }

    /// The full provider stack for `file`, before extraction.
    pub fn figment(file: &Path) -> Figment {
        Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(file))
            .merge(Env::prefixed(ENV_PREFIX))
            .merge(Env::raw().only(&LEGACY_ENV_KEYS))
    }

    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Config = figment.extract().map_err(Box::new)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let positive = [
            ("max_concurrent_jobs", self.max_concurrent_jobs as u64),
            ("fetch_attempts", u64::from(self.fetch_attempts)),
            ("audio_bitrate_kbps", u64::from(self.audio_bitrate_kbps)),
            ("max_upload_bytes", self.max_upload_bytes),
            ("search_results", self.search_results as u64),
            ("duration_ceiling_secs", self.duration_ceiling_secs),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("search_timeout_secs", self.search_timeout_secs),
            ("upload_timeout_secs", self.upload_timeout_secs),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::Invalid(format!("{} must be greater than zero", name)));
        }

        for (name, value) in [("webhook_url", &self.webhook_url), ("bot_api_url", &self.bot_api_url)] {
            if let Some(raw) = value {
                Url::parse(raw).map_err(|e| ConfigError::Invalid(format!("{} '{}': {}", name, raw, e)))?;
            }
        }

        if self.scratch_root.trim().is_empty() {
            return Err(ConfigError::Invalid("scratch_root must not be empty".to_string()));
        }
        Ok(())
    }

    pub fn scratch_root_path(&self) -> PathBuf {
        PathBuf::from(shellexpand::tilde(&self.scratch_root).into_owned())
    }

    pub fn cookies_path(&self) -> Option<PathBuf> {
        self.cookies_file
            .as_deref()
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| PathBuf::from(shellexpand::tilde(p).into_owned()))
    }

    /// The cookies file, only if it is actually there to hand to yt-dlp.
    pub fn existing_cookies_path(&self) -> Option<PathBuf> {
        self.cookies_path().filter(|p| p.exists())
    }

    pub fn upload_timeout(&self) -> Duration {
        Duration::from_secs(self.upload_timeout_secs)
    }

    /// Typed settings for [`crate::download::Pipeline::new`].
    pub fn pipeline_settings(&self) -> PipelineSettings {
        let retry = RetryConfig::with_attempts(self.fetch_attempts)
            .initial_delay(Duration::from_millis(self.retry_initial_delay_ms));

        PipelineSettings {
            scratch_root: self.scratch_root_path(),
            resolver: ResolverSettings {
                search_results: self.search_results,
                duration_ceiling_secs: self.duration_ceiling_secs,
                reject_overlong: self.reject_overlong,
                search_timeout: Duration::from_secs(self.search_timeout_secs),
                retry: retry.clone(),
            },
            worker: WorkerSettings {
                codec: AudioCodec::Mp3,
                bitrate_kbps: self.audio_bitrate_kbps,
                fetch_timeout: Duration::from_secs(self.fetch_timeout_secs),
                retry,
            },
            max_concurrent_jobs: self.max_concurrent_jobs,
            max_upload_bytes: self.max_upload_bytes,
            oversize_policy: self.oversize_policy,
        }
    }
}

/// Bot token from `BOT_TOKEN`, falling back to `TELOXIDE_TOKEN`.
pub fn bot_token() -> Option<SecretString> {
    ["BOT_TOKEN", "TELOXIDE_TOKEN"]
        .iter()
        .filter_map(|key| std::env::var(key).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
        .map(SecretString::from)
}
