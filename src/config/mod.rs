//! Configuration system (layered: explicit > env > config file > defaults).

use std::path::{Path, PathBuf};
use std::time::Duration;

use bon::Builder;
use serde::Deserialize;

use crate::error::{Result, SyncError};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:5000";
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_NEAR_BOTTOM_PX: f64 = 30.0;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// Runtime configuration for a sync session.
///
/// ```
/// use std::time::Duration;
/// use convosync::config::SyncConfig;
///
/// let config = SyncConfig::builder()
///     .base_url("http://localhost:5000")
///     .poll_interval(Duration::from_millis(1500))
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Builder)]
pub struct SyncConfig {
    /// Root URL of the console backend.
    #[builder(into, default = DEFAULT_BASE_URL.to_string())]
    pub base_url: String,
    /// Period of the poll timer.
    #[builder(default = DEFAULT_POLL_INTERVAL)]
    pub poll_interval: Duration,
    /// Distance from the bottom (in pixels) still considered "near bottom".
    #[builder(default = DEFAULT_NEAR_BOTTOM_PX)]
    pub near_bottom_threshold_px: f64,
    /// Timeout applied to each HTTP request.
    #[builder(default = DEFAULT_REQUEST_TIMEOUT)]
    pub request_timeout: Duration,
    /// Upper bound for a whole poll cycle. `None` lets a stuck call stall the
    /// cycle until it resolves.
    pub cycle_timeout: Option<Duration>,
    /// Flag value assumed for conversations the cache has never seen.
    #[builder(default = true)]
    pub default_enabled: bool,
    /// Only allow manual sends while automated responses are off.
    #[builder(default = true)]
    pub manual_send_requires_disabled: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// On-disk representation; every field optional so files can be partial.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    base_url: Option<String>,
    poll_interval_ms: Option<u64>,
    near_bottom_threshold_px: Option<f64>,
    request_timeout_ms: Option<u64>,
    cycle_timeout_ms: Option<u64>,
    default_enabled: Option<bool>,
    manual_send_requires_disabled: Option<bool>,
}

impl SyncConfig {
    /// Default config file location (`~/.convosync/config.toml`).
    pub fn default_path() -> PathBuf {
        directories::UserDirs::new()
            .map(|dirs| dirs.home_dir().join(".convosync"))
            .unwrap_or_else(|| PathBuf::from(".convosync"))
            .join("config.toml")
    }

    /// Parse a TOML document on top of the defaults.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let file: ConfigFile = toml::from_str(raw)
            .map_err(|e| SyncError::Configuration(format!("invalid config file: {e}")))?;
        let mut config = Self::default();
        config.apply_file(file);
        Ok(config)
    }

    /// Read a TOML config file. A missing file yields the defaults.
    pub fn from_file(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(e) => Err(SyncError::Configuration(format!(
                "cannot read {}: {e}",
                path.display()
            ))),
        }
    }

    /// Load the default file, then overlay `CONVOSYNC_*` environment variables.
    pub fn load() -> Result<Self> {
        let mut config = Self::from_file(&Self::default_path())?;
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from environment variables only (plus `.env` if present).
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        config.validate()?;
        Ok(config)
    }

    /// Overlay `CONVOSYNC_*` environment variables onto this config.
    pub fn apply_env(&mut self) -> Result<()> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error

        if let Ok(url) = std::env::var("CONVOSYNC_BASE_URL") {
            self.base_url = url;
        }
        if let Some(ms) = env_u64("CONVOSYNC_POLL_INTERVAL_MS")? {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Ok(raw) = std::env::var("CONVOSYNC_NEAR_BOTTOM_PX") {
            self.near_bottom_threshold_px = raw.trim().parse().map_err(|_| {
                SyncError::Configuration(format!("CONVOSYNC_NEAR_BOTTOM_PX is not a number: {raw}"))
            })?;
        }
        if let Some(ms) = env_u64("CONVOSYNC_REQUEST_TIMEOUT_MS")? {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env_u64("CONVOSYNC_CYCLE_TIMEOUT_MS")? {
            self.cycle_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(value) = env_bool("CONVOSYNC_DEFAULT_ENABLED")? {
            self.default_enabled = value;
        }
        if let Some(value) = env_bool("CONVOSYNC_MANUAL_SEND_REQUIRES_DISABLED")? {
            self.manual_send_requires_disabled = value;
        }
        Ok(())
    }

    fn apply_file(&mut self, file: ConfigFile) {
        if let Some(url) = file.base_url {
            self.base_url = url;
        }
        if let Some(ms) = file.poll_interval_ms {
            self.poll_interval = Duration::from_millis(ms);
        }
        if let Some(px) = file.near_bottom_threshold_px {
            self.near_bottom_threshold_px = px;
        }
        if let Some(ms) = file.request_timeout_ms {
            self.request_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = file.cycle_timeout_ms {
            self.cycle_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }
        if let Some(value) = file.default_enabled {
            self.default_enabled = value;
        }
        if let Some(value) = file.manual_send_requires_disabled {
            self.manual_send_requires_disabled = value;
        }
    }

    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval.is_zero() {
            return Err(SyncError::Configuration(
                "poll interval must be greater than zero".into(),
            ));
        }
        if !self.near_bottom_threshold_px.is_finite() || self.near_bottom_threshold_px < 0.0 {
            return Err(SyncError::Configuration(format!(
                "near-bottom threshold must be a non-negative number, got {}",
                self.near_bottom_threshold_px
            )));
        }
        reqwest::Url::parse(&self.base_url).map_err(|e| {
            SyncError::Configuration(format!("invalid base url '{}': {e}", self.base_url))
        })?;
        Ok(())
    }
}

fn env_u64(name: &str) -> Result<Option<u64>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| SyncError::Configuration(format!("{name} is not an integer: {raw}"))),
        Err(_) => Ok(None),
    }
}

fn env_bool(name: &str) -> Result<Option<bool>> {
    match std::env::var(name) {
        Ok(raw) => parse_bool(&raw)
            .map(Some)
            .ok_or_else(|| SyncError::Configuration(format!("{name} is not a boolean: {raw}"))),
        Err(_) => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
