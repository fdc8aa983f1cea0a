//! JSON configuration file.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use flickrdown_engine::{FlickrSettings, TransferSettings, DEFAULT_ENDPOINT};
use flickrdown_logging::flickrdown_warn;
use serde::Deserialize;

pub const STATE_FILENAME: &str = ".flickrdown_state.ron";

const MAX_PER_PAGE: u32 = 500;

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    api_key: String,
    #[serde(default)]
    auth_token: Option<String>,
    #[serde(default = "default_user_id")]
    user_id: String,
    archive_dir: PathBuf,
    #[serde(default)]
    statefile: Option<PathBuf>,
    #[serde(default = "default_endpoint")]
    endpoint: String,
    #[serde(default = "default_per_page")]
    per_page: u32,
    #[serde(default = "default_request_timeout_secs")]
    request_timeout_secs: u64,
    #[serde(default = "default_connect_timeout_secs")]
    connect_timeout_secs: u64,
    #[serde(default)]
    watch_dir: Option<PathBuf>,
    #[serde(default)]
    sweep_interval_secs: Option<u64>,
    #[serde(default = "default_earliest_start")]
    earliest_start: NaiveDate,
}

fn default_user_id() -> String {
    "me".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_per_page() -> u32 {
    100
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_earliest_start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2000, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Validated configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub flickr: FlickrSettings,
    pub transfer: TransferSettings,
    pub archive_dir: PathBuf,
    pub statefile: PathBuf,
    pub watch_dir: Option<PathBuf>,
    pub sweep_interval: Option<Duration>,
    /// No window may start before this day.
    pub earliest_start: NaiveDate,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("invalid config file {}", path.display()))
    }

    pub fn from_json(text: &str) -> Result<Self> {
        let raw: RawConfig = serde_json::from_str(text).context("failed to parse JSON")?;
        Self::validate(raw)
    }

    fn validate(raw: RawConfig) -> Result<Self> {
        if raw.api_key.trim().is_empty() {
            bail!("api_key must not be empty");
        }
        if raw.archive_dir.as_os_str().is_empty() {
            bail!("archive_dir must not be empty");
        }
        if raw.per_page == 0 {
            bail!("per_page must be at least 1");
        }
        if raw.sweep_interval_secs == Some(0) {
            bail!("sweep_interval_secs must be at least 1");
        }
        let per_page = if raw.per_page > MAX_PER_PAGE {
            flickrdown_warn!(
                "per_page {} exceeds the remote maximum, using {}",
                raw.per_page,
                MAX_PER_PAGE
            );
            MAX_PER_PAGE
        } else {
            raw.per_page
        };

        let connect_timeout = Duration::from_secs(raw.connect_timeout_secs);
        let flickr = FlickrSettings {
            endpoint: raw.endpoint,
            api_key: raw.api_key,
            auth_token: raw.auth_token.filter(|token| !token.is_empty()),
            user_id: raw.user_id,
            per_page,
            connect_timeout,
            request_timeout: Duration::from_secs(raw.request_timeout_secs),
        };
        let transfer = TransferSettings {
            connect_timeout,
            ..TransferSettings::default()
        };

        let statefile = raw
            .statefile
            .unwrap_or_else(|| raw.archive_dir.join(STATE_FILENAME));

        Ok(Self {
            flickr,
            transfer,
            archive_dir: raw.archive_dir,
            statefile,
            watch_dir: raw.watch_dir,
            sweep_interval: raw.sweep_interval_secs.map(Duration::from_secs),
            earliest_start: raw.earliest_start,
        })
    }
}
