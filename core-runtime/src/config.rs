//! # Configuration
//!
//! Environment-driven configuration for the sync service.
//!
//! ## Overview
//!
//! [`AppConfig`] is read once at startup from the process environment
//! ([`AppConfig::from_env`]) or from any key lookup ([`AppConfig::from_lookup`],
//! used by tests). Loading never fails: absent required keys are reported by
//! [`AppConfig::missing_required`] so the orchestrator can surface a single
//! configuration error without touching the network.
//!
//! ## Keys
//!
//! | Key | Required | Default |
//! |-----|----------|---------|
//! | `TRAKT_CLIENT_ID` | yes | |
//! | `TRAKT_CLIENT_SECRET` | yes | |
//! | `EMBY_API_KEY` | yes | |
//! | `EMBY_SERVER` | yes | |
//! | `EMBY_ADMIN_USER_ID` | yes | |
//! | `EMBY_MOVIES_LIBRARY_ID` | yes | |
//! | `EMBY_TV_LIBRARY_ID` | yes | |
//! | `TRAKT_LISTS` | no | `[]` |
//! | `TRAKT_TOKEN_FILE` | no | `trakt_token.json` |
//! | `SYNC_INTERVAL` | no | `6h` |
//! | `SYNC_TIME` | no | `00:00` |
//! | `SYNC_DAY` | no | `Monday` |
//! | `SYNC_DATE` | no | `1` |
//! | `SYNC_CONCURRENCY` | no | `10` |
//! | `EMBY_COLLECTION_STRATEGY` | no | `auto` |
//! | `LOG_LEVEL` / `LOG_FORMAT` / `LOG_FILTER` | no | `info` |
//!
//! ## Usage
//!
//! ```ignore
//! use core_runtime::config::AppConfig;
//!
//! let config = AppConfig::from_env();
//! config.validate()?;
//! ```

use crate::error::{Error, Result};
use crate::logging::{redact_if_sensitive, LogFormat, LogLevel, LoggingConfig};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_TOKEN_FILE: &str = "trakt_token.json";
pub const DEFAULT_SYNC_INTERVAL: &str = "6h";
pub const DEFAULT_SYNC_TIME: &str = "00:00";
pub const DEFAULT_SYNC_DAY: &str = "Monday";
pub const DEFAULT_CONCURRENCY: usize = 10;

/// Required keys, in the order they are reported when missing.
pub const REQUIRED_KEYS: [&str; 7] = [
    "TRAKT_CLIENT_ID",
    "TRAKT_CLIENT_SECRET",
    "EMBY_API_KEY",
    "EMBY_SERVER",
    "EMBY_ADMIN_USER_ID",
    "EMBY_MOVIES_LIBRARY_ID",
    "EMBY_TV_LIBRARY_ID",
];

/// Trakt application credentials.
#[derive(Clone, Default)]
pub struct TraktSettings {
    pub client_id: String,
    pub client_secret: String,
    /// Where the OAuth token pair is persisted
    pub token_file: PathBuf,
}

impl fmt::Debug for TraktSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TraktSettings")
            .field("client_id", &self.client_id)
            .field(
                "client_secret",
                &redact_if_sensitive("client_secret", &self.client_secret),
            )
            .field("token_file", &self.token_file)
            .finish()
    }
}

/// Emby server connection settings.
#[derive(Clone, Default)]
pub struct EmbySettings {
    /// Base URL without a trailing slash
    pub server_url: String,
    pub api_key: String,
    pub admin_user_id: String,
    pub movies_library_id: String,
    pub tv_library_id: String,
}

impl fmt::Debug for EmbySettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmbySettings")
            .field("server_url", &self.server_url)
            .field("api_key", &redact_if_sensitive("api_key", &self.api_key))
            .field("admin_user_id", &self.admin_user_id)
            .field("movies_library_id", &self.movies_library_id)
            .field("tv_library_id", &self.tv_library_id)
            .finish()
    }
}

/// One remote list mirrored into one named collection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListMapping {
    #[serde(default, deserialize_with = "string_or_number")]
    pub list_id: String,
    #[serde(default)]
    pub collection_name: String,
}

impl ListMapping {
    pub fn new(list_id: impl Into<String>, collection_name: impl Into<String>) -> Self {
        Self {
            list_id: list_id.into(),
            collection_name: collection_name.into(),
        }
    }

    /// Both the list id and the collection name are non-blank.
    pub fn is_complete(&self) -> bool {
        !self.list_id.trim().is_empty() && !self.collection_name.trim().is_empty()
    }
}

/// Trakt list ids are numeric in some exports and slugs in others.
fn string_or_number<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Number(n) => n.to_string(),
        _ => String::new(),
    })
}

/// Raw schedule settings; interpreted by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScheduleSettings {
    pub interval: String,
    /// `HH:MM`
    pub time: String,
    pub day: String,
    /// Day of month, always within 1..=28
    pub day_of_month: u32,
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_SYNC_INTERVAL.to_string(),
            time: DEFAULT_SYNC_TIME.to_string(),
            day: DEFAULT_SYNC_DAY.to_string(),
            day_of_month: 1,
        }
    }
}

/// How new collections are created on the media server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CollectionStrategyMode {
    /// Bulk create, falling back to create-then-add
    #[default]
    Auto,
    /// Bulk create only
    Bulk,
    /// Create with the first item, then add the rest one by one
    Incremental,
}

impl FromStr for CollectionStrategyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "bulk" => Ok(Self::Bulk),
            "incremental" => Ok(Self::Incremental),
            other => Err(Error::Config(format!(
                "Unknown collection strategy: {}",
                other
            ))),
        }
    }
}

/// Reconciliation tuning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSettings {
    /// Width of the resolution worker pool
    pub concurrency: usize,
    pub collection_strategy: CollectionStrategyMode,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            collection_strategy: CollectionStrategyMode::Auto,
        }
    }
}

/// Complete service configuration.
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub trakt: TraktSettings,
    pub emby: EmbySettings,
    pub lists: Vec<ListMapping>,
    pub schedule: ScheduleSettings,
    pub sync: SyncSettings,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read configuration through an arbitrary key lookup.
    ///
    /// Blank values are treated as absent.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let trakt = TraktSettings {
            client_id: get_or("TRAKT_CLIENT_ID", ""),
            client_secret: get_or("TRAKT_CLIENT_SECRET", ""),
            token_file: PathBuf::from(get_or("TRAKT_TOKEN_FILE", DEFAULT_TOKEN_FILE)),
        };

        let emby = EmbySettings {
            server_url: get_or("EMBY_SERVER", "").trim_end_matches('/').to_string(),
            api_key: get_or("EMBY_API_KEY", ""),
            admin_user_id: get_or("EMBY_ADMIN_USER_ID", ""),
            movies_library_id: get_or("EMBY_MOVIES_LIBRARY_ID", ""),
            tv_library_id: get_or("EMBY_TV_LIBRARY_ID", ""),
        };

        let lists = get("TRAKT_LISTS")
            .map(|raw| parse_lists(&raw))
            .unwrap_or_default();

        let schedule = ScheduleSettings {
            interval: get_or("SYNC_INTERVAL", DEFAULT_SYNC_INTERVAL),
            time: get_or("SYNC_TIME", DEFAULT_SYNC_TIME),
            day: get_or("SYNC_DAY", DEFAULT_SYNC_DAY),
            day_of_month: get("SYNC_DATE")
                .map(|raw| parse_day_of_month(&raw))
                .unwrap_or(1),
        };

        let sync = SyncSettings {
            concurrency: get("SYNC_CONCURRENCY")
                .and_then(|raw| match raw.parse::<usize>() {
                    Ok(width) if width > 0 => Some(width),
                    _ => {
                        warn!(value = %raw, "Ignoring invalid SYNC_CONCURRENCY");
                        None
                    }
                })
                .unwrap_or(DEFAULT_CONCURRENCY),
            collection_strategy: get("EMBY_COLLECTION_STRATEGY")
                .and_then(|raw| {
                    raw.parse()
                        .map_err(|e| warn!(error = %e, "Ignoring EMBY_COLLECTION_STRATEGY"))
                        .ok()
                })
                .unwrap_or_default(),
        };

        let mut logging = LoggingConfig::default();
        if let Some(level) = get("LOG_LEVEL").and_then(|raw| raw.parse::<LogLevel>().ok()) {
            logging = logging.with_level(level);
        }
        if let Some(format) = get("LOG_FORMAT").and_then(|raw| raw.parse::<LogFormat>().ok()) {
            logging = logging.with_format(format);
        }
        if let Some(filter) = get("LOG_FILTER") {
            logging = logging.with_filter(filter);
        }

        Self {
            trakt,
            emby,
            lists,
            schedule,
            sync,
            logging,
        }
    }

    /// Required keys that are absent or blank.
    pub fn missing_required(&self) -> Vec<&'static str> {
        let values = [
            &self.trakt.client_id,
            &self.trakt.client_secret,
            &self.emby.api_key,
            &self.emby.server_url,
            &self.emby.admin_user_id,
            &self.emby.movies_library_id,
            &self.emby.tv_library_id,
        ];

        REQUIRED_KEYS
            .iter()
            .zip(values)
            .filter(|(_, value)| value.trim().is_empty())
            .map(|(key, _)| *key)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_required().is_empty()
    }

    /// Fail with [`Error::MissingConfig`] when any required key is absent.
    pub fn validate(&self) -> Result<()> {
        let missing = self.missing_required();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(Error::MissingConfig(missing))
        }
    }
}

/// Parse `TRAKT_LISTS`; malformed JSON yields no lists.
pub fn parse_lists(raw: &str) -> Vec<ListMapping> {
    match serde_json::from_str::<Vec<ListMapping>>(raw) {
        Ok(lists) => lists,
        Err(e) => {
            warn!(error = %e, "TRAKT_LISTS is not a valid JSON list, ignoring it");
            Vec::new()
        }
    }
}

/// Day of month clamped to the range every month has.
fn parse_day_of_month(raw: &str) -> u32 {
    match raw.parse::<u32>() {
        Ok(day) if (1..=28).contains(&day) => day,
        _ => {
            warn!(value = %raw, "SYNC_DATE must be between 1 and 28, using 1");
            1
        }
    }
}
