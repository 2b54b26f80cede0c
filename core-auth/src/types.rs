use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Seconds before expiry at which a token is treated as expired.
pub const DEFAULT_EXPIRY_BUFFER_SECS: i64 = 300;

/// OAuth 2.0 token set, in the shape Trakt returns it and the token file stores it.
///
/// # Security
///
/// The `Debug` implementation redacts both tokens.
///
/// # Examples
///
/// ```
/// use core_auth::OAuthTokens;
///
/// let tokens = OAuthTokens::new("access".to_string(), "refresh".to_string(), 7_776_000);
/// assert!(!tokens.is_expired());
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthTokens {
    /// The access token used for API requests
    pub access_token: String,
    #[serde(default = "default_token_type")]
    pub token_type: String,
    /// Lifetime in seconds, counted from `created_at`
    #[serde(default = "default_expires_in")]
    pub expires_in: i64,
    /// The refresh token used to obtain new access tokens
    #[serde(default)]
    pub refresh_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    /// Issue time (Unix epoch seconds)
    #[serde(default = "now_epoch")]
    pub created_at: i64,
}

fn default_token_type() -> String {
    "bearer".to_string()
}

pub(crate) fn default_expires_in() -> i64 {
    // Trakt access tokens live for three months
    7_776_000
}

fn now_epoch() -> i64 {
    Utc::now().timestamp()
}

impl OAuthTokens {
    /// Create a token set issued now.
    pub fn new(access_token: String, refresh_token: String, expires_in: i64) -> Self {
        Self {
            access_token,
            token_type: default_token_type(),
            expires_in,
            refresh_token,
            scope: None,
            created_at: now_epoch(),
        }
    }

    /// Expiry as Unix epoch seconds.
    pub fn expires_at(&self) -> i64 {
        self.created_at.saturating_add(self.expires_in)
    }

    pub fn expires_at_utc(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.expires_at(), 0).single()
    }

    /// Expired, or expiring within five minutes.
    pub fn is_expired(&self) -> bool {
        self.is_expired_with_buffer(DEFAULT_EXPIRY_BUFFER_SECS)
    }

    pub fn is_expired_with_buffer(&self, buffer_seconds: i64) -> bool {
        Utc::now().timestamp() >= self.expires_at() - buffer_seconds
    }

    pub fn has_refresh_token(&self) -> bool {
        !self.refresh_token.trim().is_empty()
    }
}

impl fmt::Debug for OAuthTokens {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OAuthTokens")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("expires_at", &self.expires_at())
            .field("scope", &self.scope)
            .finish()
    }
}

/// Device code grant issued by `POST /oauth/device/code`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCode {
    pub device_code: String,
    /// Short code the user types at `verification_url`
    pub user_code: String,
    pub verification_url: String,
    /// Seconds until the device code becomes invalid
    #[serde(default = "default_device_expires_in")]
    pub expires_in: u64,
    /// Minimum seconds between polls
    #[serde(default = "default_interval")]
    pub interval: u64,
}

fn default_device_expires_in() -> u64 {
    600
}

fn default_interval() -> u64 {
    5
}

impl fmt::Debug for DeviceCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DeviceCode")
            .field("device_code", &"[REDACTED]")
            .field("user_code", &self.user_code)
            .field("verification_url", &self.verification_url)
            .field("expires_in", &self.expires_in)
            .field("interval", &self.interval)
            .finish()
    }
}

/// Result of a single `POST /oauth/device/token` poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    /// 200: the user approved the device
    Authorized(OAuthTokens),
    /// 400: the user has not entered the code yet
    Pending,
    /// 429: polling too fast
    SlowDown,
    /// 418: the user explicitly denied the request
    Denied,
    /// 410: the code expired
    Expired,
    /// 404: the device code is not recognised
    InvalidCode,
    /// 409: the code was already approved by another poll
    AlreadyUsed,
}

impl PollOutcome {
    /// Map a device-token response status. Unknown statuses are `None`.
    pub fn from_status(status: u16) -> Option<Self> {
        match status {
            400 => Some(PollOutcome::Pending),
            404 => Some(PollOutcome::InvalidCode),
            409 => Some(PollOutcome::AlreadyUsed),
            410 => Some(PollOutcome::Expired),
            418 => Some(PollOutcome::Denied),
            429 => Some(PollOutcome::SlowDown),
            _ => None,
        }
    }
}
