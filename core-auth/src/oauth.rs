//! Trakt OAuth endpoints
//!
//! Device-code issuance, device-token polling and refresh-token exchange.
//! All three endpoints take JSON bodies.

use crate::error::{AuthError, Result};
use crate::types::{default_expires_in, DeviceCode, OAuthTokens, PollOutcome};
use async_trait::async_trait;
use bridge_traits::http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, instrument, warn};

pub const TRAKT_API_URL: &str = "https://api.trakt.tv";

const MAX_REFRESH_ATTEMPTS: u32 = 3;

/// Trakt application credentials and endpoint root.
#[derive(Clone)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    /// API root without trailing slash
    pub base_url: String,
}

impl OAuthConfig {
    pub fn new(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            base_url: TRAKT_API_URL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

impl std::fmt::Debug for OAuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthConfig")
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("base_url", &self.base_url)
            .finish()
    }
}

/// The token endpoints the auth manager needs.
#[async_trait]
pub trait TraktAuthApi: Send + Sync {
    /// `POST /oauth/device/code`
    async fn request_device_code(&self) -> Result<DeviceCode>;

    /// One `POST /oauth/device/token` poll.
    async fn poll_device_token(&self, code: &DeviceCode) -> Result<PollOutcome>;

    /// `POST /oauth/token` with `grant_type=refresh_token`.
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens>;
}

#[derive(Serialize)]
struct DeviceCodeRequest<'a> {
    client_id: &'a str,
}

#[derive(Serialize)]
struct DeviceTokenRequest<'a> {
    code: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
}

#[derive(Serialize)]
struct RefreshTokenRequest<'a> {
    refresh_token: &'a str,
    client_id: &'a str,
    client_secret: &'a str,
    grant_type: &'static str,
}

/// Token response from the Trakt token endpoints.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default = "default_expires_in")]
    expires_in: i64,
    #[serde(default)]
    token_type: Option<String>,
    #[serde(default)]
    scope: Option<String>,
    #[serde(default)]
    created_at: Option<i64>,
}

impl TokenResponse {
    fn into_tokens(self, fallback_refresh: Option<&str>) -> OAuthTokens {
        let mut tokens = OAuthTokens::new(
            self.access_token,
            self.refresh_token
                .or_else(|| fallback_refresh.map(str::to_string))
                .unwrap_or_default(),
            self.expires_in,
        );
        if let Some(token_type) = self.token_type {
            tokens.token_type = token_type;
        }
        if let Some(created_at) = self.created_at {
            tokens.created_at = created_at;
        }
        tokens.scope = self.scope;
        tokens
    }
}

/// HTTP client for the Trakt OAuth endpoints.
pub struct TraktOAuthClient {
    config: OAuthConfig,
    http_client: Arc<dyn HttpClient>,
}

impl TraktOAuthClient {
    pub fn new(config: OAuthConfig, http_client: Arc<dyn HttpClient>) -> Self {
        Self {
            config,
            http_client,
        }
    }

    pub fn config(&self) -> &OAuthConfig {
        &self.config
    }

    fn post<T: Serialize>(&self, path: &str, body: &T) -> Result<HttpRequest> {
        Ok(
            HttpRequest::new(HttpMethod::Post, format!("{}{}", self.config.base_url, path))
                .header("trakt-api-version", "2")
                .header("trakt-api-key", self.config.client_id.clone())
                .json(body)?,
        )
    }

    /// Send once; retries are owned by the callers in this module.
    async fn send_once(&self, request: HttpRequest) -> Result<HttpResponse> {
        let policy = RetryPolicy {
            max_attempts: 1,
            ..RetryPolicy::default()
        };
        Ok(self.http_client.execute_with_retry(request, policy).await?)
    }
}

#[async_trait]
impl TraktAuthApi for TraktOAuthClient {
    #[instrument(skip(self))]
    async fn request_device_code(&self) -> Result<DeviceCode> {
        let request = self.post(
            "/oauth/device/code",
            &DeviceCodeRequest {
                client_id: &self.config.client_id,
            },
        )?;

        let response = self.send_once(request).await?;

        match response.status {
            200 => {
                let code: DeviceCode = response.json()?;
                info!(
                    user_code = %code.user_code,
                    expires_in = code.expires_in,
                    interval = code.interval,
                    "Device code issued"
                );
                Ok(code)
            }
            401 | 403 => Err(AuthError::InvalidClient {
                status: response.status,
            }),
            status => {
                warn!(status = status, "Device code request failed");
                Err(AuthError::UnexpectedStatus {
                    endpoint: "/oauth/device/code",
                    status,
                })
            }
        }
    }

    async fn poll_device_token(&self, code: &DeviceCode) -> Result<PollOutcome> {
        let request = self.post(
            "/oauth/device/token",
            &DeviceTokenRequest {
                code: &code.device_code,
                client_id: &self.config.client_id,
                client_secret: &self.config.client_secret,
            },
        )?;

        let response = self.send_once(request).await?;

        if response.status == 200 {
            let token_response: TokenResponse = response.json()?;
            return Ok(PollOutcome::Authorized(token_response.into_tokens(None)));
        }

        match PollOutcome::from_status(response.status) {
            Some(outcome) => {
                debug!(status = response.status, outcome = ?outcome, "Device token poll");
                Ok(outcome)
            }
            None => Err(AuthError::UnexpectedStatus {
                endpoint: "/oauth/device/token",
                status: response.status,
            }),
        }
    }

    #[instrument(skip(self, refresh_token))]
    async fn refresh_access_token(&self, refresh_token: &str) -> Result<OAuthTokens> {
        let body = RefreshTokenRequest {
            refresh_token,
            client_id: &self.config.client_id,
            client_secret: &self.config.client_secret,
            grant_type: "refresh_token",
        };

        debug!("Refreshing access token");

        let mut attempts = 0;

        loop {
            attempts += 1;

            let request = self.post("/oauth/token", &body)?;
            let response = self
                .send_once(request)
                .await
                .map_err(|e| AuthError::TokenRefreshFailed(e.to_string()))?;

            if response.is_success() {
                let token_response: TokenResponse = response.json()?;

                info!(
                    expires_in = token_response.expires_in,
                    "Successfully refreshed token"
                );

                return Ok(token_response.into_tokens(Some(refresh_token)));
            }

            let status = response.status;

            if status == 400 || status == 401 {
                warn!(status = status, "Refresh token rejected");
                return Err(AuthError::InvalidRefreshToken(format!(
                    "token endpoint returned {}",
                    status
                )));
            }

            if response.is_client_error() && status != 429 {
                warn!(status = status, "Token refresh failed without retry");
                return Err(AuthError::TokenRefreshFailed(format!(
                    "token endpoint returned {}",
                    status
                )));
            }

            if attempts >= MAX_REFRESH_ATTEMPTS {
                return Err(AuthError::TokenRefreshFailed(format!(
                    "token refresh failed after {} attempts, last status {}",
                    attempts, status
                )));
            }

            let delay = Duration::from_millis(100 * 2u64.pow(attempts - 1));
            warn!(
                status = status,
                attempts = attempts,
                delay_ms = delay.as_millis() as u64,
                "Token refresh failed, retrying"
            );
            sleep(delay).await;
        }
    }
}
