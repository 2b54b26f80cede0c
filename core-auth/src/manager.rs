//! # Authentication Manager
//!
//! Provides a valid access token to the sync engine.
//!
//! ## Token lifecycle
//!
//! 1. Load the token file.
//! 2. A token more than five minutes from expiry is returned as is.
//! 3. An expiring token is refreshed; the new pair is saved.
//! 4. With no token, no refresh token, or a rejected refresh, the device
//!    authorization flow runs and its result is saved.
//!
//! Calls are serialized so two concurrent callers never refresh twice.

use crate::device_flow::{DeviceAuthorization, DeviceFlowConfig, DevicePrompt};
use crate::error::{AuthError, Result};
use crate::oauth::TraktAuthApi;
use crate::token_store::TokenStore;
use crate::types::OAuthTokens;
use async_trait::async_trait;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, error, info, instrument, warn};

/// Source of bearer tokens for the list service.
#[async_trait]
pub trait TokenProvider: Send + Sync {
    /// Return an access token that is valid for at least a few minutes.
    async fn access_token(&self) -> Result<String>;
}

pub struct AuthManager {
    api: Arc<dyn TraktAuthApi>,
    store: TokenStore,
    event_bus: EventBus,
    flow_config: DeviceFlowConfig,
    prompt: Option<DevicePrompt>,
    refresh_lock: Mutex<()>,
}

impl AuthManager {
    pub fn new(api: Arc<dyn TraktAuthApi>, store: TokenStore, event_bus: EventBus) -> Self {
        Self {
            api,
            store,
            event_bus,
            flow_config: DeviceFlowConfig::default(),
            prompt: None,
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn with_flow_config(mut self, config: DeviceFlowConfig) -> Self {
        self.flow_config = config;
        self
    }

    /// Show device codes through `prompt` in addition to the event bus.
    pub fn with_prompt(mut self, prompt: DevicePrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Run device authorization unconditionally and persist the result.
    #[instrument(skip(self))]
    pub async fn authorize_device(&self) -> Result<OAuthTokens> {
        let _guard = self.refresh_lock.lock().await;
        self.run_device_flow().await
    }

    /// Forget the stored token.
    pub async fn sign_out(&self) -> Result<()> {
        let _guard = self.refresh_lock.lock().await;
        self.store.clear().await
    }

    async fn run_device_flow(&self) -> Result<OAuthTokens> {
        let mut flow = DeviceAuthorization::new(self.api.clone(), self.flow_config.clone())
            .with_event_bus(self.event_bus.clone());
        if let Some(prompt) = &self.prompt {
            flow = flow.with_prompt(prompt.clone());
        }

        let tokens = match flow.run().await {
            Ok(tokens) => tokens,
            Err(e) => {
                error!(error = %e, "Device authorization failed");
                self.emit_error(&e);
                return Err(e);
            }
        };

        self.store.save(&tokens).await?;
        self.event_bus
            .emit(CoreEvent::Auth(AuthEvent::SignedIn))
            .ok();
        Ok(tokens)
    }

    async fn refresh(&self, tokens: &OAuthTokens) -> Result<OAuthTokens> {
        if !tokens.has_refresh_token() {
            return Err(AuthError::NoRefreshToken);
        }

        self.event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshing))
            .ok();

        let refreshed = self.api.refresh_access_token(&tokens.refresh_token).await?;
        self.store.save(&refreshed).await?;

        self.event_bus
            .emit(CoreEvent::Auth(AuthEvent::TokenRefreshed {
                expires_at: refreshed.expires_at(),
            }))
            .ok();
        Ok(refreshed)
    }

    fn emit_error(&self, e: &AuthError) {
        self.event_bus
            .emit(CoreEvent::Auth(AuthEvent::AuthError {
                message: e.to_string(),
                recoverable: e.is_recoverable(),
            }))
            .ok();
    }
}

#[async_trait]
impl TokenProvider for AuthManager {
    #[instrument(skip(self))]
    async fn access_token(&self) -> Result<String> {
        let _guard = self.refresh_lock.lock().await;

        let stored = self.store.load().await?;

        if let Some(tokens) = &stored {
            if !tokens.is_expired() {
                debug!("Token is valid, no refresh needed");
                return Ok(tokens.access_token.clone());
            }

            info!("Token expired or expiring soon, refreshing");
            match self.refresh(tokens).await {
                Ok(refreshed) => return Ok(refreshed.access_token),
                Err(e) => {
                    warn!(error = %e, "Token refresh failed, starting device authorization");
                    self.emit_error(&e);
                }
            }
        } else {
            info!("No stored token, starting device authorization");
        }

        Ok(self.run_device_flow().await?.access_token)
    }
}
