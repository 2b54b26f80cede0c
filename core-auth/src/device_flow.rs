//! Device Authorization Flow
//!
//! ```text
//! AwaitingUserCode ──code issued──> Polling ──200──> Authorized
//!                                      │ ├───418──> Denied
//!                                      │ └─410/404/409 or attempts exhausted──> Expired
//!                                      └── 400 pending / 429 slow down (interval += 5s)
//! ```
//!
//! The flow is a single cooperative loop: sleep for the current interval,
//! poll once, feed the outcome into [`DeviceFlowState::advance`].

use crate::error::{AuthError, Result};
use crate::oauth::TraktAuthApi;
use crate::types::{DeviceCode, OAuthTokens, PollOutcome};
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, info, warn};

/// Callback that shows the user code to a human.
pub type DevicePrompt = Arc<dyn Fn(&DeviceCode) + Send + Sync>;

/// Polling limits.
#[derive(Debug, Clone)]
pub struct DeviceFlowConfig {
    /// Hard cap on polls regardless of the code lifetime
    pub max_polls: u32,
    /// Added to the interval on every slow-down response
    pub slow_down_step: Duration,
}

impl Default for DeviceFlowConfig {
    fn default() -> Self {
        Self {
            max_polls: 200,
            slow_down_step: Duration::from_secs(5),
        }
    }
}

/// State of one device authorization attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeviceFlowState {
    AwaitingUserCode,
    Polling {
        attempts: u32,
        max_attempts: u32,
        interval: Duration,
    },
    Authorized(OAuthTokens),
    Denied,
    Expired,
}

impl DeviceFlowState {
    /// Start polling for `code`, bounded by its lifetime and `config.max_polls`.
    pub fn polling(code: &DeviceCode, config: &DeviceFlowConfig) -> Self {
        let interval_secs = code.interval.max(1);
        let lifetime_polls = (code.expires_in / interval_secs).max(1);
        let max_attempts = u32::try_from(lifetime_polls)
            .unwrap_or(u32::MAX)
            .min(config.max_polls.max(1));

        DeviceFlowState::Polling {
            attempts: 0,
            max_attempts,
            interval: Duration::from_secs(interval_secs),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            DeviceFlowState::Authorized(_) | DeviceFlowState::Denied | DeviceFlowState::Expired
        )
    }

    /// Apply one poll outcome. Terminal states and `AwaitingUserCode` are unchanged.
    pub fn advance(self, outcome: PollOutcome, config: &DeviceFlowConfig) -> Self {
        let (attempts, max_attempts, interval) = match self {
            DeviceFlowState::Polling {
                attempts,
                max_attempts,
                interval,
            } => (attempts, max_attempts, interval),
            other => return other,
        };

        let attempts = attempts + 1;
        let interval = match outcome {
            PollOutcome::Authorized(tokens) => return DeviceFlowState::Authorized(tokens),
            PollOutcome::Denied => return DeviceFlowState::Denied,
            PollOutcome::Expired | PollOutcome::InvalidCode | PollOutcome::AlreadyUsed => {
                return DeviceFlowState::Expired
            }
            PollOutcome::SlowDown => interval + config.slow_down_step,
            PollOutcome::Pending => interval,
        };

        if attempts >= max_attempts {
            DeviceFlowState::Expired
        } else {
            DeviceFlowState::Polling {
                attempts,
                max_attempts,
                interval,
            }
        }
    }
}

/// Runs one device authorization from code request to a terminal state.
pub struct DeviceAuthorization {
    api: Arc<dyn TraktAuthApi>,
    config: DeviceFlowConfig,
    event_bus: Option<EventBus>,
    prompt: Option<DevicePrompt>,
    state: DeviceFlowState,
}

impl DeviceAuthorization {
    pub fn new(api: Arc<dyn TraktAuthApi>, config: DeviceFlowConfig) -> Self {
        Self {
            api,
            config,
            event_bus: None,
            prompt: None,
            state: DeviceFlowState::AwaitingUserCode,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn with_prompt(mut self, prompt: DevicePrompt) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn state(&self) -> &DeviceFlowState {
        &self.state
    }

    /// Request a code, publish it, and poll until a terminal state.
    pub async fn run(&mut self) -> Result<OAuthTokens> {
        self.state = DeviceFlowState::AwaitingUserCode;
        let code = self.api.request_device_code().await?;

        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Auth(AuthEvent::DeviceCodeIssued {
                user_code: code.user_code.clone(),
                verification_url: code.verification_url.clone(),
                expires_in: code.expires_in,
            }))
            .ok();
        }
        if let Some(prompt) = &self.prompt {
            prompt(&code);
        }

        self.state = DeviceFlowState::polling(&code, &self.config);
        info!(user_code = %code.user_code, "Waiting for device authorization");

        loop {
            let interval = match &self.state {
                DeviceFlowState::Polling { interval, .. } => *interval,
                DeviceFlowState::Authorized(tokens) => {
                    info!("Device authorized");
                    return Ok(tokens.clone());
                }
                DeviceFlowState::Denied => return Err(AuthError::DeviceAuthorizationDenied),
                DeviceFlowState::Expired => return Err(AuthError::DeviceCodeExpired),
                DeviceFlowState::AwaitingUserCode => {
                    return Err(AuthError::Other("device flow not started".to_string()))
                }
            };

            sleep(interval).await;

            let outcome = match self.api.poll_device_token(&code).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Transport hiccups count as an unanswered poll.
                    warn!(error = %e, "Device token poll failed");
                    PollOutcome::Pending
                }
            };
            debug!(outcome = ?outcome, "Device token poll");

            let state = std::mem::replace(&mut self.state, DeviceFlowState::AwaitingUserCode);
            self.state = state.advance(outcome, &self.config);
        }
    }
}
