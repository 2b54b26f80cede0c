//! # Authentication Module
//!
//! Obtains and keeps a valid Trakt access token.
//!
//! ## Overview
//!
//! - [`TraktOAuthClient`] speaks the device-code and refresh endpoints
//! - [`DeviceAuthorization`] drives the device flow as an explicit state
//!   machine with bounded polling
//! - [`TokenStore`] persists the token pair in a JSON file
//! - [`AuthManager`] ties them together behind the [`TokenProvider`] trait the
//!   sync engine depends on: reuse a fresh token, refresh an expiring one and
//!   fall back to device authorization when refresh is impossible

pub mod device_flow;
pub mod error;
pub mod manager;
pub mod oauth;
pub mod token_store;
pub mod types;

pub use device_flow::{DeviceAuthorization, DeviceFlowConfig, DeviceFlowState, DevicePrompt};
pub use error::{AuthError, Result};
pub use manager::{AuthManager, TokenProvider};
pub use oauth::{OAuthConfig, TraktAuthApi, TraktOAuthClient};
pub use token_store::TokenStore;
pub use types::{DeviceCode, OAuthTokens, PollOutcome};
