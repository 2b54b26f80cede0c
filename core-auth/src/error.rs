use bridge_traits::BridgeError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("Invalid API key or client ID (HTTP {status})")]
    InvalidClient { status: u16 },

    #[error("Refresh token rejected: {0}")]
    InvalidRefreshToken(String),

    #[error("Token refresh failed: {0}")]
    TokenRefreshFailed(String),

    #[error("No refresh token available")]
    NoRefreshToken,

    #[error("User denied the device authorization request")]
    DeviceAuthorizationDenied,

    #[error("Device code expired before authorization completed")]
    DeviceCodeExpired,

    #[error("Unexpected response from {endpoint}: HTTP {status}")]
    UnexpectedStatus { endpoint: &'static str, status: u16 },

    #[error("Token storage failed: {0}")]
    Storage(String),

    #[error("HTTP error: {0}")]
    Http(#[from] BridgeError),

    #[error("Authentication error: {0}")]
    Other(String),
}

impl AuthError {
    /// Whether a later run can succeed without the user doing anything.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            AuthError::TokenRefreshFailed(_) | AuthError::Http(_) | AuthError::Storage(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, AuthError>;
