//! Error types for the Emby provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Emby provider errors
#[derive(Error, Debug)]
pub enum EmbyError {
    /// API key rejected
    #[error("Authentication failed. Please check your API key.")]
    AuthenticationFailed,

    /// API request returned an error
    #[error("Emby API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, EmbyError>;

impl From<EmbyError> for BridgeError {
    fn from(error: EmbyError) -> Self {
        match error {
            EmbyError::AuthenticationFailed => {
                BridgeError::Unauthorized("Emby rejected the API key".to_string())
            }
            EmbyError::ApiError {
                status_code,
                message,
            } => BridgeError::Status {
                status: status_code,
                message,
            },
            EmbyError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            EmbyError::BridgeError(e) => e,
        }
    }
}
