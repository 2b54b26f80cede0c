//! Error types for the Trakt provider

use bridge_traits::error::BridgeError;
use thiserror::Error;

/// Trakt provider errors
#[derive(Error, Debug)]
pub enum TraktError {
    /// Bearer token rejected
    #[error("Authentication failed (status {status})")]
    AuthenticationFailed { status: u16 },

    /// List id unknown or not visible to this account
    #[error("List not found: {list_id}")]
    ListNotFound { list_id: String },

    /// API request returned an error
    #[error("Trakt API error (status {status_code}): {message}")]
    ApiError { status_code: u16, message: String },

    /// Failed to parse API response
    #[error("Failed to parse API response: {0}")]
    ParseError(String),

    #[error(transparent)]
    BridgeError(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, TraktError>;

impl From<TraktError> for BridgeError {
    fn from(error: TraktError) -> Self {
        match error {
            TraktError::AuthenticationFailed { status } => {
                BridgeError::Unauthorized(format!("Trakt rejected the access token ({})", status))
            }
            TraktError::ListNotFound { list_id } => BridgeError::Status {
                status: 404,
                message: format!("List not found: {}", list_id),
            },
            TraktError::ApiError {
                status_code,
                message,
            } => BridgeError::Status {
                status: status_code,
                message,
            },
            TraktError::ParseError(msg) => {
                BridgeError::OperationFailed(format!("Parse error: {}", msg))
            }
            TraktError::BridgeError(e) => e,
        }
    }
}
