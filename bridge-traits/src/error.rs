use thiserror::Error;

#[derive(Error, Debug)]
pub enum BridgeError {
    #[error("Bridge capability not available: {0}")]
    NotAvailable(String),

    #[error("Bridge operation failed: {0}")]
    OperationFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Unexpected HTTP status {status}: {message}")]
    Status { status: u16, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl BridgeError {
    /// HTTP status carried by the error, if the failure came from a response.
    pub fn status(&self) -> Option<u16> {
        match self {
            BridgeError::Status { status, .. } => Some(*status),
            BridgeError::Unauthorized(_) => Some(401),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, BridgeError>;
