use bridge_traits::error::BridgeError;
use core_auth::AuthError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Cannot sync: missing required configuration: {}", .missing.join(", "))]
    Configuration { missing: Vec<&'static str> },

    #[error("Failed to obtain access token: {0}")]
    Authentication(#[from] AuthError),

    #[error("Failed to fetch list {list}: {reason}")]
    ListFetch { list: String, reason: String },

    #[error("Cannot connect to Emby server: {0}")]
    ServerUnreachable(String),

    #[error("Failed to create/update collection: {name}")]
    CollectionCreationFailed { name: String },

    #[error("No matching items found in Emby for {name}")]
    NothingToAdd { name: String },

    #[error("Scheduler error: {0}")]
    Scheduler(String),

    #[error(transparent)]
    Config(#[from] core_runtime::Error),

    #[error(transparent)]
    Bridge(#[from] BridgeError),
}

pub type Result<T> = std::result::Result<T, SyncError>;
