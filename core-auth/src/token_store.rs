//! Token File Storage
//!
//! Persists the token pair as a JSON document in the Trakt response shape:
//!
//! ```json
//! {"access_token": "...", "token_type": "bearer", "expires_in": 7776000,
//!  "refresh_token": "...", "scope": "public", "created_at": 1700000000}
//! ```
//!
//! Token values are never logged.

use crate::error::{AuthError, Result};
use crate::types::OAuthTokens;
use bridge_traits::storage::FileSystemAccess;
use bytes::Bytes;
use core_runtime::logging::strip_path;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// File-backed token storage.
#[derive(Clone)]
pub struct TokenStore {
    fs: Arc<dyn FileSystemAccess>,
    path: PathBuf,
}

impl TokenStore {
    pub fn new(fs: Arc<dyn FileSystemAccess>, path: impl Into<PathBuf>) -> Self {
        Self {
            fs,
            path: path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn file_name(&self) -> &str {
        self.path.to_str().map(strip_path).unwrap_or("token file")
    }

    /// Load the stored tokens.
    ///
    /// Returns `Ok(None)` when no file exists. A file that does not parse is
    /// deleted and also yields `Ok(None)`, forcing a fresh authorization.
    pub async fn load(&self) -> Result<Option<OAuthTokens>> {
        let exists = self
            .fs
            .exists(&self.path)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        if !exists {
            debug!(file = %self.file_name(), "No stored token");
            return Ok(None);
        }

        let data = self
            .fs
            .read_file(&self.path)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        match serde_json::from_slice::<OAuthTokens>(&data) {
            Ok(tokens) => {
                debug!(
                    file = %self.file_name(),
                    expires_at = tokens.expires_at(),
                    "Loaded stored token"
                );
                Ok(Some(tokens))
            }
            Err(e) => {
                warn!(
                    file = %self.file_name(),
                    error = %e,
                    "Stored token is corrupted, deleting it"
                );
                if let Err(delete_err) = self.fs.delete_file(&self.path).await {
                    warn!(error = %delete_err, "Failed to delete corrupted token file");
                }
                Ok(None)
            }
        }
    }

    /// Replace the stored tokens.
    pub async fn save(&self, tokens: &OAuthTokens) -> Result<()> {
        let json = serde_json::to_vec_pretty(tokens)
            .map_err(|e| AuthError::Storage(format!("token serialization failed: {}", e)))?;

        self.fs
            .write_file(&self.path, Bytes::from(json))
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;

        info!(
            file = %self.file_name(),
            has_refresh_token = tokens.has_refresh_token(),
            "Token saved"
        );
        Ok(())
    }

    /// Remove the stored tokens, if any.
    pub async fn clear(&self) -> Result<()> {
        let exists = self
            .fs
            .exists(&self.path)
            .await
            .map_err(|e| AuthError::Storage(e.to_string()))?;
        if exists {
            self.fs
                .delete_file(&self.path)
                .await
                .map_err(|e| AuthError::Storage(e.to_string()))?;
            info!(file = %self.file_name(), "Token removed");
        }
        Ok(())
    }
}
