//! Media Server Abstraction
//!
//! The item/collection model the reconciliation engine writes into.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

use crate::error::Result;

/// Kind of library item a list entry or catalog row refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ItemKind {
    Movie,
    Show,
}

impl ItemKind {
    pub const ALL: [ItemKind; 2] = [ItemKind::Movie, ItemKind::Show];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemKind::Movie => "movie",
            ItemKind::Show => "show",
        }
    }
}

impl fmt::Display for ItemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the media server catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryItem {
    /// Server-internal item id
    pub id: String,
    pub name: String,
    pub kind: ItemKind,
    /// Provider name (as reported by the server) to external id
    pub provider_ids: HashMap<String, String>,
}

impl LibraryItem {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            provider_ids: HashMap::new(),
        }
    }

    pub fn with_provider_id(mut self, provider: impl Into<String>, id: impl Into<String>) -> Self {
        self.provider_ids.insert(provider.into(), id.into());
        self
    }

    /// Trimmed, non-empty id for `provider`, matching the key case-insensitively.
    pub fn provider_id(&self, provider: &str) -> Option<&str> {
        self.provider_ids
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(provider))
            .map(|(_, value)| value.trim())
            .filter(|value| !value.is_empty())
    }
}

/// A collection (box set) as listed by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSummary {
    pub id: String,
    pub name: String,
}

/// Basic server identity, used as a reachability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    pub server_name: String,
    pub version: Option<String>,
}

/// Media server operations needed to mirror lists into collections.
///
/// Collection membership is additive: there is deliberately no removal call.
#[async_trait]
pub trait MediaServer: Send + Sync {
    /// Fetch server identity. Fails when the server is unreachable or
    /// rejects the credentials.
    async fn server_info(&self) -> Result<ServerInfo>;

    /// List every item of `kind`, with provider ids, in one request.
    async fn list_items(&self, kind: ItemKind) -> Result<Vec<LibraryItem>>;

    /// List every collection in the library.
    async fn list_collections(&self) -> Result<Vec<CollectionSummary>>;

    /// Create a collection holding all `item_ids` in a single call.
    ///
    /// Returns the new id when the server reports it.
    async fn create_collection(&self, name: &str, item_ids: &[String]) -> Result<Option<String>>;

    /// Create a collection seeded with a single item.
    async fn create_collection_with_item(&self, name: &str, item_id: &str)
        -> Result<Option<String>>;

    /// Add one item to an existing collection.
    async fn add_to_collection(&self, collection_id: &str, item_id: &str) -> Result<()>;
}
