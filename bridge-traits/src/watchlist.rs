//! Remote Watch-List Abstraction

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::error::Result;
use crate::media::ItemKind;

/// One entry of a remote list, exactly as the list service describes it.
///
/// Identifier values are kept raw; the sync engine normalizes them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteListEntry {
    pub kind: ItemKind,
    pub title: String,
    pub year: Option<i32>,
    pub identifiers: HashMap<String, serde_json::Value>,
}

impl RemoteListEntry {
    pub fn new(kind: ItemKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            year: None,
            identifiers: HashMap::new(),
        }
    }

    pub fn with_year(mut self, year: i32) -> Self {
        self.year = Some(year);
        self
    }

    pub fn with_identifier(
        mut self,
        provider: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.identifiers.insert(provider.into(), value.into());
        self
    }

    /// `Title (Year)` for diagnostics.
    pub fn label(&self) -> String {
        match self.year {
            Some(year) => format!("{} ({})", self.title, year),
            None => self.title.clone(),
        }
    }
}

/// Source of remote lists.
#[async_trait]
pub trait WatchlistSource: Send + Sync {
    /// Fetch every entry of `list_id` using the given bearer token.
    async fn list_entries(&self, list_id: &str, access_token: &str)
        -> Result<Vec<RemoteListEntry>>;
}
