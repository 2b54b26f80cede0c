//! # Identifier Normalizer
//!
//! Turns the raw `ids` object of a list entry into trimmed strings keyed by
//! a fixed set of external databases.

use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;

/// External databases used to cross-reference titles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IdProvider {
    /// IMDb, the primary database
    Imdb,
    /// TMDb, the secondary database
    Tmdb,
    /// TheTVDB
    Tvdb,
}

impl IdProvider {
    pub const ALL: [IdProvider; 3] = [IdProvider::Imdb, IdProvider::Tmdb, IdProvider::Tvdb];

    /// Key used by the list service (`ids.imdb`).
    pub fn list_key(&self) -> &'static str {
        match self {
            IdProvider::Imdb => "imdb",
            IdProvider::Tmdb => "tmdb",
            IdProvider::Tvdb => "tvdb",
        }
    }

    /// Key used by the media server (`ProviderIds.Imdb`).
    pub fn library_key(&self) -> &'static str {
        match self {
            IdProvider::Imdb => "Imdb",
            IdProvider::Tmdb => "Tmdb",
            IdProvider::Tvdb => "Tvdb",
        }
    }
}

impl fmt::Display for IdProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.list_key())
    }
}

/// Trimmed, non-empty ids for the providers an entry actually carries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NormalizedIdentifiers {
    ids: BTreeMap<IdProvider, String>,
}

impl NormalizedIdentifiers {
    pub fn get(&self, provider: IdProvider) -> Option<&str> {
        self.ids.get(&provider).map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (IdProvider, &str)> {
        self.ids.iter().map(|(provider, id)| (*provider, id.as_str()))
    }
}

impl fmt::Display for NormalizedIdentifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .iter()
            .map(|(provider, id)| format!("{}={}", provider, id))
            .collect();
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Normalize a raw identifier mapping.
///
/// Keys are matched case-insensitively. Strings are trimmed and numbers
/// stringified; blank strings, zero, null and structured values are omitted.
/// Never fails.
pub fn normalize(raw: &HashMap<String, Value>) -> NormalizedIdentifiers {
    let mut ids = BTreeMap::new();

    for provider in IdProvider::ALL {
        let value = raw
            .iter()
            .find(|(key, _)| key.trim().eq_ignore_ascii_case(provider.list_key()))
            .and_then(|(_, value)| stringify(value));

        if let Some(id) = value {
            ids.insert(provider, id);
        }
    }

    NormalizedIdentifiers { ids }
}

fn stringify(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => {
            let text = n.to_string();
            (text != "0").then_some(text)
        }
        _ => None,
    }
}
