//! Emby API response types

use serde::Deserialize;
use std::collections::HashMap;

/// `GET /Items` response envelope
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ItemsResponse {
    #[serde(default)]
    pub items: Vec<EmbyItem>,
}

/// Item resource; only the fields requested via `Fields` are populated
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EmbyItem {
    pub id: String,

    #[serde(default)]
    pub name: String,

    #[serde(default)]
    pub production_year: Option<i32>,

    /// Provider name (`Imdb`, `Tmdb`, `Tvdb`, ...) to id
    #[serde(default)]
    pub provider_ids: HashMap<String, String>,
}

/// `GET /System/Info`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SystemInfo {
    #[serde(default)]
    pub server_name: String,

    #[serde(default)]
    pub version: Option<String>,
}

/// Body returned by collection creation, when there is one
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CreatedCollection {
    #[serde(default)]
    pub id: Option<String>,
}
