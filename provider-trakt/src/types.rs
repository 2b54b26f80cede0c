//! Trakt API response types

use serde::Deserialize;
use std::collections::HashMap;

/// One row of `GET /lists/{id}/items`.
///
/// The media object sits under a key named after the entry type; season and
/// episode rows also carry their parent `show`.
#[derive(Debug, Clone, Deserialize)]
pub struct ListItem {
    #[serde(rename = "type")]
    pub item_type: String,

    #[serde(default)]
    pub movie: Option<MediaObject>,

    #[serde(default)]
    pub show: Option<MediaObject>,
}

impl ListItem {
    pub fn is_movie(&self) -> bool {
        self.item_type == "movie"
    }

    /// The object the entry resolves to: `movie` for movies, `show` otherwise.
    pub fn media(&self) -> Option<&MediaObject> {
        if self.is_movie() {
            self.movie.as_ref()
        } else {
            self.show.as_ref()
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MediaObject {
    #[serde(default)]
    pub title: Option<String>,

    #[serde(default)]
    pub year: Option<i32>,

    /// `trakt`, `slug`, `imdb`, `tmdb`, `tvdb`; values are strings, numbers or null
    #[serde(default)]
    pub ids: HashMap<String, serde_json::Value>,
}
