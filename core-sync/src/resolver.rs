//! # Item Resolver
//!
//! Maps a list entry to a library item by exact provider-id equality, trying
//! providers in a fixed, kind-specific order. Titles and years are only used
//! in log lines.
//!
//! The resolver only reads catalogs already held by the [`LibraryCache`]; it
//! never lists the server itself. Callers load both kinds before fanning out,
//! and a kind that failed to load resolves against an empty catalog.

use async_trait::async_trait;
use bridge_traits::media::{ItemKind, LibraryItem};
use bridge_traits::watchlist::RemoteListEntry;
use std::sync::Arc;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::identifiers::{normalize, IdProvider};
use crate::library_cache::LibraryCache;

const MOVIE_PRIORITY: [IdProvider; 2] = [IdProvider::Imdb, IdProvider::Tmdb];
const SHOW_PRIORITY: [IdProvider; 3] = [IdProvider::Tvdb, IdProvider::Tmdb, IdProvider::Imdb];

/// Provider lookup order for `kind`; the first hit wins.
pub fn provider_priority(kind: ItemKind) -> &'static [IdProvider] {
    match kind {
        ItemKind::Movie => &MOVIE_PRIORITY,
        ItemKind::Show => &SHOW_PRIORITY,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedMatch {
    pub item_id: String,
    pub kind: ItemKind,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    Matched(ResolvedMatch),
    NotFound,
}

/// Resolves one list entry. Implementations must be safe to call from many
/// tasks at once.
#[async_trait]
pub trait EntryResolver: Send + Sync {
    async fn resolve(&self, entry: &RemoteListEntry) -> Result<Resolution>;
}

pub struct ItemResolver {
    cache: Arc<LibraryCache>,
}

impl ItemResolver {
    pub fn new(cache: Arc<LibraryCache>) -> Self {
        Self { cache }
    }

    fn find<'a>(items: &'a [LibraryItem], provider: IdProvider, id: &str) -> Option<&'a LibraryItem> {
        items
            .iter()
            .find(|item| item.provider_id(provider.library_key()) == Some(id))
    }
}

#[async_trait]
impl EntryResolver for ItemResolver {
    #[instrument(skip(self, entry), fields(entry = %entry.label(), kind = %entry.kind))]
    async fn resolve(&self, entry: &RemoteListEntry) -> Result<Resolution> {
        let ids = normalize(&entry.identifiers);
        if ids.is_empty() {
            debug!("No provider ids, skipping lookup");
            return Ok(Resolution::NotFound);
        }

        let items = self.cache.cached(entry.kind).await.unwrap_or_default();

        for provider in provider_priority(entry.kind) {
            let Some(id) = ids.get(*provider) else {
                continue;
            };
            if let Some(item) = Self::find(&items, *provider, id) {
                debug!(provider = %provider, item_id = %item.id, "Matched {}", item.name);
                return Ok(Resolution::Matched(ResolvedMatch {
                    item_id: item.id.clone(),
                    kind: entry.kind,
                }));
            }
        }

        debug!(ids = %ids, "No provider id matched");
        Ok(Resolution::NotFound)
    }
}
