//! # Library Cache
//!
//! Holds one complete catalog snapshot per item kind. A snapshot is stored
//! only after a successful listing and is replaced wholesale; readers get a
//! shared `Arc` so concurrent resolution never observes a partial update.

use bridge_traits::media::{ItemKind, LibraryItem, MediaServer};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, instrument, warn};

pub type Catalog = Arc<Vec<LibraryItem>>;

pub struct LibraryCache {
    server: Arc<dyn MediaServer>,
    entries: RwLock<HashMap<ItemKind, Catalog>>,
    /// Serializes fetches so one kind is never listed twice concurrently
    fetch_lock: Mutex<()>,
}

impl LibraryCache {
    pub fn new(server: Arc<dyn MediaServer>) -> Self {
        Self {
            server,
            entries: RwLock::new(HashMap::new()),
            fetch_lock: Mutex::new(()),
        }
    }

    /// Catalog for `kind`, listing it from the server when absent or when
    /// `force_refresh` is set.
    ///
    /// A failed listing yields an empty catalog and leaves the cache
    /// untouched, so the next call retries.
    #[instrument(skip(self))]
    pub async fn fetch(&self, kind: ItemKind, force_refresh: bool) -> Catalog {
        if !force_refresh {
            if let Some(catalog) = self.cached(kind).await {
                return catalog;
            }
        }

        let _guard = self.fetch_lock.lock().await;

        // another caller may have filled it while we waited
        if !force_refresh {
            if let Some(catalog) = self.cached(kind).await {
                return catalog;
            }
        }

        match self.server.list_items(kind).await {
            Ok(items) => {
                info!(kind = %kind, count = items.len(), "Library catalog loaded");
                let catalog = Arc::new(items);
                self.entries.write().await.insert(kind, Arc::clone(&catalog));
                catalog
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Failed to load library catalog");
                Arc::new(Vec::new())
            }
        }
    }

    /// Cached catalog for `kind` without touching the server.
    pub async fn cached(&self, kind: ItemKind) -> Option<Catalog> {
        self.entries.read().await.get(&kind).cloned()
    }

    pub async fn is_populated(&self, kind: ItemKind) -> bool {
        self.entries.read().await.contains_key(&kind)
    }

    /// Drop every cached catalog.
    pub async fn invalidate(&self) {
        self.entries.write().await.clear();
        debug!("Library cache cleared");
    }
}
