//! # Collection Manager
//!
//! Finds or creates the collection a list is mirrored into.
//!
//! ## Workflow
//!
//! 1. Case-insensitive name lookup among existing collections; a hit is
//!    returned as is (membership is additive, nothing is removed).
//! 2. Otherwise each configured creation strategy is tried in order:
//!    - `Bulk`: create with every id in one call
//!    - `CreateThenAdd`: create with the first id, then add the rest one by
//!      one, tolerating individual add failures
//! 3. When every strategy fails the list fails with
//!    `SyncError::CollectionCreationFailed`.
//!
//! When the server does not return the new id, the manager waits a short
//! settle delay and looks the collection up by name, up to
//! [`CONFIRM_ATTEMPTS`] times. If a bulk create was accepted but the
//! collection never shows up, `Auto` still falls back to `CreateThenAdd`,
//! which may leave two collections with the same name on the server.

use bridge_traits::media::{CollectionSummary, ItemKind, MediaServer};
use core_runtime::config::CollectionStrategyMode;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

use crate::error::{Result, SyncError};

/// Wait before looking up a collection the server created without echoing its id.
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(1);

/// Name lookups made after a create that returned no id.
pub const CONFIRM_ATTEMPTS: u32 = 3;

static AUTO_STRATEGIES: [CreationStrategy; 2] =
    [CreationStrategy::Bulk, CreationStrategy::CreateThenAdd];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreationStrategy {
    Bulk,
    CreateThenAdd,
}

impl CreationStrategy {
    /// Strategies to try, in order, for a configured mode.
    pub fn table(mode: CollectionStrategyMode) -> &'static [CreationStrategy] {
        match mode {
            CollectionStrategyMode::Auto => &AUTO_STRATEGIES,
            CollectionStrategyMode::Bulk => &AUTO_STRATEGIES[..1],
            CollectionStrategyMode::Incremental => &AUTO_STRATEGIES[1..],
        }
    }
}

impl fmt::Display for CreationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CreationStrategy::Bulk => f.write_str("bulk create"),
            CreationStrategy::CreateThenAdd => f.write_str("create then add"),
        }
    }
}

/// Desired collection: a name and the library ids it should contain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionSpec {
    pub name: String,
    /// Set when every item shares one kind; lists may mix movies and shows
    pub kind: Option<ItemKind>,
    pub item_ids: Vec<String>,
}

impl CollectionSpec {
    pub fn new(name: impl Into<String>, item_ids: Vec<String>) -> Self {
        Self {
            name: name.into(),
            kind: None,
            item_ids,
        }
    }

    pub fn with_kind(mut self, kind: ItemKind) -> Self {
        self.kind = Some(kind);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectionOutcome {
    pub collection_id: String,
    /// `None` when an existing collection was found
    pub created_with: Option<CreationStrategy>,
    /// Items confirmed in the collection by this call
    pub added: usize,
    pub requested: usize,
}

impl CollectionOutcome {
    pub fn was_created(&self) -> bool {
        self.created_with.is_some()
    }
}

pub struct CollectionManager {
    server: Arc<dyn MediaServer>,
    strategies: &'static [CreationStrategy],
    settle_delay: Duration,
}

impl CollectionManager {
    pub fn new(server: Arc<dyn MediaServer>) -> Self {
        Self {
            server,
            strategies: CreationStrategy::table(CollectionStrategyMode::Auto),
            settle_delay: DEFAULT_SETTLE_DELAY,
        }
    }

    pub fn with_strategy(mut self, mode: CollectionStrategyMode) -> Self {
        self.strategies = CreationStrategy::table(mode);
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Existing collection whose name equals `name` ignoring case.
    pub async fn find_collection(&self, name: &str) -> Result<Option<CollectionSummary>> {
        let wanted = name.to_lowercase();
        let collections = self.server.list_collections().await?;
        Ok(collections
            .into_iter()
            .find(|collection| collection.name.to_lowercase() == wanted))
    }

    #[instrument(skip(self, spec), fields(collection = %spec.name, items = spec.item_ids.len()))]
    pub async fn ensure_collection(&self, spec: &CollectionSpec) -> Result<CollectionOutcome> {
        let requested = spec.item_ids.len();
        if requested == 0 {
            return Err(SyncError::NothingToAdd {
                name: spec.name.clone(),
            });
        }

        match self.find_collection(&spec.name).await {
            Ok(Some(existing)) => {
                info!("Collection '{}' already exists with ID: {}", existing.name, existing.id);
                return Ok(CollectionOutcome {
                    collection_id: existing.id,
                    created_with: None,
                    added: 0,
                    requested,
                });
            }
            Ok(None) => debug!("No existing collection named '{}'", spec.name),
            Err(e) => warn!("Collection lookup failed, attempting creation: {}", e),
        }

        for strategy in self.strategies {
            match self.create(*strategy, spec).await {
                Ok(outcome) => {
                    info!(
                        "Created collection '{}' with ID {} ({}): {} of {} items",
                        spec.name, outcome.collection_id, strategy, outcome.added, requested
                    );
                    return Ok(outcome);
                }
                Err(e) => warn!("{} failed for '{}': {}", strategy, spec.name, e),
            }
        }

        Err(SyncError::CollectionCreationFailed {
            name: spec.name.clone(),
        })
    }

    async fn create(&self, strategy: CreationStrategy, spec: &CollectionSpec) -> Result<CollectionOutcome> {
        let requested = spec.item_ids.len();
        match strategy {
            CreationStrategy::Bulk => {
                let returned = self.server.create_collection(&spec.name, &spec.item_ids).await?;
                let collection_id = self.confirm_id(&spec.name, returned).await?;
                Ok(CollectionOutcome {
                    collection_id,
                    created_with: Some(strategy),
                    added: requested,
                    requested,
                })
            }
            CreationStrategy::CreateThenAdd => {
                let (first, rest) = spec.item_ids.split_first().ok_or_else(|| SyncError::NothingToAdd {
                    name: spec.name.clone(),
                })?;

                let returned = self
                    .server
                    .create_collection_with_item(&spec.name, first)
                    .await?;
                let collection_id = self.confirm_id(&spec.name, returned).await?;

                let mut added = 1;
                for item_id in rest {
                    match self.server.add_to_collection(&collection_id, item_id).await {
                        Ok(()) => added += 1,
                        Err(e) => warn!("Failed to add item {} to '{}': {}", item_id, spec.name, e),
                    }
                }
                info!("Added {} of {} items to collection", added, requested);

                Ok(CollectionOutcome {
                    collection_id,
                    created_with: Some(strategy),
                    added,
                    requested,
                })
            }
        }
    }

    /// Use the id the server returned, or find the new collection by name.
    async fn confirm_id(&self, name: &str, returned: Option<String>) -> Result<String> {
        if let Some(id) = returned {
            return Ok(id);
        }

        for attempt in 1..=CONFIRM_ATTEMPTS {
            tokio::time::sleep(self.settle_delay * attempt).await;
            match self.find_collection(name).await {
                Ok(Some(collection)) => return Ok(collection.id),
                Ok(None) => debug!(attempt, "Collection '{}' not visible yet", name),
                Err(e) => warn!(attempt, "Collection lookup failed: {}", e),
            }
        }

        warn!(
            "Server accepted '{}' but it never appeared after {} lookups",
            name, CONFIRM_ATTEMPTS
        );
        Err(SyncError::CollectionCreationFailed {
            name: name.to_string(),
        })
    }
}
