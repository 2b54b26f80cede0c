//! # Sync Orchestrator
//!
//! Runs the reconciliation pipeline for every configured list, one list at a
//! time.
//!
//! ## Workflow
//!
//! ### Run (`sync_all`)
//! 1. Check required configuration (no network calls when incomplete)
//! 2. Clear the library cache
//! 3. Obtain an access token (refresh, then device authorization)
//! 4. Sync each list in order; a failed list does not stop the run
//!
//! ### List (`sync_list`)
//! 1. Probe the media server
//! 2. Fetch the remote list
//! 3. Load both library catalogs
//! 4. Resolve entries concurrently
//! 5. Find or create the collection
//!
//! Every outcome, including failures, is reported through the progress
//! reporter.

use async_trait::async_trait;
use bridge_traits::media::{ItemKind, MediaServer};
use bridge_traits::watchlist::WatchlistSource;
use core_auth::TokenProvider;
use core_runtime::config::{AppConfig, ListMapping};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::collection::{CollectionManager, CollectionSpec};
use crate::driver::{MediaCounts, ReconciliationDriver};
use crate::error::{Result, SyncError};
use crate::library_cache::LibraryCache;
use crate::progress::{ProgressCallback, ProgressReporter};
use crate::resolver::{EntryResolver, ItemResolver};
use crate::scheduler::ScheduledTask;

pub const CONFIGURATION_ERROR: &str = "Configuration Error";
pub const AUTHENTICATION_ERROR: &str = "Authentication Error";

/// Result of one successfully mirrored list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListReport {
    pub list_name: String,
    pub collection_id: String,
    pub counts: MediaCounts,
    pub unmatched: usize,
    pub failed: usize,
    pub total: usize,
    pub created: bool,
    /// Items the collection step confirmed; zero for an existing collection
    pub added: usize,
    /// Matched items handed to the collection step
    pub requested: usize,
}

/// Totals for one `sync_all` run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub run_id: String,
    pub lists_synced: usize,
    pub lists_failed: usize,
    pub reports: Vec<ListReport>,
}

pub struct SyncOrchestrator {
    config: AppConfig,
    source: Arc<dyn WatchlistSource>,
    server: Arc<dyn MediaServer>,
    tokens: Arc<dyn TokenProvider>,
    cache: Arc<LibraryCache>,
    driver: ReconciliationDriver,
    collections: CollectionManager,
    event_bus: Option<EventBus>,
}

impl SyncOrchestrator {
    pub fn new(
        config: AppConfig,
        source: Arc<dyn WatchlistSource>,
        server: Arc<dyn MediaServer>,
        tokens: Arc<dyn TokenProvider>,
    ) -> Self {
        let cache = Arc::new(LibraryCache::new(Arc::clone(&server)));
        let resolver: Arc<dyn EntryResolver> = Arc::new(ItemResolver::new(Arc::clone(&cache)));
        let driver = ReconciliationDriver::new(resolver).with_concurrency(config.sync.concurrency);
        let collections = CollectionManager::new(Arc::clone(&server))
            .with_strategy(config.sync.collection_strategy);

        Self {
            config,
            source,
            server,
            tokens,
            cache,
            driver,
            collections,
            event_bus: None,
        }
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Replace the resolver used by the driver, keeping the pool width.
    pub fn with_resolver(mut self, resolver: Arc<dyn EntryResolver>) -> Self {
        self.driver = ReconciliationDriver::new(resolver).with_concurrency(self.driver.concurrency());
        self
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.collections = CollectionManager::new(Arc::clone(&self.server))
            .with_strategy(self.config.sync.collection_strategy)
            .with_settle_delay(delay);
        self
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn library_cache(&self) -> &Arc<LibraryCache> {
        &self.cache
    }

    pub async fn clear_library_cache(&self) {
        self.cache.invalidate().await;
    }

    /// Progress reporter wired to this orchestrator's event bus.
    pub fn reporter(&self, callback: Option<ProgressCallback>) -> ProgressReporter {
        let mut reporter = ProgressReporter::new();
        if let Some(callback) = callback {
            reporter = reporter.with_callback(callback);
        }
        if let Some(bus) = &self.event_bus {
            reporter = reporter.with_event_bus(bus.clone());
        }
        reporter
    }

    fn emit(&self, event: SyncEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(event)).ok();
        }
    }

    fn check_configuration(&self, progress: &ProgressReporter) -> Result<()> {
        let missing = self.config.missing_required();
        if missing.is_empty() {
            return Ok(());
        }

        let error = SyncError::Configuration { missing };
        warn!("{}", error);
        progress.report(1.0, CONFIGURATION_ERROR, 0, 0, error.to_string());
        Err(error)
    }

    /// Sync every configured list in order.
    #[instrument(skip(self, progress))]
    pub async fn sync_all(&self, progress: &ProgressReporter) -> Result<RunSummary> {
        self.check_configuration(progress)?;

        self.cache.invalidate().await;

        let access_token = match self.tokens.access_token().await {
            Ok(token) => token,
            Err(e) => {
                let error = SyncError::Authentication(e);
                error!("{}", error);
                progress.report(1.0, AUTHENTICATION_ERROR, 0, 0, error.to_string());
                return Err(error);
            }
        };

        let run_id = Uuid::new_v4().to_string();
        let started = Instant::now();
        let lists: Vec<&ListMapping> = self
            .config
            .lists
            .iter()
            .filter(|mapping| {
                let complete = mapping.is_complete();
                if !complete {
                    warn!(?mapping, "Skipping list mapping without id or collection name");
                }
                complete
            })
            .collect();

        info!(run_id = %run_id, lists = lists.len(), "Sync run started");
        self.emit(SyncEvent::RunStarted {
            run_id: run_id.clone(),
            list_count: lists.len(),
        });

        let mut summary = RunSummary {
            run_id: run_id.clone(),
            lists_synced: 0,
            lists_failed: 0,
            reports: Vec::with_capacity(lists.len()),
        };

        for mapping in lists {
            match self.sync_list(mapping, &access_token, progress).await {
                Ok(report) => {
                    self.emit(SyncEvent::ListCompleted {
                        list_name: report.list_name.clone(),
                        collection_id: report.collection_id.clone(),
                        movies: report.counts.movies,
                        shows: report.counts.shows,
                        unmatched: report.unmatched,
                    });
                    summary.lists_synced += 1;
                    summary.reports.push(report);
                }
                Err(e) => {
                    warn!(list = %mapping.collection_name, error = %e, "List sync failed");
                    self.emit(SyncEvent::ListFailed {
                        list_name: mapping.collection_name.clone(),
                        message: e.to_string(),
                    });
                    summary.lists_failed += 1;
                }
            }
        }

        let duration_secs = started.elapsed().as_secs();
        info!(
            run_id = %run_id,
            synced = summary.lists_synced,
            failed = summary.lists_failed,
            duration_secs,
            "Sync run completed"
        );
        self.emit(SyncEvent::RunCompleted {
            run_id,
            lists_synced: summary.lists_synced,
            lists_failed: summary.lists_failed,
            duration_secs,
        });

        Ok(summary)
    }

    /// Mirror one list into its collection.
    #[instrument(skip(self, access_token, progress), fields(list = %mapping.collection_name))]
    pub async fn sync_list(
        &self,
        mapping: &ListMapping,
        access_token: &str,
        progress: &ProgressReporter,
    ) -> Result<ListReport> {
        self.check_configuration(progress)?;

        let name = mapping.collection_name.as_str();
        progress.report(0.0, name, 0, 0, format!("Starting sync for list: {}", name));

        match self.server.server_info().await {
            Ok(info) => info!("Connected to Emby server: {}", info.server_name),
            Err(e) => {
                let message = match e.status() {
                    Some(401) => "Cannot connect to Emby server: HTTP 401 - Authentication failed. Please check your API key.".to_string(),
                    Some(status) => format!("Cannot connect to Emby server: HTTP {}", status),
                    None => format!("Error connecting to Emby server: {}", e),
                };
                progress.report(1.0, name, 0, 0, message.clone());
                return Err(SyncError::ServerUnreachable(message));
            }
        }

        let entries = match self.source.list_entries(&mapping.list_id, access_token).await {
            Ok(entries) if !entries.is_empty() => entries,
            Ok(_) => {
                progress.report(1.0, name, 0, 0, format!("No items found in Trakt list: {}", name));
                return Err(SyncError::ListFetch {
                    list: name.to_string(),
                    reason: "list is empty".to_string(),
                });
            }
            Err(e) => {
                progress.report(1.0, name, 0, 0, format!("No items found in Trakt list: {}", name));
                return Err(SyncError::ListFetch {
                    list: name.to_string(),
                    reason: e.to_string(),
                });
            }
        };

        let total = entries.len();
        progress.report(0.0, name, 0, total, format!("Found {} items in Trakt list", total));

        progress.report(0.0, name, 0, total, "Loading Emby library data...");
        let movies = self.cache.fetch(ItemKind::Movie, false).await;
        let shows = self.cache.fetch(ItemKind::Show, false).await;
        progress.report(
            0.0,
            name,
            0,
            total,
            format!("Loaded {} movies and {} TV shows from Emby", movies.len(), shows.len()),
        );

        let outcome = self.driver.reconcile(name, entries, progress).await;

        if outcome.is_empty() {
            progress.report(
                1.0,
                name,
                total,
                total,
                format!("No matching items found in Emby for {}", name),
            );
            return Err(SyncError::NothingToAdd {
                name: name.to_string(),
            });
        }

        progress.report(
            0.95,
            name,
            outcome.processed,
            total,
            format!("Creating/updating Emby collection: {}", name),
        );

        let mut spec = CollectionSpec::new(name, outcome.matched_ids.clone());
        spec.kind = match (outcome.counts.movies, outcome.counts.shows) {
            (_, 0) => Some(ItemKind::Movie),
            (0, _) => Some(ItemKind::Show),
            _ => None,
        };

        match self.collections.ensure_collection(&spec).await {
            Ok(collection) => {
                progress.report(
                    1.0,
                    name,
                    total,
                    total,
                    format!(
                        "Successfully created/updated collection '{}' (ID: {})",
                        name, collection.collection_id
                    ),
                );
                if collection.was_created() {
                    progress.report(
                        1.0,
                        name,
                        total,
                        total,
                        format!(
                            "Added {} of {} items to collection '{}'",
                            collection.added, collection.requested, name
                        ),
                    );
                    if collection.added < collection.requested {
                        warn!(
                            added = collection.added,
                            requested = collection.requested,
                            "Collection created with missing items"
                        );
                    }
                }
                progress.report(
                    1.0,
                    name,
                    total,
                    total,
                    format!(
                        "Added to {}: {} movies, {} TV shows",
                        name, outcome.counts.movies, outcome.counts.shows
                    ),
                );

                Ok(ListReport {
                    list_name: name.to_string(),
                    created: collection.was_created(),
                    added: collection.added,
                    requested: collection.requested,
                    collection_id: collection.collection_id,
                    counts: outcome.counts,
                    unmatched: outcome.unmatched,
                    failed: outcome.failed,
                    total,
                })
            }
            Err(e) => {
                error!("{}", e);
                progress.report(
                    1.0,
                    name,
                    outcome.processed,
                    total,
                    format!("Failed to create/update collection: {}", name),
                );
                Err(e)
            }
        }
    }
}

#[async_trait]
impl ScheduledTask for SyncOrchestrator {
    async fn run_scheduled(&self) {
        let progress = self.reporter(None);
        if let Err(e) = self.sync_all(&progress).await {
            error!("Scheduled sync failed: {}", e);
        }
    }
}
