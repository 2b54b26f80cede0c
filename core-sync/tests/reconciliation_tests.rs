//! Integration tests for the reconciliation engine
//!
//! These tests drive the engine against in-memory fakes of the media server,
//! the list service and the token provider:
//! - Resolution priority and empty-identifier short-circuit
//! - Partial-failure tolerance and progress monotonicity in the driver
//! - Collection find-or-create, fallback creation and idempotence
//! - Orchestrator milestones, configuration and authentication failures

use async_trait::async_trait;
use bridge_traits::{
    error::{BridgeError, Result as BridgeResult},
    media::{CollectionSummary, ItemKind, LibraryItem, MediaServer, ServerInfo},
    watchlist::{RemoteListEntry, WatchlistSource},
};
use core_auth::{AuthError, TokenProvider};
use core_runtime::config::{AppConfig, CollectionStrategyMode, ListMapping};
use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use core_sync::{
    normalize, CollectionManager, CollectionSpec, CreationStrategy, EntryResolver, IdProvider,
    ItemResolver, LibraryCache, ProgressReporter, ReconciliationDriver, Resolution,
    ResolvedMatch, SyncError, SyncOrchestrator, SyncProgress,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ============================================================================
// Fakes
// ============================================================================

#[derive(Default)]
struct FakeServer {
    catalog: Mutex<HashMap<ItemKind, Vec<LibraryItem>>>,
    collections: Mutex<Vec<CollectionSummary>>,
    members: Mutex<HashMap<String, Vec<String>>>,
    info_status: Mutex<Option<u16>>,
    bulk_fails: Mutex<bool>,
    echo_ids: Mutex<bool>,
    failing_adds: Mutex<HashSet<String>>,
    catalog_fails: Mutex<bool>,
    /// Collection listings that still come back empty
    hidden_listings: AtomicUsize,
    listings: AtomicUsize,
    creates: AtomicUsize,
    adds: AtomicUsize,
}

impl FakeServer {
    fn new() -> Arc<Self> {
        let server = Self::default();
        *server.echo_ids.lock().unwrap() = true;
        Arc::new(server)
    }

    fn with_items(self: Arc<Self>, items: Vec<LibraryItem>) -> Arc<Self> {
        {
            let mut catalog = self.catalog.lock().unwrap();
            for item in items {
                catalog.entry(item.kind).or_default().push(item);
            }
        }
        self
    }

    fn insert_collection(&self, name: &str, items: &[String]) -> String {
        let mut collections = self.collections.lock().unwrap();
        let id = format!("col-{}", collections.len() + 1);
        collections.push(CollectionSummary {
            id: id.clone(),
            name: name.to_string(),
        });
        self.members
            .lock()
            .unwrap()
            .insert(id.clone(), items.to_vec());
        id
    }

    fn echo(&self, id: String) -> Option<String> {
        if *self.echo_ids.lock().unwrap() {
            Some(id)
        } else {
            None
        }
    }
}

#[async_trait]
impl MediaServer for FakeServer {
    async fn server_info(&self) -> BridgeResult<ServerInfo> {
        match *self.info_status.lock().unwrap() {
            Some(401) => Err(BridgeError::Unauthorized("bad key".into())),
            Some(status) => Err(BridgeError::Status {
                status,
                message: "error".into(),
            }),
            None => Ok(ServerInfo {
                server_name: "fake".into(),
                version: None,
            }),
        }
    }

    async fn list_items(&self, kind: ItemKind) -> BridgeResult<Vec<LibraryItem>> {
        self.listings.fetch_add(1, Ordering::SeqCst);
        if *self.catalog_fails.lock().unwrap() {
            return Err(BridgeError::Status {
                status: 500,
                message: "catalog unavailable".into(),
            });
        }
        Ok(self
            .catalog
            .lock()
            .unwrap()
            .get(&kind)
            .cloned()
            .unwrap_or_default())
    }

    async fn list_collections(&self) -> BridgeResult<Vec<CollectionSummary>> {
        let hidden = self
            .hidden_listings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
        if hidden.is_ok() {
            return Ok(Vec::new());
        }
        Ok(self.collections.lock().unwrap().clone())
    }

    async fn create_collection(&self, name: &str, item_ids: &[String]) -> BridgeResult<Option<String>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        if *self.bulk_fails.lock().unwrap() {
            return Err(BridgeError::Status {
                status: 400,
                message: "bulk create unsupported".into(),
            });
        }
        let id = self.insert_collection(name, item_ids);
        Ok(self.echo(id))
    }

    async fn create_collection_with_item(&self, name: &str, item_id: &str) -> BridgeResult<Option<String>> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        let id = self.insert_collection(name, &[item_id.to_string()]);
        Ok(self.echo(id))
    }

    async fn add_to_collection(&self, collection_id: &str, item_id: &str) -> BridgeResult<()> {
        self.adds.fetch_add(1, Ordering::SeqCst);
        if self.failing_adds.lock().unwrap().contains(item_id) {
            return Err(BridgeError::Status {
                status: 500,
                message: "add failed".into(),
            });
        }
        self.members
            .lock()
            .unwrap()
            .entry(collection_id.to_string())
            .or_default()
            .push(item_id.to_string());
        Ok(())
    }
}

#[derive(Default)]
struct FakeSource {
    lists: Mutex<HashMap<String, Vec<RemoteListEntry>>>,
    fetches: AtomicUsize,
}

impl FakeSource {
    fn with_list(self, list_id: &str, entries: Vec<RemoteListEntry>) -> Self {
        self.lists.lock().unwrap().insert(list_id.to_string(), entries);
        self
    }
}

#[async_trait]
impl WatchlistSource for FakeSource {
    async fn list_entries(&self, list_id: &str, access_token: &str) -> BridgeResult<Vec<RemoteListEntry>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        assert_eq!(access_token, "access-token");
        self.lists
            .lock()
            .unwrap()
            .get(list_id)
            .cloned()
            .ok_or_else(|| BridgeError::Status {
                status: 404,
                message: format!("no list {}", list_id),
            })
    }
}

struct FakeTokens {
    fail: bool,
}

#[async_trait]
impl TokenProvider for FakeTokens {
    async fn access_token(&self) -> core_auth::Result<String> {
        if self.fail {
            Err(AuthError::DeviceAuthorizationDenied)
        } else {
            Ok("access-token".to_string())
        }
    }
}

/// Fails or panics for selected titles, delegates otherwise.
struct FlakyResolver {
    inner: Arc<dyn EntryResolver>,
    fail: HashSet<String>,
    panic: HashSet<String>,
}

#[async_trait]
impl EntryResolver for FlakyResolver {
    async fn resolve(&self, entry: &RemoteListEntry) -> core_sync::Result<Resolution> {
        if self.panic.contains(&entry.title) {
            panic!("resolver blew up on {}", entry.title);
        }
        if self.fail.contains(&entry.title) {
            return Err(SyncError::Bridge(BridgeError::OperationFailed(format!(
                "lookup failed for {}",
                entry.title
            ))));
        }
        self.inner.resolve(entry).await
    }
}

// ============================================================================
// Helpers
// ============================================================================

fn movie(id: &str, imdb: &str, tmdb: &str) -> LibraryItem {
    LibraryItem::new(id, format!("Movie {}", id), ItemKind::Movie)
        .with_provider_id("Imdb", imdb)
        .with_provider_id("Tmdb", tmdb)
}

fn show(id: &str, tvdb: &str, tmdb: &str, imdb: &str) -> LibraryItem {
    LibraryItem::new(id, format!("Show {}", id), ItemKind::Show)
        .with_provider_id("Tvdb", tvdb)
        .with_provider_id("Tmdb", tmdb)
        .with_provider_id("Imdb", imdb)
}

fn movie_entry(title: &str, imdb: &str) -> RemoteListEntry {
    RemoteListEntry::new(ItemKind::Movie, title).with_identifier("imdb", imdb)
}

/// Resolver over a cache with both catalogs already loaded.
async fn loaded_resolver(server: Arc<FakeServer>) -> ItemResolver {
    let cache = Arc::new(LibraryCache::new(server));
    cache.fetch(ItemKind::Movie, false).await;
    cache.fetch(ItemKind::Show, false).await;
    ItemResolver::new(cache)
}

fn recorder() -> (ProgressReporter, Arc<Mutex<Vec<SyncProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let reporter = ProgressReporter::new()
        .with_callback(Arc::new(move |p: &SyncProgress| sink.lock().unwrap().push(p.clone())));
    (reporter, seen)
}

fn messages(seen: &Arc<Mutex<Vec<SyncProgress>>>) -> Vec<String> {
    seen.lock().unwrap().iter().map(|p| p.message.clone()).collect()
}

fn config(lists: &[(&str, &str)]) -> AppConfig {
    let lists_json = serde_json::to_string(
        &lists
            .iter()
            .map(|(id, name)| ListMapping::new(*id, *name))
            .collect::<Vec<_>>(),
    )
    .unwrap();
    let values: HashMap<&str, String> = [
        ("TRAKT_CLIENT_ID", "client".to_string()),
        ("TRAKT_CLIENT_SECRET", "secret".to_string()),
        ("EMBY_API_KEY", "key".to_string()),
        ("EMBY_SERVER", "http://emby.local".to_string()),
        ("EMBY_ADMIN_USER_ID", "admin".to_string()),
        ("EMBY_MOVIES_LIBRARY_ID", "1".to_string()),
        ("EMBY_TV_LIBRARY_ID", "2".to_string()),
        ("TRAKT_LISTS", lists_json),
    ]
    .into_iter()
    .collect();
    AppConfig::from_lookup(|key| values.get(key).cloned())
}

fn orchestrator(
    config: AppConfig,
    source: Arc<FakeSource>,
    server: Arc<FakeServer>,
    tokens_fail: bool,
) -> SyncOrchestrator {
    SyncOrchestrator::new(
        config,
        source,
        server,
        Arc::new(FakeTokens { fail: tokens_fail }),
    )
    .with_settle_delay(Duration::ZERO)
}

// ============================================================================
// Identifier normalization and resolution
// ============================================================================

#[test]
fn test_normalization_round_trip() {
    let raw = serde_json::from_value(serde_json::json!({ "imdb": " tt123 ", "tmdb": 456 })).unwrap();
    let ids = normalize(&raw);

    assert_eq!(ids.get(IdProvider::Imdb), Some("tt123"));
    assert_eq!(ids.get(IdProvider::Tmdb), Some("456"));
    assert_eq!(ids.get(IdProvider::Tvdb), None);
}

#[tokio::test]
async fn test_empty_identifiers_do_not_read_cache() {
    let server = FakeServer::new().with_items(vec![movie("1", "tt1", "10")]);
    let cache = Arc::new(LibraryCache::new(server.clone()));
    let resolver = ItemResolver::new(cache.clone());

    let entry = RemoteListEntry::new(ItemKind::Movie, "Mystery");
    assert_eq!(resolver.resolve(&entry).await.unwrap(), Resolution::NotFound);

    let blank = RemoteListEntry::new(ItemKind::Show, "Blank").with_identifier("tvdb", serde_json::Value::Null);
    assert_eq!(resolver.resolve(&blank).await.unwrap(), Resolution::NotFound);

    assert_eq!(server.listings.load(Ordering::SeqCst), 0);
    assert!(!cache.is_populated(ItemKind::Movie).await);
}

#[tokio::test]
async fn test_primary_id_wins_over_secondary() {
    let server = FakeServer::new().with_items(vec![
        movie("a", "tt0113277", "1"),
        movie("b", "tt9999999", "949"),
    ]);
    let resolver = loaded_resolver(server).await;

    // the secondary id points at a different movie; the primary id decides
    let entry = RemoteListEntry::new(ItemKind::Movie, "Heat")
        .with_year(1995)
        .with_identifier("imdb", "tt0113277")
        .with_identifier("tmdb", 949);

    assert_eq!(
        resolver.resolve(&entry).await.unwrap(),
        Resolution::Matched(ResolvedMatch {
            item_id: "a".to_string(),
            kind: ItemKind::Movie,
        })
    );
}

#[tokio::test]
async fn test_movie_falls_back_to_secondary_id() {
    let server = FakeServer::new().with_items(vec![movie("b", "", "949")]);
    let resolver = loaded_resolver(server).await;

    let entry = RemoteListEntry::new(ItemKind::Movie, "Heat")
        .with_identifier("imdb", "tt0113277")
        .with_identifier("tmdb", 949);

    assert!(matches!(
        resolver.resolve(&entry).await.unwrap(),
        Resolution::Matched(ResolvedMatch { ref item_id, .. }) if item_id == "b"
    ));
}

#[tokio::test]
async fn test_show_priority_prefers_tvdb() {
    let server = FakeServer::new().with_items(vec![
        show("by-imdb", "0", "0", "tt0306414"),
        show("by-tmdb", "0", "1438", "tt0"),
        show("by-tvdb", "79126", "5", "tt1"),
    ]);
    let resolver = loaded_resolver(server).await;

    let entry = RemoteListEntry::new(ItemKind::Show, "The Wire")
        .with_identifier("imdb", "tt0306414")
        .with_identifier("tmdb", 1438)
        .with_identifier("tvdb", 79126);
    assert!(matches!(
        resolver.resolve(&entry).await.unwrap(),
        Resolution::Matched(ResolvedMatch { ref item_id, .. }) if item_id == "by-tvdb"
    ));

    let without_tvdb = RemoteListEntry::new(ItemKind::Show, "The Wire")
        .with_identifier("imdb", "tt0306414")
        .with_identifier("tmdb", 1438);
    assert!(matches!(
        resolver.resolve(&without_tvdb).await.unwrap(),
        Resolution::Matched(ResolvedMatch { ref item_id, .. }) if item_id == "by-tmdb"
    ));

    let imdb_only = RemoteListEntry::new(ItemKind::Show, "The Wire").with_identifier("imdb", "tt0306414");
    assert!(matches!(
        resolver.resolve(&imdb_only).await.unwrap(),
        Resolution::Matched(ResolvedMatch { ref item_id, .. }) if item_id == "by-imdb"
    ));
}

#[tokio::test]
async fn test_resolver_never_lists_the_server() {
    let server = FakeServer::new().with_items(vec![movie("1", "tt1", "10")]);
    let cache = Arc::new(LibraryCache::new(server.clone()));
    let resolver = ItemResolver::new(cache.clone());

    // nothing loaded yet: resolves against an empty catalog
    assert_eq!(resolver.resolve(&movie_entry("One", "tt1")).await.unwrap(), Resolution::NotFound);
    assert_eq!(server.listings.load(Ordering::SeqCst), 0);

    cache.fetch(ItemKind::Movie, false).await;
    assert!(matches!(
        resolver.resolve(&movie_entry("One", "tt1")).await.unwrap(),
        Resolution::Matched(ResolvedMatch { ref item_id, .. }) if item_id == "1"
    ));
    assert_eq!(server.listings.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_kinds_do_not_cross_match() {
    let server = FakeServer::new().with_items(vec![movie("m", "tt0306414", "1")]);
    let resolver = loaded_resolver(server).await;

    let entry = RemoteListEntry::new(ItemKind::Show, "The Wire").with_identifier("imdb", "tt0306414");
    assert_eq!(resolver.resolve(&entry).await.unwrap(), Resolution::NotFound);
}

// ============================================================================
// Reconciliation driver
// ============================================================================

#[tokio::test]
async fn test_three_entry_scenario() {
    let server = FakeServer::new().with_items(vec![movie("1", "tt1", "10"), movie("2", "tt2", "20")]);
    let cache = Arc::new(LibraryCache::new(server));
    cache.fetch(ItemKind::Movie, false).await;
    cache.fetch(ItemKind::Show, false).await;
    let driver = ReconciliationDriver::new(Arc::new(ItemResolver::new(cache)));

    let entries = vec![
        movie_entry("One", "tt1"),
        movie_entry("Two", "tt2"),
        RemoteListEntry::new(ItemKind::Show, "Nameless"),
    ];
    let (reporter, _) = recorder();
    let outcome = driver.reconcile("Picks", entries, &reporter).await;

    assert_eq!(outcome.matched_ids.len(), 2);
    assert_eq!(outcome.counts.movies, 2);
    assert_eq!(outcome.counts.shows, 0);
    assert_eq!(outcome.unmatched, 1);
    assert_eq!(outcome.failed, 0);
}

#[tokio::test]
async fn test_partial_failures_are_tolerated() {
    let server = FakeServer::new().with_items(vec![
        movie("1", "tt1", "10"),
        movie("2", "tt2", "20"),
        movie("3", "tt3", "30"),
    ]);
    let resolver = Arc::new(FlakyResolver {
        inner: Arc::new(loaded_resolver(server).await),
        fail: ["Two".to_string()].into_iter().collect(),
        panic: ["Three".to_string()].into_iter().collect(),
    });
    let driver = ReconciliationDriver::new(resolver).with_concurrency(2);

    let entries = vec![
        movie_entry("One", "tt1"),
        movie_entry("Two", "tt2"),
        movie_entry("Three", "tt3"),
        movie_entry("Four", "tt404"),
    ];
    let (reporter, seen) = recorder();
    let outcome = driver.reconcile("Picks", entries, &reporter).await;

    assert_eq!(outcome.matched_ids, vec!["1".to_string()]);
    assert_eq!(outcome.failed, 2);
    assert_eq!(outcome.unmatched, 1);
    assert_eq!(outcome.processed, outcome.total);

    let errors: Vec<String> = messages(&seen)
        .into_iter()
        .filter(|m| m.starts_with("Error processing item: "))
        .collect();
    assert_eq!(errors.len(), 2);

    let last = seen.lock().unwrap().last().cloned().unwrap();
    assert_eq!(last.processed, 4);
    assert_eq!(last.total, 4);
    assert_eq!(last.fraction, 1.0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_progress_is_monotonic() {
    let items: Vec<LibraryItem> = (0..50)
        .map(|n| movie(&n.to_string(), &format!("tt{}", n), &n.to_string()))
        .collect();
    let server = FakeServer::new().with_items(items);
    let driver = ReconciliationDriver::new(Arc::new(loaded_resolver(server).await));

    let entries: Vec<RemoteListEntry> = (0..60)
        .map(|n| movie_entry(&format!("Title {}", n), &format!("tt{}", n)))
        .collect();
    let (reporter, seen) = recorder();
    let outcome = driver.reconcile("Big", entries, &reporter).await;

    assert_eq!(outcome.matched_ids.len(), 50);
    assert_eq!(outcome.unmatched, 10);

    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 60);
    for pair in seen.windows(2) {
        assert!(pair[1].processed >= pair[0].processed);
        assert!(pair[1].fraction >= pair[0].fraction);
    }
    assert_eq!(seen.last().unwrap().message, "Processing items from Big (60/60)");
}

#[tokio::test]
async fn test_duplicate_matches_are_collected_once() {
    let server = FakeServer::new().with_items(vec![movie("1", "tt1", "10")]);
    let driver = ReconciliationDriver::new(Arc::new(loaded_resolver(server).await));

    let entries = vec![movie_entry("One", "tt1"), movie_entry("One again", "tt1")];
    let outcome = driver.reconcile("Dupes", entries, &ProgressReporter::new()).await;

    assert_eq!(outcome.matched_ids, vec!["1".to_string()]);
    assert_eq!(outcome.counts.movies, 1);
}

// ============================================================================
// Collection manager
// ============================================================================

#[tokio::test]
async fn test_ensure_collection_is_idempotent() {
    let server = FakeServer::new();
    let manager = CollectionManager::new(server.clone()).with_settle_delay(Duration::ZERO);
    let spec = CollectionSpec::new("Best Of 2024", vec!["1".into(), "2".into()]);

    let first = manager.ensure_collection(&spec).await.unwrap();
    let second = manager.ensure_collection(&spec).await.unwrap();

    assert_eq!(first.collection_id, second.collection_id);
    assert_eq!(first.created_with, Some(CreationStrategy::Bulk));
    assert!(!second.was_created());
    assert_eq!(server.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_existing_collection_matches_name_ignoring_case() {
    let server = FakeServer::new();
    let existing = server.insert_collection("best of 2024", &[]);
    let manager = CollectionManager::new(server.clone());

    let outcome = manager
        .ensure_collection(&CollectionSpec::new("Best Of 2024", vec!["1".into()]))
        .await
        .unwrap();

    assert_eq!(outcome.collection_id, existing);
    assert_eq!(server.creates.load(Ordering::SeqCst), 0);
    assert_eq!(server.adds.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_fallback_creation_tolerates_add_failure() {
    let server = FakeServer::new();
    *server.bulk_fails.lock().unwrap() = true;
    *server.echo_ids.lock().unwrap() = false;
    server.failing_adds.lock().unwrap().insert("3".to_string());
    let manager = CollectionManager::new(server.clone()).with_settle_delay(Duration::ZERO);

    let spec = CollectionSpec::new("Watch Later", vec!["1".into(), "2".into(), "3".into()]);
    let outcome = manager.ensure_collection(&spec).await.unwrap();

    assert_eq!(outcome.collection_id, "col-1");
    assert_eq!(outcome.created_with, Some(CreationStrategy::CreateThenAdd));
    assert_eq!(outcome.added, 2);
    assert_eq!(outcome.requested, 3);
    assert_eq!(server.adds.load(Ordering::SeqCst), 2);
    assert_eq!(
        server.members.lock().unwrap()["col-1"],
        vec!["1".to_string(), "2".to_string()]
    );
}

#[tokio::test]
async fn test_bulk_create_is_confirmed_by_repeated_lookup() {
    let server = FakeServer::new();
    *server.echo_ids.lock().unwrap() = false;
    // the existence check and the first confirmation both miss
    server.hidden_listings.store(2, Ordering::SeqCst);
    let manager = CollectionManager::new(server.clone()).with_settle_delay(Duration::ZERO);

    let outcome = manager
        .ensure_collection(&CollectionSpec::new("Slow Server", vec!["1".into(), "2".into()]))
        .await
        .unwrap();

    assert_eq!(outcome.collection_id, "col-1");
    assert_eq!(outcome.created_with, Some(CreationStrategy::Bulk));
    assert_eq!(server.creates.load(Ordering::SeqCst), 1);
    assert_eq!(server.collections.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_unconfirmed_bulk_create_fails_after_lookups() {
    let server = FakeServer::new();
    *server.echo_ids.lock().unwrap() = false;
    server.hidden_listings.store(100, Ordering::SeqCst);
    let manager = CollectionManager::new(server.clone())
        .with_strategy(CollectionStrategyMode::Bulk)
        .with_settle_delay(Duration::ZERO);

    let result = manager
        .ensure_collection(&CollectionSpec::new("Ghost", vec!["1".into()]))
        .await;

    assert!(matches!(result, Err(SyncError::CollectionCreationFailed { ref name }) if name == "Ghost"));
    assert_eq!(server.creates.load(Ordering::SeqCst), 1);
    assert_eq!(
        server.hidden_listings.load(Ordering::SeqCst),
        100 - 1 - core_sync::CONFIRM_ATTEMPTS as usize
    );
}

#[tokio::test]
async fn test_bulk_only_strategy_reports_failure() {
    let server = FakeServer::new();
    *server.bulk_fails.lock().unwrap() = true;
    let manager = CollectionManager::new(server.clone()).with_strategy(CollectionStrategyMode::Bulk);

    let result = manager
        .ensure_collection(&CollectionSpec::new("Nope", vec!["1".into()]))
        .await;

    assert!(matches!(result, Err(SyncError::CollectionCreationFailed { ref name }) if name == "Nope"));
    assert_eq!(server.creates.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_empty_spec_is_rejected() {
    let manager = CollectionManager::new(FakeServer::new());
    let result = manager.ensure_collection(&CollectionSpec::new("Empty", Vec::new())).await;
    assert!(matches!(result, Err(SyncError::NothingToAdd { .. })));
}

// ============================================================================
// Orchestrator
// ============================================================================

#[tokio::test]
async fn test_sync_all_reports_milestones() {
    let server = FakeServer::new().with_items(vec![
        movie("1", "tt1", "10"),
        show("7", "79126", "1438", "tt0306414"),
    ]);
    let source = Arc::new(FakeSource::default().with_list(
        "42",
        vec![
            movie_entry("One", "tt1"),
            RemoteListEntry::new(ItemKind::Show, "The Wire").with_identifier("tvdb", 79126),
            movie_entry("Missing", "tt404"),
        ],
    ));
    let bus = EventBus::new(64);
    let mut events = bus.subscribe();
    let orchestrator = orchestrator(config(&[("42", "Favourites")]), source, server.clone(), false)
        .with_event_bus(bus);

    let (reporter, seen) = recorder();
    let summary = orchestrator.sync_all(&reporter).await.unwrap();

    assert_eq!(summary.lists_synced, 1);
    assert_eq!(summary.lists_failed, 0);
    let report = &summary.reports[0];
    assert_eq!(report.collection_id, "col-1");
    assert_eq!(report.counts.movies, 1);
    assert_eq!(report.counts.shows, 1);
    assert_eq!(report.unmatched, 1);
    assert!(report.created);
    assert_eq!((report.added, report.requested), (2, 2));

    let messages = messages(&seen);
    assert_eq!(messages[0], "Starting sync for list: Favourites");
    assert!(messages.contains(&"Found 3 items in Trakt list".to_string()));
    assert!(messages.contains(&"Loaded 1 movies and 1 TV shows from Emby".to_string()));
    assert!(messages.contains(&"Processing items from Favourites (3/3)".to_string()));
    assert!(messages.contains(&"Creating/updating Emby collection: Favourites".to_string()));
    assert!(messages.contains(&"Successfully created/updated collection 'Favourites' (ID: col-1)".to_string()));
    assert!(messages.contains(&"Added 2 of 2 items to collection 'Favourites'".to_string()));
    assert_eq!(messages.last().unwrap(), "Added to Favourites: 1 movies, 1 TV shows");

    let mut saw_completed = false;
    while let Ok(event) = events.try_recv() {
        if let CoreEvent::Sync(SyncEvent::RunCompleted { lists_synced, .. }) = event {
            assert_eq!(lists_synced, 1);
            saw_completed = true;
        }
    }
    assert!(saw_completed);
}

#[tokio::test]
async fn test_missing_configuration_makes_no_calls() {
    let server = FakeServer::new();
    let source = Arc::new(FakeSource::default());
    let mut incomplete = config(&[("42", "Favourites")]);
    incomplete.emby.api_key.clear();
    incomplete.trakt.client_secret.clear();
    let orchestrator = orchestrator(incomplete, source.clone(), server.clone(), false);

    let (reporter, seen) = recorder();
    let result = orchestrator.sync_all(&reporter).await;

    assert!(matches!(result, Err(SyncError::Configuration { ref missing })
        if missing == &vec!["TRAKT_CLIENT_SECRET", "EMBY_API_KEY"]));
    let seen = seen.lock().unwrap();
    assert_eq!(seen.len(), 1);
    assert_eq!(seen[0].list_name, "Configuration Error");
    assert_eq!(
        seen[0].message,
        "Cannot sync: missing required configuration: TRAKT_CLIENT_SECRET, EMBY_API_KEY"
    );
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    assert_eq!(server.listings.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_authentication_failure_aborts_run() {
    let source = Arc::new(FakeSource::default());
    let orchestrator = orchestrator(config(&[("42", "Favourites")]), source.clone(), FakeServer::new(), true);

    let (reporter, seen) = recorder();
    let result = orchestrator.sync_all(&reporter).await;

    assert!(matches!(result, Err(SyncError::Authentication(_))));
    let seen = seen.lock().unwrap();
    assert_eq!(seen[0].list_name, "Authentication Error");
    assert!(seen[0].message.starts_with("Failed to obtain access token: "));
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unauthorized_server_fails_list() {
    let server = FakeServer::new();
    *server.info_status.lock().unwrap() = Some(401);
    let source = Arc::new(FakeSource::default().with_list("42", vec![movie_entry("One", "tt1")]));
    let orchestrator = orchestrator(config(&[("42", "Favourites")]), source.clone(), server, false);

    let (reporter, seen) = recorder();
    let summary = orchestrator.sync_all(&reporter).await.unwrap();

    assert_eq!(summary.lists_failed, 1);
    assert_eq!(
        messages(&seen).last().unwrap(),
        "Cannot connect to Emby server: HTTP 401 - Authentication failed. Please check your API key."
    );
    assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_failed_list_does_not_stop_next_list() {
    let server = FakeServer::new().with_items(vec![movie("1", "tt1", "10")]);
    let source = Arc::new(
        FakeSource::default()
            .with_list("empty", Vec::new())
            .with_list("unmatched", vec![movie_entry("Unknown", "tt404")])
            .with_list("good", vec![movie_entry("One", "tt1")]),
    );
    let orchestrator = orchestrator(
        config(&[("missing", "Gone"), ("empty", "Nothing"), ("unmatched", "Nope"), ("good", "Good")]),
        source,
        server,
        false,
    );

    let (reporter, seen) = recorder();
    let summary = orchestrator.sync_all(&reporter).await.unwrap();

    assert_eq!(summary.lists_failed, 3);
    assert_eq!(summary.lists_synced, 1);
    assert_eq!(summary.reports[0].list_name, "Good");

    let messages = messages(&seen);
    assert!(messages.contains(&"No items found in Trakt list: Gone".to_string()));
    assert!(messages.contains(&"No items found in Trakt list: Nothing".to_string()));
    assert!(messages.contains(&"No matching items found in Emby for Nope".to_string()));
}

#[tokio::test]
async fn test_failed_catalog_is_listed_once_per_kind() {
    let server = FakeServer::new().with_items(vec![movie("1", "tt1", "10")]);
    *server.catalog_fails.lock().unwrap() = true;
    let source = Arc::new(FakeSource::default().with_list(
        "a",
        vec![movie_entry("One", "tt1"), movie_entry("Two", "tt2"), movie_entry("Three", "tt3")],
    ));
    let orchestrator = orchestrator(config(&[("a", "Offline")]), source, server.clone(), false);

    let (reporter, seen) = recorder();
    let summary = orchestrator.sync_all(&reporter).await.unwrap();

    assert_eq!(server.listings.load(Ordering::SeqCst), 2);
    assert_eq!(summary.lists_failed, 1);
    let messages = messages(&seen);
    assert!(messages.contains(&"Loaded 0 movies and 0 TV shows from Emby".to_string()));
    assert_eq!(messages.last().unwrap(), "No matching items found in Emby for Offline");
}

#[tokio::test]
async fn test_partial_collection_add_is_reported() {
    let server = FakeServer::new().with_items(vec![
        movie("1", "tt1", "10"),
        movie("2", "tt2", "20"),
        movie("3", "tt3", "30"),
    ]);
    *server.bulk_fails.lock().unwrap() = true;
    // the first id creates the collection; every later add is rejected
    server
        .failing_adds
        .lock()
        .unwrap()
        .extend(["1".to_string(), "2".to_string(), "3".to_string()]);
    let source = Arc::new(FakeSource::default().with_list(
        "a",
        vec![movie_entry("One", "tt1"), movie_entry("Two", "tt2"), movie_entry("Three", "tt3")],
    ));
    let orchestrator = orchestrator(config(&[("a", "Watch")]), source, server.clone(), false);

    let (reporter, seen) = recorder();
    let summary = orchestrator.sync_all(&reporter).await.unwrap();

    let report = &summary.reports[0];
    assert!(report.created);
    assert_eq!(report.added, 1);
    assert_eq!(report.requested, 3);
    assert_eq!(report.counts.movies, 3);
    assert!(messages(&seen).contains(&"Added 1 of 3 items to collection 'Watch'".to_string()));
    assert_eq!(server.adds.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_cache_is_shared_within_run_and_cleared_between_runs() {
    let server = FakeServer::new().with_items(vec![movie("1", "tt1", "10")]);
    let source = Arc::new(
        FakeSource::default()
            .with_list("a", vec![movie_entry("One", "tt1")])
            .with_list("b", vec![movie_entry("One", "tt1")]),
    );
    let orchestrator = orchestrator(config(&[("a", "A"), ("b", "B")]), source, server.clone(), false);

    orchestrator.sync_all(&ProgressReporter::new()).await.unwrap();
    assert_eq!(server.listings.load(Ordering::SeqCst), 2);

    orchestrator.sync_all(&ProgressReporter::new()).await.unwrap();
    assert_eq!(server.listings.load(Ordering::SeqCst), 4);

    orchestrator.clear_library_cache().await;
    assert!(!orchestrator.library_cache().is_populated(ItemKind::Movie).await);
}

#[tokio::test]
async fn test_collection_failure_is_reported() {
    let server = FakeServer::new().with_items(vec![movie("1", "tt1", "10")]);
    *server.bulk_fails.lock().unwrap() = true;
    let source = Arc::new(FakeSource::default().with_list("a", vec![movie_entry("One", "tt1")]));
    let mut cfg = config(&[("a", "Bulk Only")]);
    cfg.sync.collection_strategy = CollectionStrategyMode::Bulk;
    let orchestrator = orchestrator(cfg, source, server, false);

    let (reporter, seen) = recorder();
    let summary = orchestrator.sync_all(&reporter).await.unwrap();

    assert_eq!(summary.lists_failed, 1);
    assert_eq!(
        messages(&seen).last().unwrap(),
        "Failed to create/update collection: Bulk Only"
    );
}
