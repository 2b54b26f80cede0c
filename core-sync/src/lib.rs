//! # List Reconciliation Engine
//!
//! Mirrors remote watch-lists into media server collections.
//!
//! ## Components
//!
//! - **Identifier Normalizer** (`identifiers`): canonical provider ids for a list entry
//! - **Library Cache** (`library_cache`): per-kind catalog snapshots, explicitly invalidated
//! - **Item Resolver** (`resolver`): kind-specific provider-id priority lookup
//! - **Reconciliation Driver** (`driver`): bounded concurrent resolution with progress
//! - **Collection Manager** (`collection`): find-or-create with a strategy table
//! - **Sync Orchestrator** (`orchestrator`): per-list pipeline, sequential across lists
//! - **Scheduler** (`scheduler`): calendar trigger with run-now and clear

pub mod collection;
pub mod driver;
pub mod error;
pub mod identifiers;
pub mod library_cache;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod scheduler;

pub use collection::{
    CollectionManager, CollectionOutcome, CollectionSpec, CreationStrategy, CONFIRM_ATTEMPTS,
    DEFAULT_SETTLE_DELAY,
};
pub use driver::{MediaCounts, ReconcileOutcome, ReconciliationDriver, DEFAULT_CONCURRENCY};
pub use error::{Result, SyncError};
pub use identifiers::{normalize, IdProvider, NormalizedIdentifiers};
pub use library_cache::{Catalog, LibraryCache};
pub use orchestrator::{
    ListReport, RunSummary, SyncOrchestrator, AUTHENTICATION_ERROR, CONFIGURATION_ERROR,
};
pub use progress::{ProgressCallback, ProgressReporter, SyncProgress};
pub use resolver::{provider_priority, EntryResolver, ItemResolver, Resolution, ResolvedMatch};
pub use scheduler::{Schedule, ScheduledTask, SchedulerHandle, SyncInterval, SyncScheduler};
