//! # Concurrent Reconciliation Driver
//!
//! Resolves every entry of a list on a bounded pool of tasks and gathers the
//! matched library ids as tasks finish.
//!
//! Each resolution runs in its own spawned task, so an error or a panic in
//! one entry is reported and counted without disturbing the others.

use bridge_traits::media::ItemKind;
use bridge_traits::watchlist::RemoteListEntry;
use futures::stream::{self, StreamExt};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

use crate::progress::ProgressReporter;
use crate::resolver::{EntryResolver, Resolution};

pub const DEFAULT_CONCURRENCY: usize = 10;

/// Distinct matched items per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MediaCounts {
    pub movies: usize,
    pub shows: usize,
}

impl MediaCounts {
    fn record(&mut self, kind: ItemKind) {
        match kind {
            ItemKind::Movie => self.movies += 1,
            ItemKind::Show => self.shows += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.movies + self.shows
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileOutcome {
    /// Matched library ids in completion order, without duplicates
    pub matched_ids: Vec<String>,
    pub counts: MediaCounts,
    pub unmatched: usize,
    pub failed: usize,
    pub processed: usize,
    pub total: usize,
}

impl ReconcileOutcome {
    pub fn is_empty(&self) -> bool {
        self.matched_ids.is_empty()
    }
}

pub struct ReconciliationDriver {
    resolver: Arc<dyn EntryResolver>,
    concurrency: usize,
}

impl ReconciliationDriver {
    pub fn new(resolver: Arc<dyn EntryResolver>) -> Self {
        Self {
            resolver,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Width of the worker pool; zero is treated as one.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    #[instrument(skip(self, entries, progress), fields(list = %list_name, total = entries.len()))]
    pub async fn reconcile(
        &self,
        list_name: &str,
        entries: Vec<RemoteListEntry>,
        progress: &ProgressReporter,
    ) -> ReconcileOutcome {
        let total = entries.len();
        let mut outcome = ReconcileOutcome {
            total,
            ..ReconcileOutcome::default()
        };
        let mut seen = HashSet::new();

        let mut results = stream::iter(entries.into_iter().map(|entry| {
            let resolver = Arc::clone(&self.resolver);
            async move {
                let label = entry.label();
                let joined = tokio::spawn(async move { resolver.resolve(&entry).await }).await;
                (label, joined)
            }
        }))
        .buffer_unordered(self.concurrency);

        while let Some((label, joined)) = results.next().await {
            let failure = match joined {
                Ok(Ok(Resolution::Matched(found))) => {
                    if seen.insert(found.item_id.clone()) {
                        outcome.counts.record(found.kind);
                        outcome.matched_ids.push(found.item_id);
                    } else {
                        debug!("{} resolved to an item already collected", label);
                    }
                    None
                }
                Ok(Ok(Resolution::NotFound)) => {
                    info!("Could not find {}", label);
                    outcome.unmatched += 1;
                    None
                }
                Ok(Err(e)) => Some(e.to_string()),
                Err(join_error) => Some(join_error.to_string()),
            };

            if let Some(reason) = failure {
                warn!("Error processing {}: {}", label, reason);
                outcome.failed += 1;
                progress.report_count(
                    list_name,
                    outcome.processed,
                    total,
                    format!("Error processing item: {}", reason),
                );
            }

            outcome.processed += 1;
            progress.report_count(
                list_name,
                outcome.processed,
                total,
                format!(
                    "Processing items from {} ({}/{})",
                    list_name, outcome.processed, total
                ),
            );
        }

        info!(
            matched = outcome.matched_ids.len(),
            unmatched = outcome.unmatched,
            failed = outcome.failed,
            "Reconciliation finished"
        );
        outcome
    }
}
