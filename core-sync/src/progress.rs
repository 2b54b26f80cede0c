//! Progress reporting for list reconciliation.

use core_runtime::events::{CoreEvent, EventBus, SyncEvent};
use serde::Serialize;
use std::sync::Arc;
use tracing::info;

/// One progress milestone for a list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncProgress {
    pub list_name: String,
    /// Completion in `[0, 1]`
    pub fraction: f64,
    pub processed: usize,
    pub total: usize,
    pub message: String,
}

pub type ProgressCallback = Arc<dyn Fn(&SyncProgress) + Send + Sync>;

/// Fans every milestone out to the caller's callback and the event bus.
#[derive(Clone, Default)]
pub struct ProgressReporter {
    callback: Option<ProgressCallback>,
    event_bus: Option<EventBus>,
}

impl ProgressReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(mut self, callback: ProgressCallback) -> Self {
        self.callback = Some(callback);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    pub fn report(
        &self,
        fraction: f64,
        list_name: &str,
        processed: usize,
        total: usize,
        message: impl Into<String>,
    ) {
        let progress = SyncProgress {
            list_name: list_name.to_string(),
            fraction: fraction.clamp(0.0, 1.0),
            processed,
            total,
            message: message.into(),
        };

        info!(list = %progress.list_name, processed, total, "{}", progress.message);

        if let Some(callback) = &self.callback {
            callback(&progress);
        }

        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Sync(SyncEvent::Progress {
                list_name: progress.list_name,
                fraction: progress.fraction,
                processed,
                total,
                message: progress.message,
            }))
            .ok();
        }
    }

    /// Report `processed` of `total`, deriving the fraction.
    pub fn report_count(&self, list_name: &str, processed: usize, total: usize, message: impl Into<String>) {
        let fraction = if total == 0 {
            0.0
        } else {
            processed as f64 / total as f64
        };
        self.report(fraction, list_name, processed, total, message);
    }
}

impl std::fmt::Debug for ProgressReporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressReporter")
            .field("callback", &self.callback.is_some())
            .field("event_bus", &self.event_bus.is_some())
            .finish()
    }
}
