// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared counters and tick timestamps for the ingestion sources.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// A point-in-time view of ingestion health.
#[derive(Debug, Clone, Serialize)]
pub struct IngestStatus {
    /// Observations dropped by the normalizer (no text, no id).
    pub skipped: u64,
    /// Pushed updates with a shape the pipeline does not recognize.
    pub unrecognized: u64,
    pub last_saved_tick: Option<DateTime<Utc>>,
    pub last_dialog_tick: Option<DateTime<Utc>>,
}

/// Counter sink shared by every source; cloning is cheap.
#[derive(Clone, Default)]
pub struct StatusTracker {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    skipped: AtomicU64,
    unrecognized: AtomicU64,
    last_saved_tick: Mutex<Option<DateTime<Utc>>>,
    last_dialog_tick: Mutex<Option<DateTime<Utc>>>,
}

impl StatusTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_skip(&self) {
        self.inner.skipped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("msgkeep_records_skipped_total").increment(1);
    }

    pub fn record_unrecognized(&self) {
        self.inner.unrecognized.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("msgkeep_updates_unrecognized_total").increment(1);
    }

    pub fn mark_saved_tick(&self) {
        if let Ok(mut slot) = self.inner.last_saved_tick.lock() {
            *slot = Some(Utc::now());
        }
    }

    pub fn mark_dialog_tick(&self) {
        if let Ok(mut slot) = self.inner.last_dialog_tick.lock() {
            *slot = Some(Utc::now());
        }
    }

    pub fn snapshot(&self) -> IngestStatus {
        IngestStatus {
            skipped: self.inner.skipped.load(Ordering::Relaxed),
            unrecognized: self.inner.unrecognized.load(Ordering::Relaxed),
            last_saved_tick: self.inner.last_saved_tick.lock().ok().and_then(|s| *s),
            last_dialog_tick: self.inner.last_dialog_tick.lock().ok().and_then(|s| *s),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_accumulate_across_clones() {
        let tracker = StatusTracker::new();
        let other = tracker.clone();
        tracker.record_skip();
        other.record_skip();
        other.record_unrecognized();
        let status = tracker.snapshot();
        assert_eq!(status.skipped, 2);
        assert_eq!(status.unrecognized, 1);
        assert!(status.last_saved_tick.is_none());
    }

    #[test]
    fn tick_marks_are_recorded() {
        let tracker = StatusTracker::new();
        tracker.mark_saved_tick();
        assert!(tracker.snapshot().last_saved_tick.is_some());
        assert!(tracker.snapshot().last_dialog_tick.is_none());
    }
}
