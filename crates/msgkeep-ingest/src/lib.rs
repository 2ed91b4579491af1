// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Ingestion pipeline for the msgkeep archiver.
//!
//! Four sources feed the same store: the push stream (live updates), the
//! Saved Messages scanner, the dialog scanner, and the on-demand
//! reconciler. They overlap deliberately; the store's id set is what
//! keeps the overlap harmless.

pub mod backoff;
pub mod dialogs;
pub mod normalize;
pub mod push;
pub mod reconcile;
pub mod saved;
pub mod settings;
pub mod status;

use std::sync::Arc;

use msgkeep_core::{ClientApi, MessageObservation, MsgkeepError};
use msgkeep_store::{AppendOutcome, LogHandle};

pub use settings::{IngestSettings, SharedSettings};
pub use status::{IngestStatus, StatusTracker};

/// What happened to one observation on its way to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PersistOutcome {
    Appended,
    Duplicate,
    /// Dropped by the normalizer (no id or no text).
    Skipped,
    /// Its chat kind is disabled in the current settings.
    Disabled,
}

/// Per-tick counters returned by scanner ticks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickOutcome {
    pub appended: u64,
    pub duplicates: u64,
    pub skipped: u64,
}

impl TickOutcome {
    fn note(&mut self, outcome: PersistOutcome) {
        match outcome {
            PersistOutcome::Appended => self.appended += 1,
            PersistOutcome::Duplicate => self.duplicates += 1,
            PersistOutcome::Skipped | PersistOutcome::Disabled => self.skipped += 1,
        }
    }
}

/// Everything an ingestion source needs, cheaply cloneable.
#[derive(Clone)]
pub struct IngestContext {
    pub client: Arc<dyn ClientApi>,
    pub log: LogHandle,
    pub settings: SharedSettings,
    pub status: StatusTracker,
    pub principal_id: i64,
}

impl IngestContext {
    pub fn new(
        client: Arc<dyn ClientApi>,
        log: LogHandle,
        settings: SharedSettings,
        principal_id: i64,
    ) -> Self {
        Self {
            client,
            log,
            settings,
            status: StatusTracker::new(),
            principal_id,
        }
    }

    /// Normalizes one observation and appends it if its chat kind is
    /// enabled. Disabled kinds never reach the store.
    pub async fn persist(
        &self,
        obs: MessageObservation,
        settings: &IngestSettings,
    ) -> Result<PersistOutcome, MsgkeepError> {
        let Some(record) = normalize::normalize(obs, self.principal_id) else {
            self.status.record_skip();
            return Ok(PersistOutcome::Skipped);
        };
        if !settings.captures(record.chat_kind) {
            return Ok(PersistOutcome::Disabled);
        }
        match self.log.append(record).await? {
            AppendOutcome::Appended => Ok(PersistOutcome::Appended),
            AppendOutcome::Duplicate => Ok(PersistOutcome::Duplicate),
        }
    }
}
