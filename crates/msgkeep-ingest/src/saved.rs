// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Saved Messages scanner.
//!
//! Pages the Saved Messages history newest-first on a fixed interval,
//! stopping as soon as it reaches a message id at or below the persisted
//! cursor. The cursor is only a stopping rule; every candidate still
//! goes through the store's id set, so a duplicate inside one tick is
//! caught there.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use msgkeep_core::MsgkeepError;

use crate::backoff::Backoff;
use crate::{IngestContext, TickOutcome};

/// History page size requested per round trip.
pub const PAGE_SIZE: usize = 100;

const RETRY_INITIAL: Duration = Duration::from_secs(2);
const RETRY_MAX: Duration = Duration::from_secs(300);

pub struct SavedScanner {
    ctx: IngestContext,
}

impl SavedScanner {
    pub fn new(ctx: IngestContext) -> Self {
        Self { ctx }
    }

    /// One scan tick: walk newest-first until the cursor, persist what is
    /// novel, then raise the cursor to the highest id observed.
    pub async fn tick(&self) -> Result<TickOutcome, MsgkeepError> {
        let settings = self.ctx.settings.snapshot();
        let mut outcome = TickOutcome::default();
        if !settings.enable_saved {
            return Ok(outcome);
        }

        let cursor = self.ctx.log.cursor().await?;
        let mut max_seen = cursor;
        let mut offset_id = 0i64;

        'pages: loop {
            let page = self.ctx.client.saved_history(offset_id, PAGE_SIZE).await?;
            if page.is_empty() {
                break;
            }
            let mut last_id = None;
            for obs in page {
                if let Some(id) = obs.message_id {
                    if id <= cursor {
                        break 'pages;
                    }
                    max_seen = max_seen.max(id);
                    last_id = Some(id);
                }
                outcome.note(self.ctx.persist(obs, &settings).await?);
            }
            match last_id {
                Some(id) => offset_id = id,
                // A page of id-less observations cannot advance the walk.
                None => break,
            }
        }

        if max_seen > cursor {
            self.ctx.log.advance_cursor(max_seen).await?;
        }
        self.ctx.status.mark_saved_tick();
        debug!(
            appended = outcome.appended,
            duplicates = outcome.duplicates,
            cursor = max_seen,
            "saved scan tick done"
        );
        Ok(outcome)
    }

    /// Ticks forever until cancellation. A failed tick widens the retry
    /// delay (doubling to a ceiling); the first success resets it.
    pub async fn run(self, cancel: CancellationToken) {
        let mut backoff = Backoff::new(RETRY_INITIAL, RETRY_MAX);
        loop {
            let delay = match self.tick().await {
                Ok(_) => {
                    backoff.reset();
                    self.ctx.settings.snapshot().saved_poll_interval
                }
                Err(err) => {
                    let delay = backoff.next();
                    warn!(error = %err, delay = ?delay, "saved scan failed, backing off");
                    delay
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!("saved scanner stopped");
    }
}
