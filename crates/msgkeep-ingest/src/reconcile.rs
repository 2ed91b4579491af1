// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconciler: a deep on-demand sweep over the current day.
//!
//! Run at startup and on explicit request, it closes the gaps the
//! incremental sources can leave behind (a crash between fetch and
//! persist, a cursor that jumped past an id). It walks the full Saved
//! Messages history back to local midnight plus the recent dialog tails,
//! prefiltering against the ids already stored so a sweep over a
//! populated store stays cheap.

use std::collections::HashSet;

use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeZone, Utc};
use tracing::{debug, info};

use msgkeep_core::MsgkeepError;

use crate::saved::PAGE_SIZE;
use crate::{IngestContext, TickOutcome};

pub struct Reconciler {
    ctx: IngestContext,
}

impl Reconciler {
    pub fn new(ctx: IngestContext) -> Self {
        Self { ctx }
    }

    /// One full sweep. Returns what it added.
    pub async fn run_once(&self) -> Result<TickOutcome, MsgkeepError> {
        let settings = self.ctx.settings.snapshot();
        let mut outcome = TickOutcome::default();
        let known = self.known_ids().await?;
        let day_start = start_of_local_day();
        info!(known = known.len(), since = %day_start, "reconcile sweep starting");

        if settings.enable_saved {
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
                    if obs.timestamp.is_some_and(|ts| ts < day_start) {
                        break 'pages;
                    }
                    let Some(id) = obs.message_id else { continue };
                    max_seen = max_seen.max(id);
                    last_id = Some(id);
                    if known.contains(&id) {
                        continue;
                    }
                    outcome.note(self.ctx.persist(obs, &settings).await?);
                }
                match last_id {
                    Some(id) => offset_id = id,
                    None => break,
                }
            }
            if max_seen > cursor {
                self.ctx.log.advance_cursor(max_seen).await?;
            }
        }

        if settings.enable_private || settings.enable_groups || settings.enable_channels {
            let dialogs = self
                .ctx
                .client
                .recent_dialogs(settings.dialogs_per_scan + 1)
                .await?;
            for dialog in dialogs {
                if dialog.chat_id == self.ctx.principal_id || !settings.captures(dialog.kind) {
                    continue;
                }
                let history = self
                    .ctx
                    .client
                    .chat_history(&dialog, settings.messages_per_dialog)
                    .await?;
                for obs in history {
                    if obs.message_id.is_some_and(|id| known.contains(&id)) {
                        continue;
                    }
                    outcome.note(self.ctx.persist(obs, &settings).await?);
                }
            }
        }

        info!(
            appended = outcome.appended,
            duplicates = outcome.duplicates,
            skipped = outcome.skipped,
            "reconcile sweep done"
        );
        Ok(outcome)
    }

    /// Union of stored message ids across every on-disk partition and the
    /// active day.
    async fn known_ids(&self) -> Result<HashSet<i64>, MsgkeepError> {
        let mut dates: Vec<_> = self
            .ctx
            .log
            .partitions()
            .await?
            .into_iter()
            .map(|(date, _)| date)
            .collect();
        let today = Local::now().date_naive();
        if !dates.contains(&today) {
            dates.push(today);
        }
        let mut known = HashSet::new();
        for date in dates {
            known.extend(self.ctx.log.existing_ids(date).await?);
        }
        debug!(ids = known.len(), "loaded known id set");
        Ok(known)
    }
}

/// Local midnight of the current day, expressed in UTC.
fn start_of_local_day() -> DateTime<Utc> {
    let naive = NaiveDateTime::new(Local::now().date_naive(), NaiveTime::MIN);
    naive
        .and_local_timezone(Local)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|| Utc.from_utc_datetime(&naive))
}
