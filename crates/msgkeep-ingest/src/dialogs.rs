// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Dialog scanner: recent conversations other than Saved Messages.
//!
//! Each tick lists the most recent dialogs, filters them against the
//! live capture settings, and fetches a short tail of history from the
//! ones that remain. Disabled chat kinds are filtered before any
//! history fetch so a disabled group costs nothing on the wire.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use msgkeep_core::MsgkeepError;

use crate::backoff::Backoff;
use crate::{IngestContext, TickOutcome};

const RETRY_INITIAL: Duration = Duration::from_secs(2);
const RETRY_MAX: Duration = Duration::from_secs(300);

pub struct DialogScanner {
    ctx: IngestContext,
}

impl DialogScanner {
    pub fn new(ctx: IngestContext) -> Self {
        Self { ctx }
    }

    /// One scan tick over the most recent dialogs.
    pub async fn tick(&self) -> Result<TickOutcome, MsgkeepError> {
        let settings = self.ctx.settings.snapshot();
        let mut outcome = TickOutcome::default();
        if !settings.enable_private && !settings.enable_groups && !settings.enable_channels {
            return Ok(outcome);
        }

        // One extra slot because the Saved Messages dialog may occupy
        // one of the requested positions.
        let dialogs = self
            .ctx
            .client
            .recent_dialogs(settings.dialogs_per_scan + 1)
            .await?;
        let mut scanned = 0usize;
        for dialog in dialogs {
            if dialog.chat_id == self.ctx.principal_id {
                continue;
            }
            if scanned == settings.dialogs_per_scan {
                break;
            }
            scanned += 1;
            if !settings.captures(dialog.kind) {
                continue;
            }
            let history = self
                .ctx
                .client
                .chat_history(&dialog, settings.messages_per_dialog)
                .await?;
            for obs in history {
                outcome.note(self.ctx.persist(obs, &settings).await?);
            }
        }

        self.ctx.status.mark_dialog_tick();
        debug!(
            scanned,
            appended = outcome.appended,
            duplicates = outcome.duplicates,
            "dialog scan tick done"
        );
        Ok(outcome)
    }

    /// Ticks forever until cancellation, backing off on failure.
    pub async fn run(self, cancel: CancellationToken) {
        let mut backoff = Backoff::new(RETRY_INITIAL, RETRY_MAX);
        loop {
            let delay = match self.tick().await {
                Ok(_) => {
                    backoff.reset();
                    self.ctx.settings.snapshot().dialog_poll_interval
                }
                Err(err) => {
                    let delay = backoff.next();
                    warn!(error = %err, delay = ?delay, "dialog scan failed, backing off");
                    delay
                }
            };
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(delay) => {}
            }
        }
        debug!("dialog scanner stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IngestSettings, SharedSettings};
    use chrono::Utc;
    use msgkeep_core::{ChatKind, DialogInfo, MessageObservation};
    use msgkeep_test_utils::ScriptedClient;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn dialog(chat_id: i64, kind: ChatKind) -> DialogInfo {
        DialogInfo {
            chat_id,
            kind,
            title: Some(format!("chat {chat_id}")),
            handle: None,
        }
    }

    fn chat_obs(id: i64, chat_id: i64, kind: ChatKind) -> MessageObservation {
        MessageObservation {
            message_id: Some(id),
            chat_id: Some(chat_id),
            chat_kind: Some(kind),
            sender_id: Some(chat_id),
            text: Some(format!("msg {id}")),
            timestamp: Some(Utc::now()),
            ..Default::default()
        }
    }

    fn harness(
        dir: &std::path::Path,
    ) -> (Arc<ScriptedClient>, DialogScanner, msgkeep_store::LogHandle, SharedSettings) {
        let (log, _task) = msgkeep_store::spawn(dir.to_path_buf()).unwrap();
        let client = Arc::new(ScriptedClient::new(777));
        let settings = SharedSettings::new(IngestSettings::from(
            &msgkeep_config::model::IngestConfig::default(),
        ));
        let ctx = IngestContext::new(client.clone(), log.clone(), settings.clone(), 777);
        (client, DialogScanner::new(ctx), log, settings)
    }

    #[tokio::test]
    async fn private_history_is_persisted() {
        let dir = tempdir().unwrap();
        let (client, scanner, log, _settings) = harness(dir.path());
        client.add_dialog(
            dialog(4242, ChatKind::Private),
            vec![chat_obs(10, 4242, ChatKind::Private), chat_obs(11, 4242, ChatKind::Private)],
        );

        let outcome = scanner.tick().await.unwrap();
        assert_eq!(outcome.appended, 2);
        assert_eq!(log.status().await.unwrap().records_today, 2);
    }

    #[tokio::test]
    async fn disabled_group_is_never_fetched_or_persisted() {
        let dir = tempdir().unwrap();
        let (client, scanner, log, _settings) = harness(dir.path());
        // Groups are disabled by default.
        client.add_dialog(
            dialog(-100200, ChatKind::Group),
            vec![chat_obs(5, -100200, ChatKind::Group)],
        );
        client.add_dialog(
            dialog(4242, ChatKind::Private),
            vec![chat_obs(6, 4242, ChatKind::Private)],
        );

        let outcome = scanner.tick().await.unwrap();
        assert_eq!(outcome.appended, 1);
        let status = log.status().await.unwrap();
        assert_eq!(status.records_today, 1);
    }

    #[tokio::test]
    async fn saved_messages_dialog_is_skipped_here() {
        let dir = tempdir().unwrap();
        let (client, scanner, log, _settings) = harness(dir.path());
        // The principal's own dialog belongs to the saved scanner.
        client.add_dialog(
            dialog(777, ChatKind::SavedMessages),
            vec![chat_obs(1, 777, ChatKind::SavedMessages)],
        );

        let outcome = scanner.tick().await.unwrap();
        assert_eq!(outcome.appended, 0);
        assert_eq!(log.status().await.unwrap().records_today, 0);
    }

    #[tokio::test]
    async fn all_kinds_disabled_skips_the_listing() {
        let dir = tempdir().unwrap();
        let (client, scanner, _log, settings) = harness(dir.path());
        client.add_dialog(
            dialog(4242, ChatKind::Private),
            vec![chat_obs(1, 4242, ChatKind::Private)],
        );

        let mut off = IngestSettings::from(&msgkeep_config::model::IngestConfig::default());
        off.enable_private = false;
        settings.update(off);

        let outcome = scanner.tick().await.unwrap();
        assert_eq!(outcome, TickOutcome::default());
    }

    #[tokio::test]
    async fn repeated_ticks_do_not_duplicate() {
        let dir = tempdir().unwrap();
        let (client, scanner, log, _settings) = harness(dir.path());
        client.add_dialog(
            dialog(4242, ChatKind::Private),
            vec![chat_obs(10, 4242, ChatKind::Private)],
        );

        scanner.tick().await.unwrap();
        let second = scanner.tick().await.unwrap();
        assert_eq!(second.appended, 0);
        assert_eq!(second.duplicates, 1);
        assert_eq!(log.status().await.unwrap().records_today, 1);
    }

    #[tokio::test]
    async fn transport_error_surfaces() {
        let dir = tempdir().unwrap();
        let (client, scanner, _log, _settings) = harness(dir.path());
        client.fail_next_dialog_calls(1);
        assert!(scanner.tick().await.is_err());
        assert!(scanner.tick().await.is_ok());
    }
}
