// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Push stream: live updates from the session.
//!
//! Updates arrive in a handful of wire shapes. Batches are flattened,
//! the abbreviated private-message shape is widened into a normal
//! observation, and anything unrecognized is dropped with a diagnostic
//! rather than guessed at.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use msgkeep_core::{ChatKind, MessageObservation, MsgkeepError, RawUpdate};

use crate::backoff::Backoff;
use crate::IngestContext;

/// Flattens one update into observations, returning how many
/// unrecognized shapes were dropped along the way.
pub fn observations(update: RawUpdate) -> (Vec<MessageObservation>, u64) {
    let mut out = Vec::new();
    let mut unrecognized = 0;
    collect(update, &mut out, &mut unrecognized);
    (out, unrecognized)
}

fn collect(update: RawUpdate, out: &mut Vec<MessageObservation>, unrecognized: &mut u64) {
    match update {
        RawUpdate::NewMessage(obs) => out.push(obs),
        RawUpdate::Batch(updates) => {
            for update in updates {
                collect(update, out, unrecognized);
            }
        }
        RawUpdate::ShortMessage {
            sender_id,
            message_id,
            text,
            timestamp,
        } => out.push(MessageObservation {
            message_id: Some(message_id),
            chat_id: Some(sender_id),
            chat_kind: Some(ChatKind::Private),
            sender_id: Some(sender_id),
            text: Some(text),
            timestamp: Some(timestamp),
            ..Default::default()
        }),
        RawUpdate::Unrecognized { kind } => {
            warn!(kind = %kind, "dropping unrecognized update shape");
            *unrecognized += 1;
        }
    }
}

/// The live update pump.
pub struct PushStream {
    ctx: IngestContext,
}

impl PushStream {
    pub fn new(ctx: IngestContext) -> Self {
        Self { ctx }
    }

    /// Handles one update end to end.
    pub async fn process(&self, update: RawUpdate) -> Result<(), MsgkeepError> {
        let settings = self.ctx.settings.snapshot();
        let (observations, unrecognized) = observations(update);
        for _ in 0..unrecognized {
            self.ctx.status.record_unrecognized();
        }
        for obs in observations {
            let outcome = self.ctx.persist(obs, &settings).await?;
            debug!(?outcome, "push observation handled");
        }
        Ok(())
    }

    /// Consumes updates until cancellation. Transport errors widen the
    /// retry delay and never end the loop.
    pub async fn run(self, cancel: CancellationToken) {
        let mut backoff = Backoff::new(Duration::from_secs(1), Duration::from_secs(60));
        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                update = self.ctx.client.next_update() => {
                    match update {
                        Ok(update) => {
                            backoff.reset();
                            if let Err(err) = self.process(update).await {
                                warn!(error = %err, "failed to persist pushed update");
                            }
                        }
                        Err(err) => {
                            let delay = backoff.next();
                            warn!(error = %err, delay = ?delay, "update stream error, backing off");
                            tokio::select! {
                                _ = cancel.cancelled() => break,
                                _ = tokio::time::sleep(delay) => {}
                            }
                        }
                    }
                }
            }
        }
        debug!("push stream stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{IngestSettings, SharedSettings};
    use chrono::Utc;
    use msgkeep_test_utils::ScriptedClient;
    use std::sync::Arc;
    use tempfile::tempdir;

    fn saved_obs(id: i64, text: &str) -> MessageObservation {
        MessageObservation {
            message_id: Some(id),
            chat_id: Some(777),
            chat_kind: Some(ChatKind::SavedMessages),
            sender_id: Some(777),
            text: Some(text.into()),
            timestamp: Some(Utc::now()),
            ..Default::default()
        }
    }

    fn context(dir: &std::path::Path) -> (IngestContext, msgkeep_store::LogHandle) {
        let (log, _task) = msgkeep_store::spawn(dir.to_path_buf()).unwrap();
        let settings = SharedSettings::new(IngestSettings::from(
            &msgkeep_config::model::IngestConfig::default(),
        ));
        let ctx = IngestContext::new(
            Arc::new(ScriptedClient::new(777)),
            log.clone(),
            settings,
            777,
        );
        (ctx, log)
    }

    #[test]
    fn batches_flatten_recursively() {
        let update = RawUpdate::Batch(vec![
            RawUpdate::NewMessage(saved_obs(1, "a")),
            RawUpdate::Batch(vec![RawUpdate::NewMessage(saved_obs(2, "b"))]),
            RawUpdate::Unrecognized { kind: "UpdateUserTyping".into() },
        ]);
        let (observations, unrecognized) = observations(update);
        assert_eq!(observations.len(), 2);
        assert_eq!(unrecognized, 1);
    }

    #[test]
    fn short_message_becomes_private_observation() {
        let now = Utc::now();
        let update = RawUpdate::ShortMessage {
            sender_id: 4242,
            message_id: 9,
            text: "hi".into(),
            timestamp: now,
        };
        let (observations, _) = observations(update);
        assert_eq!(observations.len(), 1);
        let obs = &observations[0];
        assert_eq!(obs.chat_id, Some(4242));
        assert_eq!(obs.chat_kind, Some(ChatKind::Private));
        assert_eq!(obs.timestamp, Some(now));
    }

    #[tokio::test]
    async fn processed_updates_land_in_the_store() {
        let dir = tempdir().unwrap();
        let (ctx, log) = context(dir.path());
        let stream = PushStream::new(ctx);

        stream
            .process(RawUpdate::Batch(vec![
                RawUpdate::NewMessage(saved_obs(1, "a")),
                RawUpdate::NewMessage(saved_obs(1, "a")), // duplicate id
                RawUpdate::NewMessage(saved_obs(2, "b")),
            ]))
            .await
            .unwrap();

        let status = log.status().await.unwrap();
        assert_eq!(status.records_today, 2);
        assert_eq!(status.duplicates, 1);
    }

    #[tokio::test]
    async fn unrecognized_updates_are_counted_not_persisted() {
        let dir = tempdir().unwrap();
        let (ctx, log) = context(dir.path());
        let stream = PushStream::new(ctx);

        stream
            .process(RawUpdate::Unrecognized { kind: "UpdateChannelPinned".into() })
            .await
            .unwrap();

        assert_eq!(stream.ctx.status.snapshot().unrecognized, 1);
        assert_eq!(log.status().await.unwrap().records_today, 0);
    }
}
