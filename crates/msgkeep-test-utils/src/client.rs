// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scripted [`ClientApi`] implementation for tests.
//!
//! Histories are given newest-first, exactly as the live transport serves
//! them. Transport failures can be injected per call site to exercise the
//! retry paths.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::mpsc;

use msgkeep_core::{
    ClientApi, DialogInfo, MessageObservation, MsgkeepError, RawUpdate,
};

/// A transport whose responses are scripted up front.
pub struct ScriptedClient {
    principal_id: i64,
    state: Mutex<State>,
    updates_tx: mpsc::UnboundedSender<RawUpdate>,
    updates_rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<RawUpdate>>,
}

struct State {
    /// Newest-first Saved Messages history.
    saved: Vec<MessageObservation>,
    dialogs: Vec<DialogInfo>,
    /// Newest-first per-chat histories, keyed by chat id.
    histories: HashMap<i64, Vec<MessageObservation>>,
    fail_saved: u32,
    fail_dialogs: u32,
    saved_calls: u32,
}

impl ScriptedClient {
    pub fn new(principal_id: i64) -> Self {
        let (updates_tx, updates_rx) = mpsc::unbounded_channel();
        Self {
            principal_id,
            state: Mutex::new(State {
                saved: Vec::new(),
                dialogs: Vec::new(),
                histories: HashMap::new(),
                fail_saved: 0,
                fail_dialogs: 0,
                saved_calls: 0,
            }),
            updates_tx,
            updates_rx: tokio::sync::Mutex::new(updates_rx),
        }
    }

    /// Replaces the Saved Messages history (newest first).
    pub fn set_saved_history(&self, observations: Vec<MessageObservation>) {
        self.lock().saved = observations;
    }

    /// Adds a dialog and its newest-first history.
    pub fn add_dialog(&self, dialog: DialogInfo, history: Vec<MessageObservation>) {
        let mut state = self.lock();
        state.histories.insert(dialog.chat_id, history);
        state.dialogs.push(dialog);
    }

    /// Queues a pushed update for [`ClientApi::next_update`].
    pub fn push_update(&self, update: RawUpdate) {
        // The receiver lives as long as self, so this cannot fail.
        let _ = self.updates_tx.send(update);
    }

    /// Makes the next `n` saved-history calls fail with a transport error.
    pub fn fail_next_saved_calls(&self, n: u32) {
        self.lock().fail_saved = n;
    }

    /// Makes the next `n` dialog listings fail with a transport error.
    pub fn fail_next_dialog_calls(&self, n: u32) {
        self.lock().fail_dialogs = n;
    }

    /// How many saved-history pages were requested.
    pub fn saved_calls(&self) -> u32 {
        self.lock().saved_calls
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl ClientApi for ScriptedClient {
    async fn principal_id(&self) -> Result<i64, MsgkeepError> {
        Ok(self.principal_id)
    }

    async fn saved_history(
        &self,
        offset_id: i64,
        limit: usize,
    ) -> Result<Vec<MessageObservation>, MsgkeepError> {
        let mut state = self.lock();
        state.saved_calls += 1;
        if state.fail_saved > 0 {
            state.fail_saved -= 1;
            return Err(MsgkeepError::Transport {
                message: "scripted saved-history failure".into(),
                source: None,
            });
        }
        Ok(page(&state.saved, offset_id, limit))
    }

    async fn recent_dialogs(&self, limit: usize) -> Result<Vec<DialogInfo>, MsgkeepError> {
        let mut state = self.lock();
        if state.fail_dialogs > 0 {
            state.fail_dialogs -= 1;
            return Err(MsgkeepError::Transport {
                message: "scripted dialog-list failure".into(),
                source: None,
            });
        }
        Ok(state.dialogs.iter().take(limit).cloned().collect())
    }

    async fn chat_history(
        &self,
        dialog: &DialogInfo,
        limit: usize,
    ) -> Result<Vec<MessageObservation>, MsgkeepError> {
        let state = self.lock();
        let history = state.histories.get(&dialog.chat_id).cloned().unwrap_or_default();
        Ok(history.into_iter().take(limit).collect())
    }

    async fn next_update(&self) -> Result<RawUpdate, MsgkeepError> {
        let mut rx = self.updates_rx.lock().await;
        rx.recv().await.ok_or(MsgkeepError::Transport {
            message: "scripted update stream closed".into(),
            source: None,
        })
    }
}

/// Newest-first page: everything below `offset_id` (or from the top for
/// offset 0), capped at `limit`.
fn page(saved: &[MessageObservation], offset_id: i64, limit: usize) -> Vec<MessageObservation> {
    let start = if offset_id == 0 {
        0
    } else {
        match saved
            .iter()
            .position(|obs| obs.message_id.is_some_and(|id| id < offset_id))
        {
            Some(pos) => pos,
            None => return Vec::new(),
        }
    };
    saved[start..].iter().take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use msgkeep_core::ChatKind;

    fn saved_obs(id: i64) -> MessageObservation {
        MessageObservation {
            message_id: Some(id),
            chat_id: Some(777),
            chat_kind: Some(ChatKind::SavedMessages),
            text: Some(format!("note {id}")),
            sender_id: Some(777),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn paging_walks_newest_first() {
        let client = ScriptedClient::new(777);
        client.set_saved_history(vec![saved_obs(5), saved_obs(4), saved_obs(3)]);

        let first = client.saved_history(0, 2).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first[0].message_id, Some(5));

        let second = client.saved_history(4, 2).await.unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second[0].message_id, Some(3));

        assert!(client.saved_history(3, 2).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let client = ScriptedClient::new(777);
        client.fail_next_saved_calls(1);
        assert!(client.saved_history(0, 10).await.is_err());
        assert!(client.saved_history(0, 10).await.is_ok());
        assert_eq!(client.saved_calls(), 2);
    }

    #[tokio::test]
    async fn queued_updates_arrive_in_order() {
        let client = ScriptedClient::new(777);
        client.push_update(RawUpdate::Unrecognized { kind: "a".into() });
        client.push_update(RawUpdate::Unrecognized { kind: "b".into() });
        match client.next_update().await.unwrap() {
            RawUpdate::Unrecognized { kind } => assert_eq!(kind, "a"),
            other => panic!("unexpected update {other:?}"),
        }
    }
}
