// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport trait for the live messaging session.

use async_trait::async_trait;

use crate::error::MsgkeepError;
use crate::types::{DialogInfo, MessageObservation, RawUpdate};

/// Read-only view of a live messaging session.
///
/// The production implementation wraps an authenticated user session;
/// tests use a scripted implementation. All history pages are returned
/// newest-first, matching how the platform serves them.
#[async_trait]
pub trait ClientApi: Send + Sync {
    /// Returns the user id of the authenticated account. Messages sent by
    /// this id are classified as outgoing, and its self-chat is the Saved
    /// Messages conversation.
    async fn principal_id(&self) -> Result<i64, MsgkeepError>;

    /// Fetches one newest-first page of the Saved Messages history.
    ///
    /// `offset_id == 0` starts at the newest message; a non-zero offset
    /// resumes below that message id.
    async fn saved_history(
        &self,
        offset_id: i64,
        limit: usize,
    ) -> Result<Vec<MessageObservation>, MsgkeepError>;

    /// Lists up to `limit` most recently active dialogs.
    async fn recent_dialogs(&self, limit: usize) -> Result<Vec<DialogInfo>, MsgkeepError>;

    /// Fetches up to `limit` newest messages from one dialog.
    ///
    /// Takes the full [`DialogInfo`] so implementations can reuse the
    /// access metadata obtained from [`recent_dialogs`](Self::recent_dialogs).
    async fn chat_history(
        &self,
        dialog: &DialogInfo,
        limit: usize,
    ) -> Result<Vec<MessageObservation>, MsgkeepError>;

    /// Waits for the next pushed update from the session.
    async fn next_update(&self) -> Result<RawUpdate, MsgkeepError>;
}
