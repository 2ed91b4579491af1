// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Observation-to-record normalization.
//!
//! Turns a raw [`MessageObservation`] into a [`MessageRecord`] or decides
//! to skip it. Skips are expected and merely counted; they are not errors.
//! The rules:
//!
//! - no message id or no non-empty text: skip (media-only and service
//!   messages fall out here);
//! - unresolvable sender: keep the record with a placeholder display name
//!   rather than dropping it;
//! - `is_outgoing` is derived from the principal id, never trusted from
//!   the transport;
//! - a conversation with the principal's own id is the Saved Messages
//!   chat regardless of what the transport called it.

use chrono::Utc;
use tracing::debug;

use msgkeep_core::{ChatKind, MessageObservation, MessageRecord};

/// Display name substituted when the transport cannot resolve a sender.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Sender id used when the transport reports none (e.g. anonymous
/// channel posts).
pub const UNKNOWN_SENDER_ID: i64 = 0;

/// Normalizes one observation, or returns `None` when it should be
/// skipped.
pub fn normalize(obs: MessageObservation, principal_id: i64) -> Option<MessageRecord> {
    let message_id = match obs.message_id {
        Some(id) => id,
        None => {
            debug!("skipping observation without a message id");
            return None;
        }
    };

    let text = match obs.text {
        Some(text) if !text.trim().is_empty() => text,
        _ => {
            debug!(message_id, "skipping observation without text");
            return None;
        }
    };

    // A private push may only name the counterpart; the conversation is
    // then that user's chat.
    let chat_id = obs.chat_id.or(obs.sender_id)?;

    let sender_id = obs.sender_id.unwrap_or(UNKNOWN_SENDER_ID);
    let sender_display_name = obs
        .sender_display_name
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

    let chat_kind = if chat_id == principal_id {
        ChatKind::SavedMessages
    } else {
        obs.chat_kind.unwrap_or(ChatKind::Private)
    };

    Some(MessageRecord {
        message_id,
        chat_id,
        chat_kind,
        chat_title: obs.chat_title,
        chat_handle: obs.chat_handle,
        sender_id,
        sender_handle: obs.sender_handle,
        sender_display_name,
        text,
        timestamp: obs.timestamp.unwrap_or_else(Utc::now),
        is_outgoing: sender_id == principal_id,
        is_edited: false,
    })
}
