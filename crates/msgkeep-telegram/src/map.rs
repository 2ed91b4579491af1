// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Mapping from grammers wire types to the ingestion observation types.

use grammers_client::types::{Chat, Dialog, Message};
use grammers_client::Update;

use msgkeep_core::{ChatKind, DialogInfo, MessageObservation, RawUpdate};

/// Classifies a chat. A user chat with the principal's own id is the
/// Saved Messages conversation.
pub fn chat_kind(chat: &Chat, principal_id: i64) -> ChatKind {
    match chat {
        Chat::User(user) if user.id() == principal_id => ChatKind::SavedMessages,
        Chat::User(_) => ChatKind::Private,
        Chat::Group(_) => ChatKind::Group,
        Chat::Channel(_) => ChatKind::Channel,
    }
}

/// Builds an observation from one fetched or pushed message. Everything
/// the wire did not resolve stays `None`; the normalizer decides what
/// that means.
pub fn observation(message: &Message, principal_id: i64) -> MessageObservation {
    let chat = message.chat();
    let sender = message.sender();
    MessageObservation {
        message_id: Some(i64::from(message.id())),
        chat_id: Some(chat.id()),
        chat_kind: Some(chat_kind(&chat, principal_id)),
        chat_title: non_empty(chat.name()),
        chat_handle: chat.username().map(str::to_string),
        sender_id: sender.as_ref().map(Chat::id),
        sender_handle: sender
            .as_ref()
            .and_then(Chat::username)
            .map(str::to_string),
        sender_display_name: sender.as_ref().and_then(|s| non_empty(s.name())),
        text: non_empty(message.text()),
        timestamp: Some(message.date()),
    }
}

pub fn dialog_info(dialog: &Dialog, principal_id: i64) -> DialogInfo {
    let chat = dialog.chat();
    DialogInfo {
        chat_id: chat.id(),
        kind: chat_kind(chat, principal_id),
        title: non_empty(chat.name()),
        handle: chat.username().map(str::to_string),
    }
}

/// Reduces a session update to the shapes the pipeline handles. Grammers
/// already unwraps batch containers and widens the abbreviated message
/// shapes, so only new messages and a catch-all arm remain here.
pub fn raw_update(update: Update, principal_id: i64) -> RawUpdate {
    match update {
        Update::NewMessage(message) => RawUpdate::NewMessage(observation(&message, principal_id)),
        other => RawUpdate::Unrecognized {
            kind: variant_name(&format!("{other:?}")).to_string(),
        },
    }
}

/// First identifier of a Debug rendering, used to label unhandled update
/// shapes in diagnostics.
fn variant_name(debug: &str) -> &str {
    debug
        .split(['(', '{', ' '])
        .next()
        .filter(|name| !name.is_empty())
        .unwrap_or("Unknown")
}

fn non_empty(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn variant_name_strips_payload() {
        assert_eq!(variant_name("MessageEdited(Message { .. })"), "MessageEdited");
        assert_eq!(variant_name("Raw { data: [] }"), "Raw");
        assert_eq!(variant_name(""), "Unknown");
    }

    #[test]
    fn non_empty_rejects_whitespace() {
        assert_eq!(non_empty("  "), None);
        assert_eq!(non_empty("hi"), Some("hi".to_string()));
    }
}
