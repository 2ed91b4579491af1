// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared across the msgkeep crates.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Kind of conversation a message belongs to.
///
/// Serialized in SCREAMING_SNAKE_CASE to match the on-disk partition
/// format (`"chat_type": "SAVED_MESSAGES"` and so on).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChatKind {
    /// The account's own Saved Messages chat.
    SavedMessages,
    Private,
    Group,
    Channel,
}

/// A fully normalized message, as persisted in a day partition.
///
/// Field names on the wire match the archive's JSON schema; records are
/// immutable once appended. `message_id` is unique within a partition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub message_id: i64,
    pub chat_id: i64,
    #[serde(rename = "chat_type")]
    pub chat_kind: ChatKind,
    pub chat_title: Option<String>,
    #[serde(rename = "chat_username")]
    pub chat_handle: Option<String>,
    #[serde(rename = "from_user_id")]
    pub sender_id: i64,
    #[serde(rename = "from_username")]
    pub sender_handle: Option<String>,
    #[serde(rename = "from_first_name")]
    pub sender_display_name: String,
    pub text: String,
    #[serde(rename = "date")]
    pub timestamp: DateTime<Utc>,
    pub is_outgoing: bool,
    /// Reserved; always false at creation (edits are not re-ingested).
    pub is_edited: bool,
}

/// A raw view of one observed message, before normalization.
///
/// Every field the transport may or may not resolve is optional; the
/// normalizer decides what is mandatory, what gets a placeholder, and
/// what causes the observation to be skipped.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MessageObservation {
    pub message_id: Option<i64>,
    pub chat_id: Option<i64>,
    pub chat_kind: Option<ChatKind>,
    pub chat_title: Option<String>,
    pub chat_handle: Option<String>,
    pub sender_id: Option<i64>,
    pub sender_handle: Option<String>,
    pub sender_display_name: Option<String>,
    pub text: Option<String>,
    pub timestamp: Option<DateTime<Utc>>,
}

/// One pushed update from the live session, reduced to the shapes the
/// ingestion pipeline knows how to handle.
#[derive(Debug, Clone)]
pub enum RawUpdate {
    /// A single new message with full conversation context.
    NewMessage(MessageObservation),
    /// A container carrying several updates at once; flattened on receipt.
    Batch(Vec<RawUpdate>),
    /// The abbreviated private-message shape: only the counterpart's user
    /// id, the message id, text, and a timestamp.
    ShortMessage {
        sender_id: i64,
        message_id: i64,
        text: String,
        timestamp: DateTime<Utc>,
    },
    /// Anything else; dropped with a diagnostic, never guessed at.
    Unrecognized { kind: String },
}

/// A dialog as reported by the transport's recent-conversation listing.
#[derive(Debug, Clone, PartialEq)]
pub struct DialogInfo {
    pub chat_id: i64,
    pub kind: ChatKind,
    pub title: Option<String>,
    pub handle: Option<String>,
}

/// An entry in the remote store's base directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub name: String,
    pub size: u64,
}
