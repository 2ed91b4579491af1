// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the msgkeep archiver.
//!
//! This crate provides the error type, the message record and update
//! types, and the two trait seams (live session transport and remote
//! cold storage) implemented elsewhere in the workspace.

pub mod error;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::MsgkeepError;
pub use traits::{ClientApi, RemoteStore};
pub use types::{
    ChatKind, DialogInfo, MessageObservation, MessageRecord, RawUpdate, RemoteEntry,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn msgkeep_error_has_all_variants() {
        let _config = MsgkeepError::Config("test".into());
        let _transport = MsgkeepError::Transport {
            message: "test".into(),
            source: None,
        };
        let _storage = MsgkeepError::Storage {
            source: Box::new(std::io::Error::other("test")),
        };
        let _remote = MsgkeepError::Remote {
            message: "test".into(),
            source: None,
        };
        let _invariant = MsgkeepError::Invariant("test".into());
        let _internal = MsgkeepError::Internal("test".into());
    }

    #[test]
    fn chat_kind_round_trips_through_display() {
        let variants = [
            ChatKind::SavedMessages,
            ChatKind::Private,
            ChatKind::Group,
            ChatKind::Channel,
        ];
        for variant in &variants {
            let s = variant.to_string();
            let parsed = ChatKind::from_str(&s).expect("should parse back");
            assert_eq!(*variant, parsed);
        }
        assert_eq!(ChatKind::SavedMessages.to_string(), "SAVED_MESSAGES");
    }

    #[test]
    fn message_record_serializes_with_archive_field_names() {
        let record = MessageRecord {
            message_id: 42,
            chat_id: 7,
            chat_kind: ChatKind::Private,
            chat_title: None,
            chat_handle: Some("alice".into()),
            sender_id: 7,
            sender_handle: Some("alice".into()),
            sender_display_name: "Alice".into(),
            text: "hello".into(),
            timestamp: "2026-08-24T10:00:00Z".parse().unwrap(),
            is_outgoing: false,
            is_edited: false,
        };
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["chat_type"], "PRIVATE");
        assert_eq!(json["from_user_id"], 7);
        assert_eq!(json["from_first_name"], "Alice");
        assert!(json.get("date").is_some(), "timestamp serializes as date");

        let back: MessageRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn trait_seams_are_exported() {
        fn _assert_client<T: ClientApi>() {}
        fn _assert_remote<T: RemoteStore>() {}
    }
}
