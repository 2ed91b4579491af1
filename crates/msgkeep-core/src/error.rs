// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the msgkeep archiver.

use thiserror::Error;

/// The primary error type used across the msgkeep crates.
#[derive(Debug, Error)]
pub enum MsgkeepError {
    /// Configuration errors (invalid TOML, missing required fields, type mismatches).
    #[error("configuration error: {0}")]
    Config(String),

    /// Messaging transport errors (connect failure, history fetch failure, rate limiting).
    ///
    /// Transport errors are recoverable: ingestion loops log them, back off,
    /// and retry. They never terminate ingestion on their own.
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Local persistence errors (partition file I/O, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Remote store errors (SFTP connect, upload, listing).
    ///
    /// An upload failure leaves the local file in place; rotation retries
    /// on its next run.
    #[error("remote store error: {message}")]
    Remote {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A persistence invariant was violated (e.g. a duplicate id slipped
    /// into a partition). Fatal for the writer: continuing would corrupt data.
    #[error("invariant violation: {0}")]
    Invariant(String),

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl MsgkeepError {
    /// Wraps an I/O error as a storage error.
    pub fn storage(err: std::io::Error) -> Self {
        MsgkeepError::Storage {
            source: Box::new(err),
        }
    }

    /// Builds a transport error from a message and an underlying error.
    pub fn transport(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MsgkeepError::Transport {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Builds a remote store error from a message and an underlying error.
    pub fn remote(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        MsgkeepError::Remote {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }
}
