// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable day-partitioned message log for the msgkeep archiver.
//!
//! Records land in one JSON file per calendar day, keyed by the record's
//! own timestamp. A single writer task serializes every mutation; see
//! [`writer`] for the command surface and [`partition`] for the on-disk
//! format.

pub mod cursor;
pub mod partition;
pub mod writer;

pub use cursor::{Cursor, CURSOR_FILE_NAME};
pub use partition::{
    list_partitions, parse_partition_name, partition_file_name, partition_key, partition_path,
};
pub use writer::{spawn, AppendOutcome, LogHandle, SealTicket, StoreStatus};
