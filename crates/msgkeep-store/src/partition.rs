// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Day-partition files: naming, date keying, and atomic load/save.
//!
//! A partition is a JSON array of [`MessageRecord`]s in a file named
//! `saved_messages_YYYY-MM-DD.json`. The partition a record belongs to is
//! derived from the record's own timestamp in local time, not from the
//! wall clock at append time.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local, NaiveDate, Utc};

use msgkeep_core::{MessageRecord, MsgkeepError};

/// File name prefix shared by all day partitions.
pub const PARTITION_PREFIX: &str = "saved_messages_";

/// File name suffix shared by all day partitions.
pub const PARTITION_SUFFIX: &str = ".json";

/// Returns the file name of the partition for `date`.
pub fn partition_file_name(date: NaiveDate) -> String {
    format!("{PARTITION_PREFIX}{}{PARTITION_SUFFIX}", date.format("%Y-%m-%d"))
}

/// Returns the partition path for `date` under `data_dir`.
pub fn partition_path(data_dir: &Path, date: NaiveDate) -> PathBuf {
    data_dir.join(partition_file_name(date))
}

/// Parses a partition file name back into its date, or `None` if the name
/// does not follow the partition naming pattern.
pub fn parse_partition_name(name: &str) -> Option<NaiveDate> {
    let date_part = name
        .strip_prefix(PARTITION_PREFIX)?
        .strip_suffix(PARTITION_SUFFIX)?;
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").ok()
}

/// Returns the calendar date (local time) that keys the partition for a
/// record with the given timestamp.
pub fn partition_key(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.with_timezone(&Local).date_naive()
}

/// Loads a partition file, returning an empty list when the file does not
/// exist yet.
pub fn load_partition(path: &Path) -> Result<Vec<MessageRecord>, MsgkeepError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(MsgkeepError::storage(err)),
    };
    serde_json::from_slice(&bytes).map_err(|err| MsgkeepError::Storage {
        source: Box::new(err),
    })
}

/// Saves a partition atomically: the records are written to a sibling temp
/// file which then replaces the partition in one rename, so a concurrent
/// reader always sees a complete JSON document.
pub fn save_partition(path: &Path, records: &[MessageRecord]) -> Result<(), MsgkeepError> {
    let json = serde_json::to_vec_pretty(records).map_err(|err| MsgkeepError::Storage {
        source: Box::new(err),
    })?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, &json).map_err(MsgkeepError::storage)?;
    fs::rename(&tmp, path).map_err(MsgkeepError::storage)?;
    Ok(())
}

/// Lists the partition files present in `data_dir`, sorted oldest first.
pub fn list_partitions(data_dir: &Path) -> Result<Vec<(NaiveDate, PathBuf)>, MsgkeepError> {
    let mut found = Vec::new();
    let entries = match fs::read_dir(data_dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(found),
        Err(err) => return Err(MsgkeepError::storage(err)),
    };
    for entry in entries {
        let entry = entry.map_err(MsgkeepError::storage)?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else { continue };
        if let Some(date) = parse_partition_name(name) {
            found.push((date, entry.path()));
        }
    }
    found.sort_by_key(|(date, _)| *date);
    Ok(found)
}
