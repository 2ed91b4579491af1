// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Monotonic high-water-mark cursor for the Saved Messages scanner.
//!
//! The cursor is the highest message id the scanner has ever observed,
//! persisted as a single integer in its own file. It only ever advances;
//! an attempt to lower it is ignored. It is a paging optimization, not a
//! deduplication mechanism: the id set in the writer remains authoritative.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use msgkeep_core::MsgkeepError;

/// Default file name of the persisted cursor.
pub const CURSOR_FILE_NAME: &str = "last_message_id.txt";

/// The persisted high-water mark.
#[derive(Debug)]
pub struct Cursor {
    path: PathBuf,
    value: i64,
}

impl Cursor {
    /// Loads the cursor from `data_dir`, starting at 0 when the file is
    /// missing or unreadable. A corrupt cursor only costs a wider rescan,
    /// so it is logged and reset rather than treated as fatal.
    pub fn load(data_dir: &Path) -> Self {
        let path = data_dir.join(CURSOR_FILE_NAME);
        let value = match fs::read_to_string(&path) {
            Ok(content) => match content.trim().parse::<i64>() {
                Ok(v) => v,
                Err(_) => {
                    warn!(path = %path.display(), "cursor file is not an integer, resetting to 0");
                    0
                }
            },
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => 0,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cursor file unreadable, resetting to 0");
                0
            }
        };
        Self { path, value }
    }

    /// Current high-water mark.
    pub fn value(&self) -> i64 {
        self.value
    }

    /// Raises the cursor to `candidate` if it is higher, persisting the new
    /// value. Returns true when the cursor moved.
    pub fn advance(&mut self, candidate: i64) -> Result<bool, MsgkeepError> {
        if candidate <= self.value {
            return Ok(false);
        }
        self.value = candidate;
        fs::write(&self.path, format!("{}\n", self.value)).map_err(MsgkeepError::storage)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn missing_file_starts_at_zero() {
        let dir = tempdir().unwrap();
        let cursor = Cursor::load(dir.path());
        assert_eq!(cursor.value(), 0);
    }

    #[test]
    fn advance_persists_and_reloads() {
        let dir = tempdir().unwrap();
        let mut cursor = Cursor::load(dir.path());
        assert!(cursor.advance(42).unwrap());

        let reloaded = Cursor::load(dir.path());
        assert_eq!(reloaded.value(), 42);
    }

    #[test]
    fn cursor_never_lowers() {
        let dir = tempdir().unwrap();
        let mut cursor = Cursor::load(dir.path());
        // Observing ids out of order only keeps the maximum.
        for id in [5, 9, 7] {
            cursor.advance(id).unwrap();
        }
        assert_eq!(cursor.value(), 9);
        assert!(!cursor.advance(9).unwrap(), "equal id does not move the cursor");
    }

    #[test]
    fn corrupt_file_resets_to_zero() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join(CURSOR_FILE_NAME), "not-a-number").unwrap();
        let cursor = Cursor::load(dir.path());
        assert_eq!(cursor.value(), 0);
    }
}
