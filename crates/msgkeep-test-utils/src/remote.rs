// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory [`RemoteStore`] with failure injection.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use msgkeep_core::{MsgkeepError, RemoteEntry, RemoteStore};

/// A remote store backed by a map; uploads read the real local file so
/// upload-then-delete sequencing is tested against actual file contents.
#[derive(Default)]
pub struct MemoryRemote {
    inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
    files: BTreeMap<String, Vec<u8>>,
    fail_uploads: u32,
    upload_attempts: u32,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes the next `n` uploads fail with a remote error.
    pub fn fail_next_uploads(&self, n: u32) {
        self.lock().fail_uploads = n;
    }

    /// Total upload attempts, including failed ones.
    pub fn upload_attempts(&self) -> u32 {
        self.lock().upload_attempts
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lock().files.contains_key(name)
    }

    pub fn file(&self, name: &str) -> Option<Vec<u8>> {
        self.lock().files.get(name).cloned()
    }

    /// Names currently stored, in lexicographic order.
    pub fn names(&self) -> Vec<String> {
        self.lock().files.keys().cloned().collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|p| p.into_inner())
    }
}

#[async_trait]
impl RemoteStore for MemoryRemote {
    async fn upload(&self, local: &Path, remote_name: &str) -> Result<(), MsgkeepError> {
        let bytes = std::fs::read(local).map_err(MsgkeepError::storage)?;
        let mut inner = self.lock();
        inner.upload_attempts += 1;
        if inner.fail_uploads > 0 {
            inner.fail_uploads -= 1;
            return Err(MsgkeepError::Remote {
                message: format!("injected upload failure for {remote_name}"),
                source: None,
            });
        }
        inner.files.insert(remote_name.to_string(), bytes);
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RemoteEntry>, MsgkeepError> {
        Ok(self
            .lock()
            .files
            .iter()
            .map(|(name, bytes)| RemoteEntry {
                name: name.clone(),
                size: bytes.len() as u64,
            })
            .collect())
    }

    async fn download(
        &self,
        remote_name: &str,
        dest_dir: &Path,
    ) -> Result<PathBuf, MsgkeepError> {
        let bytes = self.file(remote_name).ok_or_else(|| MsgkeepError::Remote {
            message: format!("no such remote file: {remote_name}"),
            source: None,
        })?;
        let file_name = remote_name.rsplit('/').next().unwrap_or(remote_name);
        let dest = dest_dir.join(file_name);
        std::fs::write(&dest, bytes).map_err(MsgkeepError::storage)?;
        Ok(dest)
    }
}
