// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Remote cold-storage trait.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use crate::error::MsgkeepError;
use crate::types::RemoteEntry;

/// A remote archive destination for sealed partitions and rotated logs.
///
/// Implementations connect per operation; no session is held between
/// calls. `remote_name` may contain `/` separators, and any missing
/// intermediate directories are created on demand.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Uploads a local file under the given remote name. The local file
    /// is left untouched; deleting it after a confirmed upload is the
    /// caller's decision.
    async fn upload(&self, local: &Path, remote_name: &str) -> Result<(), MsgkeepError>;

    /// Lists the entries of the remote base directory.
    async fn list(&self) -> Result<Vec<RemoteEntry>, MsgkeepError>;

    /// Downloads a remote file into `dest_dir`, returning the local path.
    async fn download(&self, remote_name: &str, dest_dir: &Path)
        -> Result<PathBuf, MsgkeepError>;
}
