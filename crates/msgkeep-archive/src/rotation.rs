// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Rotation: sealing day partitions and shipping them off the box.
//!
//! The rule throughout is upload first, delete second. A partition whose
//! upload fails stays on disk untouched and the next rotation retries
//! it; at no point does a record exist only in memory or only on a
//! remote host that may not have received it.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use metrics::counter;
use tracing::{info, warn};

use msgkeep_core::{MsgkeepError, RemoteStore};
use msgkeep_store::{partition_file_name, LogHandle};

/// File name stem for operational log files; rolled files carry a date
/// suffix appended by the daily appender.
pub const LOG_FILE_PREFIX: &str = "msgkeep.log";

/// Outcome of one successful seal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedPartition {
    pub date: NaiveDate,
    pub remote_name: String,
    pub records: usize,
}

pub struct RotationManager {
    log: LogHandle,
    remote: Arc<dyn RemoteStore>,
    data_dir: PathBuf,
    log_dir: PathBuf,
    log_subpath: String,
}

impl RotationManager {
    pub fn new(
        log: LogHandle,
        remote: Arc<dyn RemoteStore>,
        data_dir: PathBuf,
        log_dir: PathBuf,
        log_subpath: String,
    ) -> Self {
        Self {
            log,
            remote,
            data_dir,
            log_dir,
            log_subpath: log_subpath.trim_matches('/').to_string(),
        }
    }

    /// Seals everything due: partitions retained from earlier days
    /// first, then the current day. A retained day whose upload fails
    /// again stays on disk for the next rotation; a failure on the
    /// current day propagates to the caller.
    pub async fn rotate(&self) -> Result<Vec<SealedPartition>, MsgkeepError> {
        let today = Local::now().date_naive();
        let mut sealed = self.seal_stale(today).await?;
        if let Some(partition) = self.seal_date(today).await? {
            sealed.push(partition);
        }
        Ok(sealed)
    }

    /// Seals every partition older than today. Run once at startup so
    /// days that ended while the process was down still get shipped.
    pub async fn sweep_on_startup(&self) -> Result<Vec<SealedPartition>, MsgkeepError> {
        let sealed = self.seal_stale(Local::now().date_naive()).await?;
        if !sealed.is_empty() {
            info!(count = sealed.len(), "startup sweep sealed stale partitions");
        }
        Ok(sealed)
    }

    /// Seals the partitions of days before `today`, oldest first. A
    /// failed upload leaves its partition for the next attempt and does
    /// not stop the sweep.
    async fn seal_stale(&self, today: NaiveDate) -> Result<Vec<SealedPartition>, MsgkeepError> {
        let mut sealed = Vec::new();
        for (date, _path) in self.log.partitions().await? {
            if date >= today {
                continue;
            }
            match self.seal_date(date).await {
                Ok(Some(partition)) => sealed.push(partition),
                Ok(None) => {}
                Err(err) => {
                    warn!(%date, error = %err, "could not seal retained partition");
                }
            }
        }
        Ok(sealed)
    }

    async fn seal_date(&self, date: NaiveDate) -> Result<Option<SealedPartition>, MsgkeepError> {
        let Some(ticket) = self.log.begin_seal(date).await? else {
            return Ok(None);
        };
        let remote_name = self.free_remote_name(&partition_file_name(date)).await?;
        if let Err(err) = self.remote.upload(&ticket.path, &remote_name).await {
            counter!("msgkeep_upload_failures_total").increment(1);
            warn!(%date, error = %err, "upload failed, partition retained for retry");
            return Err(err);
        }
        let records = ticket.records();
        self.log.complete_seal(ticket).await?;
        counter!("msgkeep_partitions_sealed_total").increment(1);
        info!(%date, remote = %remote_name, records, "partition sealed");
        Ok(Some(SealedPartition {
            date,
            remote_name,
            records,
        }))
    }

    /// Picks a remote name that does not collide with an earlier seal of
    /// the same date: the plain name first, then `.part1`, `.part2`, ...
    async fn free_remote_name(&self, base: &str) -> Result<String, MsgkeepError> {
        let taken: Vec<String> = self
            .remote
            .list()
            .await?
            .into_iter()
            .map(|entry| entry.name)
            .collect();
        if !taken.iter().any(|name| name == base) {
            return Ok(base.to_string());
        }
        let stem = base.strip_suffix(".json").unwrap_or(base);
        let mut n = 1usize;
        loop {
            let candidate = format!("{stem}.part{n}.json");
            if !taken.iter().any(|name| name == &candidate) {
                return Ok(candidate);
            }
            n += 1;
        }
    }

    /// Ships rolled operational log files, keeping the file the process
    /// is still writing to. Shipped files are deleted locally.
    pub async fn ship_logs(&self) -> Result<usize, MsgkeepError> {
        let current = format!("{}.{}", LOG_FILE_PREFIX, Local::now().date_naive());
        let entries = match std::fs::read_dir(&self.log_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(MsgkeepError::storage(e)),
        };
        let mut shipped = 0usize;
        for entry in entries {
            let entry = entry.map_err(MsgkeepError::storage)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if !name.starts_with(LOG_FILE_PREFIX) || name == current {
                continue;
            }
            let remote_name = format!("{}/{}", self.log_subpath, name);
            match self.remote.upload(&entry.path(), &remote_name).await {
                Ok(()) => {
                    std::fs::remove_file(entry.path()).map_err(MsgkeepError::storage)?;
                    shipped += 1;
                    info!(file = %name, "log file shipped");
                }
                Err(err) => {
                    warn!(file = %name, error = %err, "log shipping failed, file kept");
                }
            }
        }
        Ok(shipped)
    }

    /// Deletes write-ahead temp files a crash mid-save can leave behind.
    pub async fn cleanup(&self) -> Result<usize, MsgkeepError> {
        let mut removed = 0usize;
        let entries = std::fs::read_dir(&self.data_dir).map_err(MsgkeepError::storage)?;
        for entry in entries {
            let entry = entry.map_err(MsgkeepError::storage)?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.ends_with(".json.tmp") {
                std::fs::remove_file(entry.path()).map_err(MsgkeepError::storage)?;
                removed += 1;
                info!(file = %name, "removed stale temp file");
            }
        }
        Ok(removed)
    }
}
