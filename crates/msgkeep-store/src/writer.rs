// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Single-writer task owning all partition mutation.
//!
//! Every append, cursor update, and seal goes through one task over an
//! mpsc channel, so each read-modify-write of a partition file is
//! serialized. Producers hold a cloneable [`LogHandle`]; concurrent
//! appends of the same message id resolve to exactly one stored record.
//!
//! **Do NOT write partition files from anywhere else.**

use std::collections::HashSet;
use std::path::PathBuf;

use chrono::{Local, NaiveDate};
use metrics::counter;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use msgkeep_core::{MessageRecord, MsgkeepError};

use crate::cursor::Cursor;
use crate::partition;

/// Command channel depth. Producers briefly block when the writer falls
/// behind, which is the intended backpressure.
const COMMAND_BUFFER: usize = 512;

/// Result of an append: either the record was stored, or an identical id
/// was already present in its partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    Duplicate,
}

/// Counters and state reported by the writer.
#[derive(Debug, Clone, Serialize)]
pub struct StoreStatus {
    pub active_date: NaiveDate,
    pub records_today: usize,
    pub appended: u64,
    pub duplicates: u64,
    pub cursor: i64,
}

/// Proof that a seal was started: identifies the partition file and how
/// many records the writer had flushed when the seal began. Records
/// appended after this point survive the seal's completion.
#[derive(Debug, Clone)]
pub struct SealTicket {
    pub date: NaiveDate,
    pub path: PathBuf,
    snapshot_len: usize,
}

impl SealTicket {
    /// How many records the seal covers.
    pub fn records(&self) -> usize {
        self.snapshot_len
    }
}

enum StoreCommand {
    Append {
        record: MessageRecord,
        reply: oneshot::Sender<Result<AppendOutcome, MsgkeepError>>,
    },
    ExistingIds {
        date: NaiveDate,
        reply: oneshot::Sender<Result<HashSet<i64>, MsgkeepError>>,
    },
    CursorValue {
        reply: oneshot::Sender<i64>,
    },
    AdvanceCursor {
        value: i64,
        reply: oneshot::Sender<Result<i64, MsgkeepError>>,
    },
    Status {
        reply: oneshot::Sender<StoreStatus>,
    },
    Partitions {
        reply: oneshot::Sender<Result<Vec<(NaiveDate, PathBuf)>, MsgkeepError>>,
    },
    BeginSeal {
        date: NaiveDate,
        reply: oneshot::Sender<Result<Option<SealTicket>, MsgkeepError>>,
    },
    CompleteSeal {
        ticket: SealTicket,
        reply: oneshot::Sender<Result<(), MsgkeepError>>,
    },
}

/// Cloneable producer handle to the writer task.
#[derive(Clone)]
pub struct LogHandle {
    tx: mpsc::Sender<StoreCommand>,
}

impl LogHandle {
    /// Appends a record to its day partition, deduplicating by message id.
    pub async fn append(&self, record: MessageRecord) -> Result<AppendOutcome, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Append { record, reply }).await?;
        recv(rx).await?
    }

    /// Returns the set of message ids already stored for `date`.
    pub async fn existing_ids(&self, date: NaiveDate) -> Result<HashSet<i64>, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::ExistingIds { date, reply }).await?;
        recv(rx).await?
    }

    /// Current high-water-mark cursor value.
    pub async fn cursor(&self) -> Result<i64, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::CursorValue { reply }).await?;
        recv(rx).await
    }

    /// Raises the cursor to `value` if higher; returns the cursor after
    /// the call either way.
    pub async fn advance_cursor(&self, value: i64) -> Result<i64, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::AdvanceCursor { value, reply }).await?;
        recv(rx).await?
    }

    /// Snapshot of the writer's counters.
    pub async fn status(&self) -> Result<StoreStatus, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Status { reply }).await?;
        recv(rx).await
    }

    /// Lists partition files currently on disk, oldest first.
    pub async fn partitions(&self) -> Result<Vec<(NaiveDate, PathBuf)>, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::Partitions { reply }).await?;
        recv(rx).await?
    }

    /// Starts sealing the partition for `date`. Returns `None` when no
    /// partition file exists for that date. The caller uploads the file at
    /// `ticket.path` and then either calls [`complete_seal`](Self::complete_seal)
    /// (confirmed upload) or drops the ticket (failed upload; the file is
    /// retained untouched for a later retry).
    pub async fn begin_seal(&self, date: NaiveDate) -> Result<Option<SealTicket>, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::BeginSeal { date, reply }).await?;
        recv(rx).await?
    }

    /// Completes a seal after a confirmed upload. Records appended since
    /// [`begin_seal`](Self::begin_seal) are kept; everything covered by the
    /// ticket is removed locally. The in-memory id set for the active date
    /// survives, so later same-day appends still deduplicate.
    pub async fn complete_seal(&self, ticket: SealTicket) -> Result<(), MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(StoreCommand::CompleteSeal { ticket, reply }).await?;
        recv(rx).await?
    }

    async fn send(&self, cmd: StoreCommand) -> Result<(), MsgkeepError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| MsgkeepError::Internal("message store writer is gone".into()))
    }
}

async fn recv<T>(rx: oneshot::Receiver<T>) -> Result<T, MsgkeepError> {
    rx.await
        .map_err(|_| MsgkeepError::Internal("message store writer dropped a reply".into()))
}

/// Spawns the writer task for `data_dir`, loading today's partition and
/// the persisted cursor. Fails fast if the active partition is unreadable
/// or already contains a duplicate id.
pub fn spawn(data_dir: PathBuf) -> Result<(LogHandle, JoinHandle<()>), MsgkeepError> {
    std::fs::create_dir_all(&data_dir).map_err(MsgkeepError::storage)?;
    let writer = Writer::open(data_dir)?;
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let handle = tokio::spawn(writer.run(rx));
    Ok((LogHandle { tx }, handle))
}

struct Writer {
    data_dir: PathBuf,
    cursor: Cursor,
    active_date: NaiveDate,
    /// Records of the active partition that are not yet sealed away.
    records: Vec<MessageRecord>,
    /// Every id seen for the active date since startup, including ids
    /// whose records were already sealed and removed locally.
    ids: HashSet<i64>,
    appended: u64,
    duplicates: u64,
}

impl Writer {
    fn open(data_dir: PathBuf) -> Result<Self, MsgkeepError> {
        let cursor = Cursor::load(&data_dir);
        let active_date = Local::now().date_naive();
        let records = partition::load_partition(&partition::partition_path(&data_dir, active_date))?;
        let ids = collect_ids(&records, active_date)?;
        info!(
            date = %active_date,
            records = records.len(),
            cursor = cursor.value(),
            "message store opened"
        );
        Ok(Self {
            data_dir,
            cursor,
            active_date,
            records,
            ids,
            appended: 0,
            duplicates: 0,
        })
    }

    async fn run(mut self, mut rx: mpsc::Receiver<StoreCommand>) {
        while let Some(cmd) = rx.recv().await {
            match cmd {
                StoreCommand::Append { record, reply } => {
                    let result = self.append(record);
                    let fatal = matches!(result, Err(MsgkeepError::Invariant(_)));
                    if fatal {
                        if let Err(err) = &result {
                            error!(error = %err, "aborting message store writer");
                        }
                    }
                    let _ = reply.send(result);
                    if fatal {
                        break;
                    }
                }
                StoreCommand::ExistingIds { date, reply } => {
                    let _ = reply.send(self.existing_ids(date));
                }
                StoreCommand::CursorValue { reply } => {
                    let _ = reply.send(self.cursor.value());
                }
                StoreCommand::AdvanceCursor { value, reply } => {
                    let result = self.cursor.advance(value).map(|_| self.cursor.value());
                    let _ = reply.send(result);
                }
                StoreCommand::Status { reply } => {
                    let _ = reply.send(StoreStatus {
                        active_date: self.active_date,
                        records_today: self.records.len(),
                        appended: self.appended,
                        duplicates: self.duplicates,
                        cursor: self.cursor.value(),
                    });
                }
                StoreCommand::Partitions { reply } => {
                    let _ = reply.send(partition::list_partitions(&self.data_dir));
                }
                StoreCommand::BeginSeal { date, reply } => {
                    let _ = reply.send(self.begin_seal(date));
                }
                StoreCommand::CompleteSeal { ticket, reply } => {
                    let _ = reply.send(self.complete_seal(ticket));
                }
            }
        }
        debug!("message store writer stopped");
    }

    fn append(&mut self, record: MessageRecord) -> Result<AppendOutcome, MsgkeepError> {
        let date = partition::partition_key(record.timestamp);

        if date > self.active_date {
            self.roll_to(date)?;
        }

        if date == self.active_date {
            if !self.ids.insert(record.message_id) {
                self.duplicates += 1;
                counter!("msgkeep_records_duplicate_total").increment(1);
                return Ok(AppendOutcome::Duplicate);
            }
            self.records.push(record);
            partition::save_partition(
                &partition::partition_path(&self.data_dir, date),
                &self.records,
            )?;
        } else {
            // Late arrival for a previous day: the partition is keyed by the
            // record's own date, so it goes into that day's file.
            let path = partition::partition_path(&self.data_dir, date);
            let mut records = partition::load_partition(&path)?;
            if records.iter().any(|r| r.message_id == record.message_id) {
                self.duplicates += 1;
                counter!("msgkeep_records_duplicate_total").increment(1);
                return Ok(AppendOutcome::Duplicate);
            }
            debug!(date = %date, message_id = record.message_id, "late append into prior day");
            records.push(record);
            partition::save_partition(&path, &records)?;
        }

        self.appended += 1;
        counter!("msgkeep_records_appended_total").increment(1);
        Ok(AppendOutcome::Appended)
    }

    fn existing_ids(&self, date: NaiveDate) -> Result<HashSet<i64>, MsgkeepError> {
        if date == self.active_date {
            return Ok(self.ids.clone());
        }
        let records =
            partition::load_partition(&partition::partition_path(&self.data_dir, date))?;
        Ok(records.iter().map(|r| r.message_id).collect())
    }

    fn begin_seal(&mut self, date: NaiveDate) -> Result<Option<SealTicket>, MsgkeepError> {
        let path = partition::partition_path(&self.data_dir, date);
        if !path.exists() {
            return Ok(None);
        }
        let snapshot_len = if date == self.active_date {
            self.records.len()
        } else {
            partition::load_partition(&path)?.len()
        };
        Ok(Some(SealTicket {
            date,
            path,
            snapshot_len,
        }))
    }

    fn complete_seal(&mut self, ticket: SealTicket) -> Result<(), MsgkeepError> {
        if ticket.date == self.active_date {
            // Keep what arrived after the seal snapshot; the id set stays
            // intact so the rest of the day still deduplicates.
            let remaining = self.records.split_off(ticket.snapshot_len.min(self.records.len()));
            self.records = remaining;
            if self.records.is_empty() {
                remove_file(&ticket.path)?;
            } else {
                warn!(
                    date = %ticket.date,
                    kept = self.records.len(),
                    "records arrived during seal, starting a fresh partition file"
                );
                partition::save_partition(&ticket.path, &self.records)?;
            }
        } else {
            let records = partition::load_partition(&ticket.path)?;
            if records.len() > ticket.snapshot_len {
                let remaining = records[ticket.snapshot_len..].to_vec();
                partition::save_partition(&ticket.path, &remaining)?;
            } else {
                remove_file(&ticket.path)?;
            }
        }
        info!(date = %ticket.date, "partition sealed");
        Ok(())
    }

    fn roll_to(&mut self, date: NaiveDate) -> Result<(), MsgkeepError> {
        info!(from = %self.active_date, to = %date, "rolling active partition");
        let records = partition::load_partition(&partition::partition_path(&self.data_dir, date))?;
        self.ids = collect_ids(&records, date)?;
        self.records = records;
        self.active_date = date;
        Ok(())
    }
}

fn collect_ids(
    records: &[MessageRecord],
    date: NaiveDate,
) -> Result<HashSet<i64>, MsgkeepError> {
    let mut ids = HashSet::with_capacity(records.len());
    for record in records {
        if !ids.insert(record.message_id) {
            return Err(MsgkeepError::Invariant(format!(
                "partition {date} contains message id {} twice",
                record.message_id
            )));
        }
    }
    Ok(ids)
}

fn remove_file(path: &std::path::Path) -> Result<(), MsgkeepError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(MsgkeepError::storage(err)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};
    use msgkeep_core::ChatKind;
    use tempfile::tempdir;

    fn record(id: i64) -> MessageRecord {
        record_at(id, Utc::now())
    }

    fn record_at(id: i64, timestamp: chrono::DateTime<Utc>) -> MessageRecord {
        MessageRecord {
            message_id: id,
            chat_id: 777,
            chat_kind: ChatKind::SavedMessages,
            chat_title: Some("Saved Messages".into()),
            chat_handle: None,
            sender_id: 777,
            sender_handle: None,
            sender_display_name: "Me".into(),
            text: format!("note {id}"),
            timestamp,
            is_outgoing: true,
            is_edited: false,
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_appends_lose_nothing() {
        let dir = tempdir().unwrap();
        let (log, _task) = spawn(dir.path().to_path_buf()).unwrap();

        let mut joins = Vec::new();
        for id in 1..=50i64 {
            let log = log.clone();
            joins.push(tokio::spawn(async move { log.append(record(id)).await }));
        }
        for join in joins {
            assert_eq!(join.await.unwrap().unwrap(), AppendOutcome::Appended);
        }

        let status = log.status().await.unwrap();
        assert_eq!(status.records_today, 50);
        let today = Local::now().date_naive();
        let stored =
            partition::load_partition(&partition::partition_path(dir.path(), today)).unwrap();
        assert_eq!(stored.len(), 50);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn overlapping_producers_store_union() {
        let dir = tempdir().unwrap();
        let (log, _task) = spawn(dir.path().to_path_buf()).unwrap();

        // Two producers race over an overlapping id range; exactly one copy
        // of each id survives.
        let a = {
            let log = log.clone();
            tokio::spawn(async move {
                for id in 1..=30i64 {
                    log.append(record(id)).await.unwrap();
                }
            })
        };
        let b = {
            let log = log.clone();
            tokio::spawn(async move {
                for id in 20..=50i64 {
                    log.append(record(id)).await.unwrap();
                }
            })
        };
        a.await.unwrap();
        b.await.unwrap();

        let status = log.status().await.unwrap();
        assert_eq!(status.records_today, 50);
        assert_eq!(status.duplicates, 11);
    }

    #[tokio::test]
    async fn duplicate_id_is_reported() {
        let dir = tempdir().unwrap();
        let (log, _task) = spawn(dir.path().to_path_buf()).unwrap();

        assert_eq!(log.append(record(101)).await.unwrap(), AppendOutcome::Appended);
        assert_eq!(log.append(record(101)).await.unwrap(), AppendOutcome::Duplicate);
        let status = log.status().await.unwrap();
        assert_eq!(status.records_today, 1);
        assert_eq!(status.duplicates, 1);
    }

    #[tokio::test]
    async fn late_arrival_lands_in_prior_day() {
        let dir = tempdir().unwrap();
        let (log, _task) = spawn(dir.path().to_path_buf()).unwrap();

        let yesterday = Local::now().date_naive() - Duration::days(1);
        let late = Local
            .from_local_datetime(&yesterday.and_hms_opt(23, 59, 58).unwrap())
            .unwrap()
            .with_timezone(&Utc);
        log.append(record_at(9001, late)).await.unwrap();

        let prior =
            partition::load_partition(&partition::partition_path(dir.path(), yesterday)).unwrap();
        assert_eq!(prior.len(), 1);
        assert_eq!(prior[0].message_id, 9001);
        let status = log.status().await.unwrap();
        assert_eq!(status.records_today, 0, "today's partition is untouched");
    }

    #[tokio::test]
    async fn cursor_is_monotonic_through_handle() {
        let dir = tempdir().unwrap();
        let (log, _task) = spawn(dir.path().to_path_buf()).unwrap();

        for id in [5, 9, 7] {
            log.advance_cursor(id).await.unwrap();
        }
        assert_eq!(log.cursor().await.unwrap(), 9);
    }

    #[tokio::test]
    async fn seal_removes_uploaded_records_but_keeps_dedup() {
        let dir = tempdir().unwrap();
        let (log, _task) = spawn(dir.path().to_path_buf()).unwrap();
        let today = Local::now().date_naive();

        log.append(record(1)).await.unwrap();
        log.append(record(2)).await.unwrap();

        let ticket = log.begin_seal(today).await.unwrap().expect("partition exists");
        log.complete_seal(ticket).await.unwrap();

        // Local file is gone, but the day's ids still deduplicate.
        assert!(!partition::partition_path(dir.path(), today).exists());
        assert_eq!(log.append(record(1)).await.unwrap(), AppendOutcome::Duplicate);
        assert_eq!(log.append(record(3)).await.unwrap(), AppendOutcome::Appended);
    }

    #[tokio::test]
    async fn records_appended_during_seal_survive() {
        let dir = tempdir().unwrap();
        let (log, _task) = spawn(dir.path().to_path_buf()).unwrap();
        let today = Local::now().date_naive();

        log.append(record(1)).await.unwrap();
        let ticket = log.begin_seal(today).await.unwrap().unwrap();
        // Arrives while the upload is notionally in flight.
        log.append(record(2)).await.unwrap();
        log.complete_seal(ticket).await.unwrap();

        let remaining =
            partition::load_partition(&partition::partition_path(dir.path(), today)).unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].message_id, 2);
    }

    #[tokio::test]
    async fn begin_seal_without_partition_returns_none() {
        let dir = tempdir().unwrap();
        let (log, _task) = spawn(dir.path().to_path_buf()).unwrap();
        let stray = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        assert!(log.begin_seal(stray).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn existing_ids_covers_active_and_stray_dates() {
        let dir = tempdir().unwrap();
        let (log, _task) = spawn(dir.path().to_path_buf()).unwrap();
        let today = Local::now().date_naive();
        let yesterday = today - Duration::days(1);

        log.append(record(10)).await.unwrap();
        let late = Local
            .from_local_datetime(&yesterday.and_hms_opt(12, 0, 0).unwrap())
            .unwrap()
            .with_timezone(&Utc);
        log.append(record_at(20, late)).await.unwrap();

        assert!(log.existing_ids(today).await.unwrap().contains(&10));
        assert!(log.existing_ids(yesterday).await.unwrap().contains(&20));
    }

    #[tokio::test]
    async fn corrupt_active_partition_fails_spawn() {
        let dir = tempdir().unwrap();
        let today = Local::now().date_naive();
        let path = partition::partition_path(dir.path(), today);
        // Two records with the same id violate the partition invariant.
        let duped = vec![record(1), record(1)];
        let json = serde_json::to_vec(&duped).unwrap();
        std::fs::write(&path, json).unwrap();

        let result = spawn(dir.path().to_path_buf());
        assert!(matches!(result, Err(MsgkeepError::Invariant(_))));
    }
}
