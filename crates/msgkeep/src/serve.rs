// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `msgkeep serve` command implementation.
//!
//! Wires the whole archiver: store writer, Telegram session, the three
//! source loops plus the push pump, the cron scheduler, and a control
//! channel for on-demand operations. Scheduled jobs and control commands
//! funnel into one event loop so every file mutation stays behind the
//! store's single writer.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, NaiveDate};
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use msgkeep_archive::{
    scheduler, RotationManager, ScheduledJob, SealedPartition, SftpStore, LOG_FILE_PREFIX,
};
use msgkeep_config::model::MsgkeepConfig;
use msgkeep_core::{ClientApi, MsgkeepError, RemoteStore};
use msgkeep_ingest::dialogs::DialogScanner;
use msgkeep_ingest::push::PushStream;
use msgkeep_ingest::reconcile::Reconciler;
use msgkeep_ingest::saved::SavedScanner;
use msgkeep_ingest::{IngestContext, IngestSettings, IngestStatus, SharedSettings, TickOutcome};
use msgkeep_store::StoreStatus;
use msgkeep_telegram::SessionClient;

use crate::shutdown;

/// Subdirectory of the data dir holding operational log files.
pub const LOG_DIR_NAME: &str = "logs";

const CONTROL_BUFFER: usize = 16;

/// Combined runtime state returned by the status control command.
#[derive(Debug, Clone, Serialize)]
pub struct RuntimeStatus {
    pub ingest: IngestStatus,
    pub store: StoreStatus,
    /// Past days still on disk, waiting for an upload to succeed.
    pub pending_uploads: Vec<NaiveDate>,
}

/// On-demand operations marshalled into the event loop.
pub enum ControlCommand {
    ForceRescan {
        reply: oneshot::Sender<Result<TickOutcome, MsgkeepError>>,
    },
    BackupNow {
        reply: oneshot::Sender<Result<Vec<SealedPartition>, MsgkeepError>>,
    },
    Status {
        reply: oneshot::Sender<Result<RuntimeStatus, MsgkeepError>>,
    },
}

/// Cloneable sender for control commands.
#[derive(Clone)]
pub struct ControlHandle {
    tx: mpsc::Sender<ControlCommand>,
}

impl ControlHandle {
    pub async fn force_rescan(&self) -> Result<TickOutcome, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::ForceRescan { reply }, rx).await
    }

    pub async fn backup_now(&self) -> Result<Vec<SealedPartition>, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::BackupNow { reply }, rx).await
    }

    pub async fn status(&self) -> Result<RuntimeStatus, MsgkeepError> {
        let (reply, rx) = oneshot::channel();
        self.send(ControlCommand::Status { reply }, rx).await
    }

    async fn send<T>(
        &self,
        command: ControlCommand,
        rx: oneshot::Receiver<Result<T, MsgkeepError>>,
    ) -> Result<T, MsgkeepError> {
        self.tx
            .send(command)
            .await
            .map_err(|_| MsgkeepError::Internal("runtime loop stopped".into()))?;
        rx.await
            .map_err(|_| MsgkeepError::Internal("runtime loop dropped the reply".into()))?
    }
}

/// The serve event loop: executes scheduled jobs and control commands.
pub struct Runtime {
    ctx: IngestContext,
    reconciler: Reconciler,
    rotation: Option<Arc<RotationManager>>,
    jobs: mpsc::Receiver<ScheduledJob>,
    jobs_open: bool,
    control_tx: mpsc::Sender<ControlCommand>,
    control_rx: mpsc::Receiver<ControlCommand>,
}

impl Runtime {
    pub fn new(
        ctx: IngestContext,
        rotation: Option<Arc<RotationManager>>,
        jobs: mpsc::Receiver<ScheduledJob>,
    ) -> Self {
        let (control_tx, control_rx) = mpsc::channel(CONTROL_BUFFER);
        Self {
            reconciler: Reconciler::new(ctx.clone()),
            ctx,
            rotation,
            jobs,
            jobs_open: true,
            control_tx,
            control_rx,
        }
    }

    pub fn control(&self) -> ControlHandle {
        ControlHandle {
            tx: self.control_tx.clone(),
        }
    }

    pub async fn run(mut self, cancel: CancellationToken) {
        enum Event {
            Job(ScheduledJob),
            JobsClosed,
            Control(ControlCommand),
            Shutdown,
        }
        loop {
            let event = tokio::select! {
                _ = cancel.cancelled() => Event::Shutdown,
                job = self.jobs.recv(), if self.jobs_open => match job {
                    Some(job) => Event::Job(job),
                    None => Event::JobsClosed,
                },
                Some(command) = self.control_rx.recv() => Event::Control(command),
            };
            match event {
                Event::Job(job) => self.execute(job).await,
                Event::JobsClosed => {
                    warn!("scheduler thread stopped");
                    self.jobs_open = false;
                }
                Event::Control(command) => self.handle_control(command).await,
                Event::Shutdown => break,
            }
        }
        debug!("runtime loop stopped");
    }

    async fn execute(&self, job: ScheduledJob) {
        let Some(rotation) = &self.rotation else {
            debug!(?job, "uploads disabled, skipping scheduled job");
            return;
        };
        let result = match job {
            ScheduledJob::Rotate => rotation.rotate().await.map(|sealed| {
                if sealed.is_empty() {
                    debug!("scheduled rotation found nothing to seal");
                }
                for partition in &sealed {
                    info!(date = %partition.date, records = partition.records, "scheduled rotation sealed");
                }
            }),
            ScheduledJob::ShipLogs => rotation.ship_logs().await.map(|shipped| {
                debug!(shipped, "scheduled log shipping done");
            }),
            ScheduledJob::Cleanup => rotation.cleanup().await.map(|removed| {
                debug!(removed, "scheduled cleanup done");
            }),
        };
        if let Err(err) = result {
            error!(?job, error = %err, "scheduled job failed");
        }
    }

    async fn handle_control(&self, command: ControlCommand) {
        match command {
            ControlCommand::ForceRescan { reply } => {
                let _ = reply.send(self.reconciler.run_once().await);
            }
            ControlCommand::BackupNow { reply } => {
                let result = match &self.rotation {
                    Some(rotation) => rotation.rotate().await,
                    None => Err(MsgkeepError::Config(
                        "remote.host is not configured, nothing to back up to".into(),
                    )),
                };
                let _ = reply.send(result);
            }
            ControlCommand::Status { reply } => {
                let _ = reply.send(self.runtime_status().await);
            }
        }
    }

    async fn runtime_status(&self) -> Result<RuntimeStatus, MsgkeepError> {
        let store = self.ctx.log.status().await?;
        let today = Local::now().date_naive();
        let pending_uploads = self
            .ctx
            .log
            .partitions()
            .await?
            .into_iter()
            .map(|(date, _path)| date)
            .filter(|date| *date < today)
            .collect();
        Ok(RuntimeStatus {
            ingest: self.ctx.status.snapshot(),
            store,
            pending_uploads,
        })
    }
}

/// Runs the `msgkeep serve` command until a shutdown signal.
pub async fn run_serve(config: MsgkeepConfig) -> Result<(), MsgkeepError> {
    let data_dir = PathBuf::from(&config.agent.data_dir);
    std::fs::create_dir_all(&data_dir).map_err(MsgkeepError::storage)?;
    let log_dir = data_dir.join(LOG_DIR_NAME);
    std::fs::create_dir_all(&log_dir).map_err(MsgkeepError::storage)?;
    let _log_guard = init_tracing(&config.agent.log_level, &log_dir);

    info!(
        name = %config.agent.name,
        data_dir = %data_dir.display(),
        "starting msgkeep serve"
    );

    let (log, writer_task) = msgkeep_store::spawn(data_dir.clone())?;
    let client: Arc<dyn ClientApi> = Arc::new(
        SessionClient::connect(&config.telegram, &data_dir).await?,
    );
    let principal_id = client.principal_id().await?;
    let settings = SharedSettings::new(IngestSettings::from(&config.ingest));
    let ctx = IngestContext::new(client, log.clone(), settings, principal_id);

    let rotation = match config.remote.host {
        Some(_) => {
            let remote: Arc<dyn RemoteStore> = Arc::new(SftpStore::new(&config.remote)?);
            Some(Arc::new(RotationManager::new(
                log.clone(),
                remote,
                data_dir.clone(),
                log_dir.clone(),
                config.remote.log_subpath.clone(),
            )))
        }
        None => {
            warn!("remote.host not configured, rotation uploads disabled");
            None
        }
    };

    // Days that ended while the process was down get shipped first.
    if let Some(rotation) = &rotation
        && let Err(err) = rotation.sweep_on_startup().await
    {
        warn!(error = %err, "startup sweep failed, partitions retained");
    }

    // One deep sweep over the current day before the incremental sources
    // take over.
    match Reconciler::new(ctx.clone()).run_once().await {
        Ok(outcome) => info!(
            appended = outcome.appended,
            duplicates = outcome.duplicates,
            "startup reconcile done"
        ),
        Err(err) => warn!(error = %err, "startup reconcile failed"),
    }

    let jobs = scheduler::spawn(&config.schedule)?;
    let cancel = shutdown::install_signal_handler();

    tokio::spawn(PushStream::new(ctx.clone()).run(cancel.clone()));
    tokio::spawn(SavedScanner::new(ctx.clone()).run(cancel.clone()));
    tokio::spawn(DialogScanner::new(ctx.clone()).run(cancel.clone()));

    let runtime = Runtime::new(ctx, rotation, jobs);
    runtime.run(cancel).await;

    // The writer exits once every handle is gone and the source loops
    // have finished their in-flight appends.
    drop(log);
    let _ = writer_task.await;
    info!("msgkeep serve shutdown complete");
    Ok(())
}

/// Initializes the tracing subscriber: env-filtered, stderr plus a
/// daily-rolling file under the data dir. The rolled files are what the
/// log shipping job uploads. The returned guard flushes on drop.
fn init_tracing(log_level: &str, log_dir: &Path) -> tracing_appender::non_blocking::WorkerGuard {
    use tracing_subscriber::fmt::writer::MakeWriterExt;
    use tracing_subscriber::EnvFilter;

    let appender = tracing_appender::rolling::daily(log_dir, LOG_FILE_PREFIX);
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let default_filter = [
        "msgkeep",
        "msgkeep_core",
        "msgkeep_config",
        "msgkeep_store",
        "msgkeep_ingest",
        "msgkeep_telegram",
        "msgkeep_archive",
    ]
    .map(|target| format!("{target}={log_level}"))
    .join(",");
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,{default_filter}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_ansi(false)
        .with_writer(file_writer.and(std::io::stderr))
        .init();
    guard
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use msgkeep_core::{ChatKind, MessageObservation};
    use msgkeep_test_utils::{MemoryRemote, ScriptedClient};
    use std::time::Duration;
    use tempfile::tempdir;

    fn saved_obs(id: i64) -> MessageObservation {
        MessageObservation {
            message_id: Some(id),
            chat_id: Some(777),
            chat_kind: Some(ChatKind::SavedMessages),
            sender_id: Some(777),
            text: Some(format!("note {id}")),
            timestamp: Some(Utc::now()),
            ..Default::default()
        }
    }

    struct Harness {
        client: Arc<ScriptedClient>,
        remote: Arc<MemoryRemote>,
        control: ControlHandle,
        jobs_tx: mpsc::Sender<ScheduledJob>,
        cancel: CancellationToken,
    }

    fn start(dir: &Path) -> Harness {
        let (log, _task) = msgkeep_store::spawn(dir.to_path_buf()).unwrap();
        let client = Arc::new(ScriptedClient::new(777));
        let settings = SharedSettings::new(IngestSettings::from(
            &msgkeep_config::model::IngestConfig::default(),
        ));
        let ctx = IngestContext::new(client.clone(), log.clone(), settings, 777);
        let remote = Arc::new(MemoryRemote::new());
        let rotation = Arc::new(RotationManager::new(
            log,
            remote.clone(),
            dir.to_path_buf(),
            dir.join(LOG_DIR_NAME),
            "logs".into(),
        ));
        let (jobs_tx, jobs_rx) = mpsc::channel(8);
        let runtime = Runtime::new(ctx, Some(rotation), jobs_rx);
        let control = runtime.control();
        let cancel = CancellationToken::new();
        tokio::spawn(runtime.run(cancel.clone()));
        Harness {
            client,
            remote,
            control,
            jobs_tx,
            cancel,
        }
    }

    #[tokio::test]
    async fn force_rescan_ingests_and_reports() {
        let dir = tempdir().unwrap();
        let harness = start(dir.path());
        harness
            .client
            .set_saved_history(vec![saved_obs(2), saved_obs(1)]);

        let outcome = harness.control.force_rescan().await.unwrap();
        assert_eq!(outcome.appended, 2);

        let status = harness.control.status().await.unwrap();
        assert_eq!(status.store.records_today, 2);
        assert_eq!(status.store.cursor, 2);
        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn backup_now_seals_through_the_control_channel() {
        let dir = tempdir().unwrap();
        let harness = start(dir.path());
        harness.client.set_saved_history(vec![saved_obs(1)]);
        harness.control.force_rescan().await.unwrap();

        let sealed = harness.control.backup_now().await.unwrap();
        assert_eq!(sealed.len(), 1);
        assert_eq!(sealed[0].records, 1);
        assert!(harness.remote.contains(&sealed[0].remote_name));
        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn status_reports_retained_past_days() {
        let dir = tempdir().unwrap();
        let yesterday = Local::now().date_naive() - chrono::Duration::days(1);
        std::fs::write(
            dir.path()
                .join(msgkeep_store::partition_file_name(yesterday)),
            b"[]",
        )
        .unwrap();
        let harness = start(dir.path());

        let status = harness.control.status().await.unwrap();
        assert_eq!(status.pending_uploads, vec![yesterday]);

        // Backing up clears the backlog from the report.
        harness.control.backup_now().await.unwrap();
        let status = harness.control.status().await.unwrap();
        assert!(status.pending_uploads.is_empty());
        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn scheduled_rotate_reaches_the_remote() {
        let dir = tempdir().unwrap();
        let harness = start(dir.path());
        harness.client.set_saved_history(vec![saved_obs(1)]);
        harness.control.force_rescan().await.unwrap();

        harness.jobs_tx.send(ScheduledJob::Rotate).await.unwrap();
        for _ in 0..50 {
            if !harness.remote.names().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert_eq!(harness.remote.names().len(), 1);
        harness.cancel.cancel();
    }

    #[tokio::test]
    async fn backup_without_remote_is_a_config_error() {
        let dir = tempdir().unwrap();
        let (log, _task) = msgkeep_store::spawn(dir.path().to_path_buf()).unwrap();
        let settings = SharedSettings::new(IngestSettings::from(
            &msgkeep_config::model::IngestConfig::default(),
        ));
        let ctx = IngestContext::new(Arc::new(ScriptedClient::new(777)), log, settings, 777);
        let (_jobs_tx, jobs_rx) = mpsc::channel::<ScheduledJob>(1);
        let runtime = Runtime::new(ctx, None, jobs_rx);
        let control = runtime.control();
        let cancel = CancellationToken::new();
        tokio::spawn(runtime.run(cancel.clone()));

        assert!(matches!(
            control.backup_now().await,
            Err(MsgkeepError::Config(_))
        ));
        cancel.cancel();
    }
}
