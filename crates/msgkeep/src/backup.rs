// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! One-shot `msgkeep backup` and `msgkeep rescan` commands.
//!
//! Both open the store directly, so they must not run while `msgkeep
//! serve` owns the data directory.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use msgkeep_config::model::MsgkeepConfig;
use msgkeep_core::{ClientApi, MsgkeepError, RemoteStore};
use msgkeep_ingest::reconcile::Reconciler;
use msgkeep_ingest::{IngestContext, IngestSettings, SharedSettings};
use msgkeep_telegram::SessionClient;

use msgkeep_archive::{RotationManager, SftpStore};

use crate::serve::LOG_DIR_NAME;

/// Seals and uploads every partition right now: stale days first, then
/// the current one.
pub async fn run_backup(config: &MsgkeepConfig) -> Result<(), MsgkeepError> {
    let data_dir = PathBuf::from(&config.agent.data_dir);
    std::fs::create_dir_all(&data_dir).map_err(MsgkeepError::storage)?;
    let (log, _writer_task) = msgkeep_store::spawn(data_dir.clone())?;
    let remote: Arc<dyn RemoteStore> = Arc::new(SftpStore::new(&config.remote)?);
    let rotation = RotationManager::new(
        log.clone(),
        remote,
        data_dir.clone(),
        data_dir.join(LOG_DIR_NAME),
        config.remote.log_subpath.clone(),
    );

    let sealed = rotation.rotate().await?;
    if sealed.is_empty() {
        println!("Nothing to back up.");
    } else {
        for partition in &sealed {
            println!(
                "Sealed {} ({} records) -> {}",
                partition.date, partition.records, partition.remote_name
            );
        }
    }
    drop(log);
    Ok(())
}

/// Connects to the account and runs one deep reconcile sweep.
pub async fn run_rescan(config: &MsgkeepConfig) -> Result<(), MsgkeepError> {
    let data_dir = PathBuf::from(&config.agent.data_dir);
    std::fs::create_dir_all(&data_dir).map_err(MsgkeepError::storage)?;
    let (log, _writer_task) = msgkeep_store::spawn(data_dir.clone())?;
    let client: Arc<dyn ClientApi> = Arc::new(
        SessionClient::connect(&config.telegram, &data_dir).await?,
    );
    let principal_id = client.principal_id().await?;
    let settings = SharedSettings::new(IngestSettings::from(&config.ingest));
    let ctx = IngestContext::new(client, log.clone(), settings, principal_id);

    let outcome = Reconciler::new(ctx).run_once().await?;
    info!(
        appended = outcome.appended,
        duplicates = outcome.duplicates,
        skipped = outcome.skipped,
        "rescan done"
    );
    println!(
        "Rescan complete: {} new, {} already stored, {} skipped.",
        outcome.appended, outcome.duplicates, outcome.skipped
    );
    drop(log);
    Ok(())
}
