// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Cron scheduler for the maintenance jobs.
//!
//! Patterns are parsed up front so a typo fails startup instead of
//! silently never firing. A dedicated thread sleeps until the earliest
//! next occurrence and sends a typed job into the runtime loop; the jobs
//! themselves always execute on the async side.

use chrono::Local;
use croner::parser::{CronParser, Seconds};
use croner::Cron;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, info};

use msgkeep_config::model::ScheduleConfig;
use msgkeep_core::MsgkeepError;

const JOB_BUFFER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduledJob {
    Rotate,
    ShipLogs,
    Cleanup,
}

/// Parses the schedule and starts the timer thread. The receiver yields
/// one job per firing; dropping it stops the thread.
pub fn spawn(schedule: &ScheduleConfig) -> Result<mpsc::Receiver<ScheduledJob>, MsgkeepError> {
    let entries = vec![
        (parse(&schedule.rotate_at, "schedule.rotate_at")?, ScheduledJob::Rotate),
        (parse(&schedule.ship_logs_at, "schedule.ship_logs_at")?, ScheduledJob::ShipLogs),
        (parse(&schedule.cleanup_at, "schedule.cleanup_at")?, ScheduledJob::Cleanup),
    ];
    let (tx, rx) = mpsc::channel(JOB_BUFFER);
    std::thread::Builder::new()
        .name("msgkeep-cron".into())
        .spawn(move || run(entries, tx))
        .map_err(MsgkeepError::storage)?;
    info!("scheduler started");
    Ok(rx)
}

fn parse(pattern: &str, key: &str) -> Result<Cron, MsgkeepError> {
    CronParser::builder()
        .seconds(Seconds::Optional)
        .build()
        .parse(pattern)
        .map_err(|e| {
            MsgkeepError::Config(format!("{key}: invalid cron pattern {pattern:?}: {e}"))
        })
}

fn run(entries: Vec<(Cron, ScheduledJob)>, tx: mpsc::Sender<ScheduledJob>) {
    loop {
        let now = Local::now();
        let mut next = None;
        for (cron, job) in &entries {
            if let Ok(at) = cron.find_next_occurrence(&now, false)
                && next.as_ref().is_none_or(|(t, _)| at < *t)
            {
                next = Some((at, *job));
            }
        }
        let Some((at, job)) = next else {
            // All patterns exhausted; nothing will ever fire again.
            break;
        };
        let wait = (at - Local::now()).to_std().unwrap_or(Duration::ZERO);
        std::thread::sleep(wait);
        debug!(?job, "cron fired");
        if tx.blocking_send(job).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn schedule(rotate_at: &str) -> ScheduleConfig {
        ScheduleConfig {
            rotate_at: rotate_at.into(),
            ship_logs_at: "45 23 * * *".into(),
            cleanup_at: "15 0 * * *".into(),
        }
    }

    #[test]
    fn bad_pattern_fails_at_spawn() {
        let err = spawn(&schedule("not a cron")).err().map(|e| e.to_string());
        assert!(err.is_some_and(|msg| msg.contains("schedule.rotate_at")));
    }

    #[test]
    fn default_schedule_parses() {
        assert!(spawn(&ScheduleConfig::default()).is_ok());
    }

    #[tokio::test]
    async fn every_second_pattern_fires() {
        let mut rx = spawn(&schedule("* * * * * *")).unwrap();
        let job = tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .expect("job fires within the window");
        assert_eq!(job, Some(ScheduledJob::Rotate));
    }
}
