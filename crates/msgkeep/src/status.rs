// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `msgkeep status` command implementation.
//!
//! Inspects the local archive state: the open day partitions, their
//! record counts, and the scan cursor. Works whether or not the serve
//! process is running, since everything lives on disk.

use std::io::IsTerminal;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;

use msgkeep_config::model::MsgkeepConfig;
use msgkeep_core::MsgkeepError;
use msgkeep_store::cursor::Cursor;
use msgkeep_store::partition::{list_partitions, load_partition};

/// One local day partition.
#[derive(Debug, Serialize)]
pub struct PartitionSummary {
    pub date: NaiveDate,
    pub records: usize,
    pub bytes: u64,
}

/// Structured status output for `--json` mode.
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub data_dir: String,
    pub cursor: i64,
    pub total_records: usize,
    pub partitions: Vec<PartitionSummary>,
    pub remote_host: Option<String>,
}

/// Runs the `msgkeep status` command.
///
/// If `--json` is passed, outputs structured JSON for scripting.
/// If `--plain` is passed or stdout is not a TTY, disables colors.
pub fn run_status(config: &MsgkeepConfig, json: bool, plain: bool) -> Result<(), MsgkeepError> {
    let report = collect(config)?;
    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&report).unwrap_or_else(|_| "{}".to_string())
        );
    } else {
        let use_color = !plain && std::io::stdout().is_terminal();
        print_report(&report, use_color);
    }
    Ok(())
}

fn collect(config: &MsgkeepConfig) -> Result<StatusReport, MsgkeepError> {
    let data_dir = Path::new(&config.agent.data_dir);
    let mut partitions = Vec::new();
    let mut total_records = 0usize;
    if data_dir.is_dir() {
        for (date, path) in list_partitions(data_dir)? {
            let records = load_partition(&path)?.len();
            let bytes = std::fs::metadata(&path)
                .map(|meta| meta.len())
                .unwrap_or(0);
            total_records += records;
            partitions.push(PartitionSummary {
                date,
                records,
                bytes,
            });
        }
    }
    Ok(StatusReport {
        data_dir: config.agent.data_dir.clone(),
        cursor: Cursor::load(data_dir).value(),
        total_records,
        partitions,
        remote_host: config.remote.host.clone(),
    })
}

fn print_report(report: &StatusReport, use_color: bool) {
    println!();
    println!("  msgkeep status");
    println!("  {}", "-".repeat(35));
    println!("    Data dir: {}", report.data_dir);
    println!("    Cursor:   {}", report.cursor);
    match &report.remote_host {
        Some(host) => println!("    Remote:   {host}"),
        None => {
            if use_color {
                use colored::Colorize;
                println!("    Remote:   {}", "not configured".yellow());
            } else {
                println!("    Remote:   not configured");
            }
        }
    }
    println!();
    if report.partitions.is_empty() {
        println!("    No open partitions (everything sealed or nothing archived yet).");
    } else {
        println!("    Open partitions:");
        for partition in &report.partitions {
            let line = format!(
                "{}  {:>6} records  {:>8} bytes",
                partition.date, partition.records, partition.bytes
            );
            if use_color {
                use colored::Colorize;
                println!("      {}", line.green());
            } else {
                println!("      {line}");
            }
        }
        println!();
        println!("    Total: {} records", report.total_records);
    }
    println!();
}
