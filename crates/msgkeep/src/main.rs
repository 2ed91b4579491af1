// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Msgkeep - a personal Telegram message archiver.
//!
//! This is the binary entry point for the msgkeep daemon and its
//! one-shot maintenance commands.

mod backup;
mod serve;
mod shutdown;
mod status;

use clap::{Parser, Subcommand};

use msgkeep_config::model::MsgkeepConfig;

/// Msgkeep - a personal Telegram message archiver.
#[derive(Parser, Debug)]
#[command(name = "msgkeep", version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the archiver: live ingestion, scanners, and scheduled rotation.
    Serve,
    /// Show the local archive state.
    Status {
        /// Output structured JSON for scripting.
        #[arg(long)]
        json: bool,
        /// Disable colored output.
        #[arg(long)]
        plain: bool,
    },
    /// Seal and upload day partitions right now.
    Backup,
    /// Run one deep reconcile sweep against the account.
    Rescan,
    /// Print the effective configuration with secrets redacted.
    Config,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let config = match msgkeep_config::load_and_validate() {
        Ok(config) => config,
        Err(errors) => {
            msgkeep_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    let result = match cli.command {
        Some(Commands::Serve) => {
            require_serve_config(&config);
            serve::run_serve(config).await
        }
        Some(Commands::Status { json, plain }) => status::run_status(&config, json, plain),
        Some(Commands::Backup) => backup::run_backup(&config).await,
        Some(Commands::Rescan) => {
            require_serve_config(&config);
            backup::run_rescan(&config).await
        }
        Some(Commands::Config) => {
            print_config(&config);
            Ok(())
        }
        None => {
            println!("msgkeep: use --help for available commands");
            Ok(())
        }
    };

    if let Err(err) = result {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

/// Commands that talk to the account need the full credential set.
fn require_serve_config(config: &MsgkeepConfig) {
    if let Err(errors) = msgkeep_config::validate_serve_requirements(config) {
        msgkeep_config::render_errors(&errors);
        std::process::exit(1);
    }
}

fn print_config(config: &MsgkeepConfig) {
    let mut redacted = config.clone();
    if redacted.telegram.api_hash.is_some() {
        redacted.telegram.api_hash = Some("<redacted>".into());
    }
    if redacted.remote.password.is_some() {
        redacted.remote.password = Some("<redacted>".into());
    }
    match toml::to_string_pretty(&redacted) {
        Ok(rendered) => print!("{rendered}"),
        Err(e) => eprintln!("error: cannot render configuration: {e}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn binary_loads_config_defaults() {
        let config = msgkeep_config::load_and_validate_str("")
            .expect("default config should be valid");
        assert_eq!(config.agent.name, "msgkeep");
    }

    #[test]
    fn secrets_are_redacted_in_config_output() {
        let mut config = MsgkeepConfig::default();
        config.telegram.api_hash = Some("deadbeef".into());
        config.remote.password = Some("hunter2".into());
        let mut redacted = config.clone();
        redacted.telegram.api_hash = Some("<redacted>".into());
        redacted.remote.password = Some("<redacted>".into());
        let rendered = toml::to_string_pretty(&redacted).unwrap();
        assert!(!rendered.contains("deadbeef"));
        assert!(!rendered.contains("hunter2"));
    }
}
