// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the msgkeep archiver.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use serde::{Deserialize, Serialize};

/// Top-level msgkeep configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values; the serve command
/// additionally requires the Telegram credentials to be present.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct MsgkeepConfig {
    /// Process identity, logging, and local data directory.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Telegram user-session credentials.
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Ingestion behavior: which chat kinds to capture and how often to scan.
    #[serde(default)]
    pub ingest: IngestConfig,

    /// SFTP remote archive settings.
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Cron schedules for rotation, log shipping, and cleanup.
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

/// Process identity and local data configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct AgentConfig {
    /// Display name of the archiver instance.
    #[serde(default = "default_agent_name")]
    pub name: String,

    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Directory holding day partitions, the cursor file, and rotated logs.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            name: default_agent_name(),
            log_level: default_log_level(),
            data_dir: default_data_dir(),
        }
    }
}

fn default_agent_name() -> String {
    "msgkeep".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_data_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("msgkeep"))
        .unwrap_or_else(|| std::path::PathBuf::from("msgkeep-data"))
        .to_string_lossy()
        .into_owned()
}

/// Telegram user-session configuration.
///
/// These identify the account whose messages are archived. `api_id` and
/// `api_hash` come from my.telegram.org; `principal_id` is the numeric id
/// of the account itself.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TelegramConfig {
    /// Application id issued for the MTProto session.
    #[serde(default)]
    pub api_id: Option<i32>,

    /// Application hash issued for the MTProto session.
    #[serde(default)]
    pub api_hash: Option<String>,

    /// Numeric user id of the archived account.
    #[serde(default)]
    pub principal_id: Option<i64>,

    /// Path to the persisted session file.
    #[serde(default = "default_session_file")]
    pub session_file: String,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_id: None,
            api_hash: None,
            principal_id: None,
            session_file: default_session_file(),
        }
    }
}

fn default_session_file() -> String {
    dirs::data_dir()
        .map(|p| p.join("msgkeep").join("msgkeep.session"))
        .unwrap_or_else(|| std::path::PathBuf::from("msgkeep.session"))
        .to_string_lossy()
        .into_owned()
}

/// Ingestion configuration.
///
/// These values are live-mutable at runtime; changes apply on the next
/// scanner tick.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct IngestConfig {
    /// Capture the account's own Saved Messages chat.
    #[serde(default = "default_true")]
    pub enable_saved: bool,

    /// Capture private (one-on-one) chats.
    #[serde(default = "default_true")]
    pub enable_private: bool,

    /// Capture group chats.
    #[serde(default = "default_false")]
    pub enable_groups: bool,

    /// Capture broadcast channels.
    #[serde(default = "default_false")]
    pub enable_channels: bool,

    /// Seconds between Saved Messages scan ticks.
    #[serde(default = "default_saved_poll_interval_secs")]
    pub saved_poll_interval_secs: u64,

    /// Seconds between dialog scan ticks.
    #[serde(default = "default_dialog_poll_interval_secs")]
    pub dialog_poll_interval_secs: u64,

    /// How many recent dialogs each dialog scan inspects.
    #[serde(default = "default_dialogs_per_scan")]
    pub dialogs_per_scan: usize,

    /// How many newest messages to fetch per inspected dialog.
    #[serde(default = "default_messages_per_dialog")]
    pub messages_per_dialog: usize,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            enable_saved: default_true(),
            enable_private: default_true(),
            enable_groups: default_false(),
            enable_channels: default_false(),
            saved_poll_interval_secs: default_saved_poll_interval_secs(),
            dialog_poll_interval_secs: default_dialog_poll_interval_secs(),
            dialogs_per_scan: default_dialogs_per_scan(),
            messages_per_dialog: default_messages_per_dialog(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_false() -> bool {
    false
}

fn default_saved_poll_interval_secs() -> u64 {
    30
}

fn default_dialog_poll_interval_secs() -> u64 {
    120
}

fn default_dialogs_per_scan() -> usize {
    10
}

fn default_messages_per_dialog() -> usize {
    20
}

/// SFTP remote archive configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RemoteConfig {
    /// Remote host. `None` disables rotation uploads.
    #[serde(default)]
    pub host: Option<String>,

    /// SFTP port.
    #[serde(default = "default_remote_port")]
    pub port: u16,

    /// Login username.
    #[serde(default)]
    pub username: Option<String>,

    /// Login password.
    #[serde(default)]
    pub password: Option<String>,

    /// Base directory on the remote host for sealed partitions.
    #[serde(default = "default_base_path")]
    pub base_path: String,

    /// Subdirectory under `base_path` for shipped operational logs.
    #[serde(default = "default_log_subpath")]
    pub log_subpath: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            host: None,
            port: default_remote_port(),
            username: None,
            password: None,
            base_path: default_base_path(),
            log_subpath: default_log_subpath(),
        }
    }
}

fn default_remote_port() -> u16 {
    22
}

fn default_base_path() -> String {
    "telegram_backups".to_string()
}

fn default_log_subpath() -> String {
    "logs".to_string()
}

/// Cron schedules for the three recurring archive jobs.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    /// When to seal and upload day partitions.
    #[serde(default = "default_rotate_at")]
    pub rotate_at: String,

    /// When to ship rotated operational logs. Runs before rotation so the
    /// day's log upload does not race the partition upload.
    #[serde(default = "default_ship_logs_at")]
    pub ship_logs_at: String,

    /// When to delete sealed leftovers (temp downloads and the like).
    #[serde(default = "default_cleanup_at")]
    pub cleanup_at: String,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            rotate_at: default_rotate_at(),
            ship_logs_at: default_ship_logs_at(),
            cleanup_at: default_cleanup_at(),
        }
    }
}

fn default_rotate_at() -> String {
    "59 23 * * *".to_string()
}

fn default_ship_logs_at() -> String {
    "45 23 * * *".to_string()
}

fn default_cleanup_at() -> String {
    "15 0 * * *".to_string()
}
