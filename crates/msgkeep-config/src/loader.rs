// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./msgkeep.toml` > `~/.config/msgkeep/msgkeep.toml` > `/etc/msgkeep/msgkeep.toml`
//! with environment variable overrides via `MSGKEEP_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::MsgkeepConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/msgkeep/msgkeep.toml` (system-wide)
/// 3. `~/.config/msgkeep/msgkeep.toml` (user XDG config)
/// 4. `./msgkeep.toml` (local directory)
/// 5. `MSGKEEP_*` environment variables
pub fn load_config() -> Result<MsgkeepConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MsgkeepConfig::default()))
        .merge(Toml::file("/etc/msgkeep/msgkeep.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("msgkeep/msgkeep.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("msgkeep.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<MsgkeepConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MsgkeepConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<MsgkeepConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(MsgkeepConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for section-to-dot mapping.
///
/// Uses `Env::map()` rather than `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names. For example, `MSGKEEP_TELEGRAM_API_HASH`
/// must map to `telegram.api_hash`, not `telegram.api.hash`.
fn env_provider() -> Env {
    Env::prefixed("MSGKEEP_").map(|key| {
        // `key` is the lowercased env var name with prefix stripped.
        // Example: MSGKEEP_TELEGRAM_API_HASH -> "telegram_api_hash"
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("agent_", "agent.", 1)
            .replacen("telegram_", "telegram.", 1)
            .replacen("ingest_", "ingest.", 1)
            .replacen("remote_", "remote.", 1)
            .replacen("schedule_", "schedule.", 1);
        mapped.into()
    })
}
