// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes, such as non-empty paths, non-zero scan intervals, and the
//! credentials the serve command cannot run without.

use crate::diagnostic::ConfigError;
use crate::model::MsgkeepConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Returns `Ok(())` if all validations pass, or `Err(Vec<ConfigError>)` with
/// all collected validation errors (does not fail fast).
pub fn validate_config(config: &MsgkeepConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.agent.data_dir.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "agent.data_dir must not be empty".to_string(),
        });
    }

    if config.telegram.session_file.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "telegram.session_file must not be empty".to_string(),
        });
    }

    if config.ingest.saved_poll_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "ingest.saved_poll_interval_secs must be at least 1".to_string(),
        });
    }

    if config.ingest.dialog_poll_interval_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "ingest.dialog_poll_interval_secs must be at least 1".to_string(),
        });
    }

    if config.ingest.dialogs_per_scan == 0 {
        errors.push(ConfigError::Validation {
            message: "ingest.dialogs_per_scan must be at least 1".to_string(),
        });
    }

    if config.ingest.messages_per_dialog == 0 {
        errors.push(ConfigError::Validation {
            message: "ingest.messages_per_dialog must be at least 1".to_string(),
        });
    }

    if config.remote.port == 0 {
        errors.push(ConfigError::Validation {
            message: "remote.port must not be 0".to_string(),
        });
    }

    if config.remote.base_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "remote.base_path must not be empty".to_string(),
        });
    }

    for (key, expr) in [
        ("schedule.rotate_at", &config.schedule.rotate_at),
        ("schedule.ship_logs_at", &config.schedule.ship_logs_at),
        ("schedule.cleanup_at", &config.schedule.cleanup_at),
    ] {
        if expr.trim().is_empty() {
            errors.push(ConfigError::Validation {
                message: format!("{key} must not be empty"),
            });
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Validate the additional requirements of the serve command.
///
/// The archiver cannot authenticate without the MTProto credentials, and
/// cannot classify outgoing messages without the principal id. Missing
/// values here are fatal at startup.
pub fn validate_serve_requirements(config: &MsgkeepConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    if config.telegram.api_id.is_none() {
        errors.push(ConfigError::MissingKey {
            key: "telegram.api_id".to_string(),
        });
    }

    if config
        .telegram
        .api_hash
        .as_deref()
        .is_none_or(|h| h.trim().is_empty())
    {
        errors.push(ConfigError::MissingKey {
            key: "telegram.api_hash".to_string(),
        });
    }

    if config.telegram.principal_id.is_none() {
        errors.push(ConfigError::MissingKey {
            key: "telegram.principal_id".to_string(),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = MsgkeepConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_data_dir_fails_validation() {
        let mut config = MsgkeepConfig::default();
        config.agent.data_dir = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("data_dir"))));
    }

    #[test]
    fn zero_poll_interval_fails_validation() {
        let mut config = MsgkeepConfig::default();
        config.ingest.saved_poll_interval_secs = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("saved_poll_interval_secs"))));
    }

    #[test]
    fn zero_dialogs_per_scan_fails_validation() {
        let mut config = MsgkeepConfig::default();
        config.ingest.dialogs_per_scan = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("dialogs_per_scan"))));
    }

    #[test]
    fn default_config_is_not_servable() {
        let config = MsgkeepConfig::default();
        let errors = validate_serve_requirements(&config).unwrap_err();
        assert_eq!(errors.len(), 3, "api_id, api_hash, and principal_id missing");
    }

    #[test]
    fn complete_credentials_are_servable() {
        let mut config = MsgkeepConfig::default();
        config.telegram.api_id = Some(12345);
        config.telegram.api_hash = Some("abcdef".to_string());
        config.telegram.principal_id = Some(777);
        assert!(validate_serve_requirements(&config).is_ok());
    }

    #[test]
    fn blank_api_hash_counts_as_missing() {
        let mut config = MsgkeepConfig::default();
        config.telegram.api_id = Some(12345);
        config.telegram.api_hash = Some("   ".to_string());
        config.telegram.principal_id = Some(777);
        let errors = validate_serve_requirements(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::MissingKey { key } if key == "telegram.api_hash")));
    }

    #[test]
    fn unknown_ingest_key_is_rejected() {
        let toml_str = r#"
[ingest]
enable_saved = true
enable_everything = true
"#;
        let result = toml::from_str::<MsgkeepConfig>(toml_str);
        assert!(result.is_err());
    }

    #[test]
    fn ingest_section_deserializes_with_defaults() {
        let toml_str = r#"
[ingest]
enable_groups = true
dialogs_per_scan = 5
"#;
        let config: MsgkeepConfig = toml::from_str(toml_str).unwrap();
        assert!(config.ingest.enable_groups);
        assert_eq!(config.ingest.dialogs_per_scan, 5);
        // Untouched keys keep their defaults.
        assert!(config.ingest.enable_saved);
        assert_eq!(config.ingest.messages_per_dialog, 20);
    }
}
