// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Live-mutable ingestion settings.
//!
//! Scanners take a fresh snapshot at the start of every tick, so an
//! update through [`SharedSettings::update`] applies on the next tick
//! without restarting anything.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;

use msgkeep_config::model::IngestConfig;
use msgkeep_core::ChatKind;

/// One immutable snapshot of the ingestion knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    pub enable_saved: bool,
    pub enable_private: bool,
    pub enable_groups: bool,
    pub enable_channels: bool,
    pub saved_poll_interval: Duration,
    pub dialog_poll_interval: Duration,
    pub dialogs_per_scan: usize,
    pub messages_per_dialog: usize,
}

impl IngestSettings {
    /// Whether messages of the given chat kind should be captured at all.
    pub fn captures(&self, kind: ChatKind) -> bool {
        match kind {
            ChatKind::SavedMessages => self.enable_saved,
            ChatKind::Private => self.enable_private,
            ChatKind::Group => self.enable_groups,
            ChatKind::Channel => self.enable_channels,
        }
    }
}

impl From<&IngestConfig> for IngestSettings {
    fn from(config: &IngestConfig) -> Self {
        Self {
            enable_saved: config.enable_saved,
            enable_private: config.enable_private,
            enable_groups: config.enable_groups,
            enable_channels: config.enable_channels,
            saved_poll_interval: Duration::from_secs(config.saved_poll_interval_secs),
            dialog_poll_interval: Duration::from_secs(config.dialog_poll_interval_secs),
            dialogs_per_scan: config.dialogs_per_scan,
            messages_per_dialog: config.messages_per_dialog,
        }
    }
}

/// Cheaply cloneable handle to the current settings.
#[derive(Clone)]
pub struct SharedSettings {
    inner: Arc<ArcSwap<IngestSettings>>,
}

impl SharedSettings {
    pub fn new(settings: IngestSettings) -> Self {
        Self {
            inner: Arc::new(ArcSwap::from_pointee(settings)),
        }
    }

    /// The settings as of this instant; later updates do not affect the
    /// returned snapshot.
    pub fn snapshot(&self) -> Arc<IngestSettings> {
        self.inner.load_full()
    }

    /// Replaces the settings. Running ticks finish under their old
    /// snapshot; the next tick sees the new one.
    pub fn update(&self, settings: IngestSettings) {
        self.inner.store(Arc::new(settings));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> IngestSettings {
        IngestSettings::from(&IngestConfig::default())
    }

    #[test]
    fn defaults_capture_saved_and_private_only() {
        let s = base();
        assert!(s.captures(ChatKind::SavedMessages));
        assert!(s.captures(ChatKind::Private));
        assert!(!s.captures(ChatKind::Group));
        assert!(!s.captures(ChatKind::Channel));
    }

    #[test]
    fn update_applies_to_next_snapshot_only() {
        let shared = SharedSettings::new(base());
        let before = shared.snapshot();

        let mut changed = base();
        changed.enable_groups = true;
        shared.update(changed);

        assert!(!before.captures(ChatKind::Group), "old snapshot is immutable");
        assert!(shared.snapshot().captures(ChatKind::Group));
    }
}
