// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Telegram transport for the msgkeep archiver.
//!
//! Implements the client trait over a grammers MTProto session. The
//! session file must already be authorized; provisioning it is a one-time
//! manual step and this crate refuses to start without it.

pub mod map;

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;
use grammers_client::{Client, Config, InitParams};
use grammers_session::{PackedChat, Session};
use tracing::{debug, info};

use msgkeep_config::model::TelegramConfig;
use msgkeep_core::{ClientApi, DialogInfo, MessageObservation, MsgkeepError, RawUpdate};

/// A connected, authorized session.
pub struct SessionClient {
    client: Client,
    principal_id: i64,
    me: PackedChat,
    /// Packed peers from the last dialog listing, needed to fetch a
    /// chat's history without a fresh resolve round trip.
    peers: Mutex<HashMap<i64, PackedChat>>,
}

impl SessionClient {
    /// Connects and verifies authorization. Missing credentials, an
    /// unauthorized session file, or a principal mismatch are all
    /// configuration errors: nothing to retry.
    pub async fn connect(config: &TelegramConfig, data_dir: &Path) -> Result<Self, MsgkeepError> {
        let api_id = config
            .api_id
            .ok_or_else(|| MsgkeepError::Config("telegram.api_id is required".into()))?;
        let api_hash = config
            .api_hash
            .clone()
            .filter(|hash| !hash.trim().is_empty())
            .ok_or_else(|| MsgkeepError::Config("telegram.api_hash is required".into()))?;
        let session_path = resolve_session_path(&config.session_file, data_dir);

        let session =
            Session::load_file_or_create(&session_path).map_err(MsgkeepError::storage)?;
        let client = Client::connect(Config {
            session,
            api_id,
            api_hash,
            params: InitParams::default(),
        })
        .await
        .map_err(|e| MsgkeepError::transport("failed to connect to Telegram", e))?;

        let authorized = client
            .is_authorized()
            .await
            .map_err(|e| MsgkeepError::transport("authorization check failed", e))?;
        if !authorized {
            return Err(MsgkeepError::Config(format!(
                "session file {} is not authorized; sign in once to provision it",
                session_path.display()
            )));
        }

        let me = client
            .get_me()
            .await
            .map_err(|e| MsgkeepError::transport("failed to resolve own account", e))?;
        let principal_id = me.id();
        if let Some(expected) = config.principal_id
            && expected != principal_id
        {
            return Err(MsgkeepError::Config(format!(
                "telegram.principal_id is {expected} but the session belongs to {principal_id}"
            )));
        }

        client
            .session()
            .save_to_file(&session_path)
            .map_err(MsgkeepError::storage)?;
        info!(principal_id, "telegram session connected");

        Ok(Self {
            me: me.pack(),
            principal_id,
            client,
            peers: Mutex::new(HashMap::new()),
        })
    }

    fn peer(&self, chat_id: i64) -> Option<PackedChat> {
        self.lock_peers().get(&chat_id).copied()
    }

    fn lock_peers(&self) -> std::sync::MutexGuard<'_, HashMap<i64, PackedChat>> {
        self.peers.lock().unwrap_or_else(|p| p.into_inner())
    }
}

fn resolve_session_path(session_file: &str, data_dir: &Path) -> PathBuf {
    let path = Path::new(session_file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        data_dir.join(path)
    }
}

#[async_trait]
impl ClientApi for SessionClient {
    async fn principal_id(&self) -> Result<i64, MsgkeepError> {
        Ok(self.principal_id)
    }

    async fn saved_history(
        &self,
        offset_id: i64,
        limit: usize,
    ) -> Result<Vec<MessageObservation>, MsgkeepError> {
        let mut iter = self.client.iter_messages(self.me).limit(limit);
        if offset_id > 0 {
            iter = iter.offset_id(offset_id as i32);
        }
        let mut out = Vec::with_capacity(limit);
        while let Some(message) = iter
            .next()
            .await
            .map_err(|e| MsgkeepError::transport("saved history fetch failed", e))?
        {
            out.push(map::observation(&message, self.principal_id));
            if out.len() == limit {
                break;
            }
        }
        debug!(offset_id, fetched = out.len(), "saved history page");
        Ok(out)
    }

    async fn recent_dialogs(&self, limit: usize) -> Result<Vec<DialogInfo>, MsgkeepError> {
        let mut iter = self.client.iter_dialogs().limit(limit);
        let mut out = Vec::with_capacity(limit);
        while let Some(dialog) = iter
            .next()
            .await
            .map_err(|e| MsgkeepError::transport("dialog listing failed", e))?
        {
            let chat = dialog.chat();
            self.lock_peers().insert(chat.id(), chat.pack());
            out.push(map::dialog_info(&dialog, self.principal_id));
            if out.len() == limit {
                break;
            }
        }
        Ok(out)
    }

    async fn chat_history(
        &self,
        dialog: &DialogInfo,
        limit: usize,
    ) -> Result<Vec<MessageObservation>, MsgkeepError> {
        let peer = self.peer(dialog.chat_id).ok_or_else(|| MsgkeepError::Transport {
            message: format!("chat {} not resolved by a dialog listing yet", dialog.chat_id),
            source: None,
        })?;
        let mut iter = self.client.iter_messages(peer).limit(limit);
        let mut out = Vec::with_capacity(limit);
        while let Some(message) = iter
            .next()
            .await
            .map_err(|e| MsgkeepError::transport("chat history fetch failed", e))?
        {
            out.push(map::observation(&message, self.principal_id));
            if out.len() == limit {
                break;
            }
        }
        Ok(out)
    }

    async fn next_update(&self) -> Result<RawUpdate, MsgkeepError> {
        let update = self
            .client
            .next_update()
            .await
            .map_err(|e| MsgkeepError::transport("update stream failed", e))?;
        Ok(map::raw_update(update, self.principal_id))
    }
}
