// SPDX-FileCopyrightText: 2026 Msgkeep Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SFTP-backed remote store.
//!
//! Every operation opens a fresh connection and closes it when done; the
//! remote is touched a handful of times a day, so holding a session open
//! buys nothing and long-lived sessions are what time out. All libssh2
//! work runs on the blocking pool.

use std::io;
use std::net::TcpStream;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use ssh2::{ErrorCode, Session, Sftp};
use tracing::{debug, info};

use msgkeep_config::model::RemoteConfig;
use msgkeep_core::{MsgkeepError, RemoteEntry, RemoteStore};

const SFTP_NO_SUCH_FILE: ErrorCode = ErrorCode::SFTP(2);

/// Connection parameters for one SFTP endpoint, validated at build time.
#[derive(Clone)]
pub struct SftpStore {
    host: String,
    port: u16,
    username: String,
    password: String,
    base_path: String,
}

impl SftpStore {
    /// Builds a store from config. A missing host, username, or password
    /// is a configuration error.
    pub fn new(config: &RemoteConfig) -> Result<Self, MsgkeepError> {
        let host = config
            .host
            .clone()
            .ok_or_else(|| MsgkeepError::Config("remote.host is required for uploads".into()))?;
        let username = config
            .username
            .clone()
            .ok_or_else(|| MsgkeepError::Config("remote.username is required".into()))?;
        let password = config
            .password
            .clone()
            .ok_or_else(|| MsgkeepError::Config("remote.password is required".into()))?;
        Ok(Self {
            host,
            port: config.port,
            username,
            password,
            base_path: config.base_path.trim_end_matches('/').to_string(),
        })
    }

    fn connect(&self) -> Result<Sftp, MsgkeepError> {
        let tcp = TcpStream::connect((self.host.as_str(), self.port)).map_err(|e| {
            MsgkeepError::remote(format!("cannot reach {}:{}", self.host, self.port), e)
        })?;
        let mut session =
            Session::new().map_err(|e| MsgkeepError::remote("ssh session setup failed", e))?;
        session.set_tcp_stream(tcp);
        session
            .handshake()
            .map_err(|e| MsgkeepError::remote("ssh handshake failed", e))?;
        session
            .userauth_password(&self.username, &self.password)
            .map_err(|e| MsgkeepError::remote("ssh authentication failed", e))?;
        session
            .sftp()
            .map_err(|e| MsgkeepError::remote("sftp subsystem failed", e))
    }

    /// Creates every directory on `path`, ignoring the ones that exist.
    fn ensure_dirs(sftp: &Sftp, path: &str) -> Result<(), MsgkeepError> {
        let mut current = String::new();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(component);
            let dir = Path::new(&current);
            if sftp.stat(dir).is_ok() {
                continue;
            }
            sftp.mkdir(dir, 0o755)
                .map_err(|e| MsgkeepError::remote(format!("cannot create {current}"), e))?;
            debug!(dir = %current, "created remote directory");
        }
        Ok(())
    }

    fn remote_path(&self, remote_name: &str) -> String {
        format!("{}/{}", self.base_path, remote_name)
    }
}

async fn blocking<T, F>(f: F) -> Result<T, MsgkeepError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, MsgkeepError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| MsgkeepError::Internal(format!("sftp worker failed: {e}")))?
}

#[async_trait]
impl RemoteStore for SftpStore {
    async fn upload(&self, local: &Path, remote_name: &str) -> Result<(), MsgkeepError> {
        let store = self.clone();
        let local = local.to_path_buf();
        let target = store.remote_path(remote_name);
        let name = remote_name.to_string();
        blocking(move || {
            let mut file = std::fs::File::open(&local).map_err(MsgkeepError::storage)?;
            let sftp = store.connect()?;
            // A '/' in the remote name nests the file under base_path.
            if let Some((dirs, _)) = target.rsplit_once('/') {
                SftpStore::ensure_dirs(&sftp, dirs)?;
            }
            let mut remote = sftp
                .create(Path::new(&target))
                .map_err(|e| MsgkeepError::remote(format!("cannot create {target}"), e))?;
            let bytes = io::copy(&mut file, &mut remote)
                .map_err(|e| MsgkeepError::remote(format!("upload of {target} failed"), e))?;
            info!(remote = %name, bytes, "uploaded");
            Ok(())
        })
        .await
    }

    async fn list(&self) -> Result<Vec<RemoteEntry>, MsgkeepError> {
        let store = self.clone();
        blocking(move || {
            let sftp = store.connect()?;
            let entries = match sftp.readdir(Path::new(&store.base_path)) {
                Ok(entries) => entries,
                // Nothing uploaded yet.
                Err(e) if e.code() == SFTP_NO_SUCH_FILE => return Ok(Vec::new()),
                Err(e) => {
                    return Err(MsgkeepError::remote(
                        format!("cannot list {}", store.base_path),
                        e,
                    ));
                }
            };
            let mut out = Vec::new();
            for (path, stat) in entries {
                if stat.is_dir() {
                    continue;
                }
                let Some(name) = path.file_name().map(|n| n.to_string_lossy().into_owned())
                else {
                    continue;
                };
                out.push(RemoteEntry {
                    name,
                    size: stat.size.unwrap_or(0),
                });
            }
            out.sort_by(|a, b| a.name.cmp(&b.name));
            Ok(out)
        })
        .await
    }

    async fn download(&self, remote_name: &str, dest_dir: &Path) -> Result<PathBuf, MsgkeepError> {
        let store = self.clone();
        let source = store.remote_path(remote_name);
        let file_name = remote_name
            .rsplit('/')
            .next()
            .unwrap_or(remote_name)
            .to_string();
        let dest = dest_dir.join(file_name);
        let target = dest.clone();
        blocking(move || {
            let sftp = store.connect()?;
            let mut remote = sftp
                .open(Path::new(&source))
                .map_err(|e| MsgkeepError::remote(format!("cannot open {source}"), e))?;
            let mut file = std::fs::File::create(&target).map_err(MsgkeepError::storage)?;
            io::copy(&mut remote, &mut file)
                .map_err(|e| MsgkeepError::remote(format!("download of {source} failed"), e))?;
            Ok(target)
        })
        .await?;
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(host: Option<&str>) -> RemoteConfig {
        RemoteConfig {
            host: host.map(str::to_string),
            username: Some("backup".into()),
            password: Some("secret".into()),
            ..Default::default()
        }
    }

    #[test]
    fn new_requires_a_host() {
        assert!(SftpStore::new(&config(None)).is_err());
        assert!(SftpStore::new(&config(Some("nas.local"))).is_ok());
    }

    #[test]
    fn base_path_trailing_slash_is_trimmed() {
        let mut cfg = config(Some("nas.local"));
        cfg.base_path = "telegram_backups/".into();
        let store = SftpStore::new(&cfg).unwrap();
        assert_eq!(
            store.remote_path("logs/msgkeep.log.2026-08-24"),
            "telegram_backups/logs/msgkeep.log.2026-08-24"
        );
    }
}
