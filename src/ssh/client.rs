// Copyright 2025 Lablup Inc. and Jeongkyu Shin
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! SSH implementation of the remote shell contract.
//!
//! Commands run on session channels. Uploads go through the SFTP subsystem,
//! so the remote sshd must have it enabled (`Subsystem sftp internal-sftp`).

use async_trait::async_trait;
use russh::client::{Config, Handle};
use russh::keys::PrivateKeyWithHashAlg;
use russh_sftp::{client::SftpSession, protocol::OpenFlags};
use secrecy::ExposeSecret;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;

use super::handler::ClientHandler;
use super::known_hosts::StrictHostKeyChecking;
use super::session::{ExecResponse, RemoteShell, ShellConnector};
use crate::error::TransportError;
use crate::node::{AuthMode, Credentials, Node};

/// Initial capacity for command stdout
const SSH_CMD_BUFFER_SIZE: usize = 8192;

/// Initial capacity for command stderr
const SSH_RESPONSE_BUFFER_SIZE: usize = 1024;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Connection settings shared by every session a connector opens.
#[derive(Debug, Clone)]
pub struct ConnectionConfig {
    pub strict_mode: StrictHostKeyChecking,
    /// Overrides `~/.ssh/known_hosts`
    pub known_hosts_path: Option<PathBuf>,
    /// Bound on establishing the connection to one address. `None` waits indefinitely.
    pub connect_timeout: Option<Duration>,
    pub keepalive_interval: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            strict_mode: StrictHostKeyChecking::default(),
            known_hosts_path: None,
            connect_timeout: Some(DEFAULT_CONNECT_TIMEOUT),
            keepalive_interval: Some(DEFAULT_KEEPALIVE_INTERVAL),
        }
    }
}

/// Opens one [`SshShell`] per node.
#[derive(Debug, Clone, Default)]
pub struct SshConnector {
    config: ConnectionConfig,
}

impl SshConnector {
    pub fn new(config: ConnectionConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }
}

#[async_trait]
impl ShellConnector for SshConnector {
    async fn open(&self, node: &Node) -> Result<Box<dyn RemoteShell>, TransportError> {
        let shell = SshShell::connect(node, &self.config).await?;
        Ok(Box::new(shell))
    }
}

/// An authenticated SSH connection to one node.
pub struct SshShell {
    handle: Handle<ClientHandler>,
    target: String,
    closed: bool,
}

impl SshShell {
    /// Connect to the node and authenticate with its credentials.
    ///
    /// Public addresses are tried in order until one accepts the TCP
    /// connection and handshake. Authentication is attempted only on that
    /// first successful connection. A rejected host key aborts immediately.
    pub async fn connect(node: &Node, config: &ConnectionConfig) -> Result<Self, TransportError> {
        let ssh_config = Arc::new(Config {
            keepalive_interval: config.keepalive_interval,
            ..Default::default()
        });

        let mut last_error = None;
        let mut connected = None;

        for host in &node.public_addresses {
            let target = format!("{host}:{}", node.port);
            let handler = ClientHandler::new(
                host.clone(),
                node.port,
                config.strict_mode,
                config.known_hosts_path.clone(),
            );

            tracing::debug!("Connecting to {} for node {}", target, node.id);
            let attempt =
                russh::client::connect(ssh_config.clone(), (host.as_str(), node.port), handler);

            let result = match config.connect_timeout {
                Some(limit) => match tokio::time::timeout(limit, attempt).await {
                    Ok(result) => result,
                    Err(_) => {
                        last_error = Some(TransportError::Timeout {
                            target: target.clone(),
                            seconds: limit.as_secs(),
                        });
                        continue;
                    }
                },
                None => attempt.await,
            };

            match result {
                Ok(handle) => {
                    connected = Some((target, handle));
                    break;
                }
                Err(TransportError::Ssh(russh::Error::UnknownKey)) => {
                    return Err(TransportError::HostKeyRejected { target });
                }
                Err(e) => {
                    tracing::debug!("Connection to {} failed: {}", target, e);
                    last_error = Some(TransportError::connect(target, e));
                }
            }
        }

        let (target, mut handle) = match connected {
            Some(connection) => connection,
            None => {
                return Err(last_error.unwrap_or_else(|| {
                    TransportError::connect(node.id.clone(), "node has no public address")
                }))
            }
        };

        authenticate(&mut handle, &node.credentials).await?;
        tracing::debug!(
            "Authenticated to {} as {}",
            target,
            node.credentials.identity
        );

        Ok(Self {
            handle,
            target,
            closed: false,
        })
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    fn ensure_open(&self) -> Result<(), TransportError> {
        if self.closed || self.handle.is_closed() {
            return Err(TransportError::SessionClosed);
        }
        Ok(())
    }
}

/// Authenticate the handle with password or in-memory private key.
async fn authenticate(
    handle: &mut Handle<ClientHandler>,
    credentials: &Credentials,
) -> Result<(), TransportError> {
    let identity = credentials.identity.clone();
    let secret = credentials.secret().expose_secret();

    let outcome = match credentials.auth {
        AuthMode::Password => handle.authenticate_password(identity.as_str(), secret).await?,
        AuthMode::Key => {
            let key = russh::keys::decode_secret_key(secret, None).map_err(|e| {
                TransportError::Authentication {
                    identity: identity.clone(),
                    reason: format!("invalid private key: {e}"),
                }
            })?;
            let hash_alg = handle.best_supported_rsa_hash().await?.flatten();
            handle
                .authenticate_publickey(
                    identity.as_str(),
                    PrivateKeyWithHashAlg::new(Arc::new(key), hash_alg),
                )
                .await?
        }
    };

    if !outcome.success() {
        return Err(TransportError::Authentication {
            identity,
            reason: "server rejected the credentials".to_string(),
        });
    }

    Ok(())
}

#[async_trait]
impl RemoteShell for SshShell {
    async fn put(&mut self, path: &str, payload: &[u8]) -> Result<(), TransportError> {
        self.ensure_open()?;

        let channel = self.handle.channel_open_session().await?;
        channel.request_subsystem(true, "sftp").await?;
        let sftp = SftpSession::new(channel.into_stream())
            .await
            .map_err(|e| TransportError::upload(path, e))?;

        let mut file = sftp
            .open_with_flags(
                path,
                OpenFlags::CREATE | OpenFlags::TRUNCATE | OpenFlags::WRITE,
            )
            .await
            .map_err(|e| TransportError::upload(path, e))?;

        file.write_all(payload)
            .await
            .map_err(|e| TransportError::upload(path, e))?;
        file.flush()
            .await
            .map_err(|e| TransportError::upload(path, e))?;
        file.shutdown()
            .await
            .map_err(|e| TransportError::upload(path, e))?;

        tracing::trace!("Uploaded {} bytes to {}:{}", payload.len(), self.target, path);
        Ok(())
    }

    async fn exec(&mut self, command: &str) -> Result<ExecResponse, TransportError> {
        self.ensure_open()?;

        if command.trim().is_empty() {
            return Err(TransportError::exec("empty command not allowed"));
        }
        if command.contains('\0') {
            return Err(TransportError::exec("command contains null bytes"));
        }

        let mut stdout_buffer = Vec::with_capacity(SSH_CMD_BUFFER_SIZE);
        let mut stderr_buffer = Vec::with_capacity(SSH_RESPONSE_BUFFER_SIZE);
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        let mut exit_status: Option<u32> = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                russh::ChannelMsg::Data { ref data } => stdout_buffer.extend_from_slice(data),
                russh::ChannelMsg::ExtendedData { ref data, ext } => {
                    if ext == 1 {
                        stderr_buffer.extend_from_slice(data);
                    }
                }
                // The exit status may arrive before the remaining output, so
                // keep draining until the channel closes.
                russh::ChannelMsg::ExitStatus {
                    exit_status: status,
                } => exit_status = Some(status),
                _ => {}
            }
        }

        match exit_status {
            Some(exit_status) => Ok(ExecResponse {
                exit_status,
                stdout: String::from_utf8_lossy(&stdout_buffer).into_owned(),
                stderr: String::from_utf8_lossy(&stderr_buffer).into_owned(),
            }),
            None => Err(TransportError::ChannelClosed),
        }
    }

    async fn close(&mut self) -> Result<(), TransportError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.handle
            .disconnect(russh::Disconnect::ByApplication, "", "English")
            .await?;
        Ok(())
    }
}
