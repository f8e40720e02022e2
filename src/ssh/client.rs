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

//! Minimal russh-based SSH session.
//!
//! One session per host per run: connect, authenticate, run one command
//! (optionally feeding stdin), read back stdout/stderr and the exit status,
//! disconnect. All failures map onto [`SshError`] so callers can fold them
//! into per-host results.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use zeroize::Zeroizing;

use super::error::SshError;

/// Fallback connect timeout when the run sets none
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Key files tried when neither a key path nor an agent is available
const DEFAULT_KEY_FILES: &[&str] = &["id_ed25519", "id_rsa", "id_ecdsa"];

/// How a session authenticates.
#[derive(Debug, Clone, Default)]
pub struct AuthSpec {
    pub password: Option<Zeroizing<String>>,
    pub key_path: Option<PathBuf>,
}

/// Raw outcome of one remote command.
#[derive(Debug)]
pub struct ExecOutcome {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    pub exit_code: u32,
}

struct ClientHandler;

impl russh::client::Handler for ClientHandler {
    type Error = russh::Error;

    // Host keys are accepted unseen; per-host key management across a fleet
    // of ephemeral targets is out of scope for a fan-out runner.
    async fn check_server_key(
        &mut self,
        _server_public_key: &russh::keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        Ok(true)
    }
}

pub struct Session {
    handle: russh::client::Handle<ClientHandler>,
}

impl Session {
    /// Connect and authenticate to `host:port` as `username`.
    ///
    /// `timeout` bounds the TCP connect and the SSH handshake together;
    /// `None` means the default connect timeout.
    pub async fn connect(
        host: &str,
        port: u16,
        username: &str,
        auth: &AuthSpec,
        timeout: Option<Duration>,
    ) -> Result<Self, SshError> {
        let config = Arc::new(russh::client::Config::default());
        let connect_timeout = timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);

        let addrs: Vec<std::net::SocketAddr> = tokio::net::lookup_host((host, port))
            .await
            .map_err(SshError::Connect)?
            .collect();

        let mut last_err = SshError::Connect(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "could not resolve to any addresses",
        ));
        let mut handle = None;
        for addr in addrs {
            let attempt = tokio::time::timeout(
                connect_timeout,
                russh::client::connect(Arc::clone(&config), addr, ClientHandler),
            )
            .await;
            match attempt {
                Ok(Ok(h)) => {
                    handle = Some(h);
                    break;
                }
                Ok(Err(e)) => last_err = classify_connect_error(e),
                Err(_) => last_err = SshError::ConnectTimeout,
            }
        }
        let mut handle = match handle {
            Some(h) => h,
            None => return Err(last_err),
        };

        authenticate(&mut handle, username, auth).await?;
        Ok(Self { handle })
    }

    /// Run one command, optionally writing `stdin_payload` to the remote
    /// stdin first (followed by EOF so the remote side sees end-of-input).
    ///
    /// `timeout` bounds the whole execution including stream reads; `None`
    /// means unlimited.
    pub async fn execute(
        &self,
        command: &str,
        stdin_payload: Option<&[u8]>,
        timeout: Option<Duration>,
    ) -> Result<ExecOutcome, SshError> {
        match timeout {
            Some(limit) => tokio::time::timeout(limit, self.run_channel(command, stdin_payload))
                .await
                .map_err(|_| SshError::ExecTimeout)?,
            None => self.run_channel(command, stdin_payload).await,
        }
    }

    async fn run_channel(
        &self,
        command: &str,
        stdin_payload: Option<&[u8]>,
    ) -> Result<ExecOutcome, SshError> {
        let mut channel = self.handle.channel_open_session().await?;
        channel.exec(true, command).await?;

        if let Some(payload) = stdin_payload {
            channel
                .data(payload)
                .await
                .map_err(|_| SshError::SudoPromptFailed)?;
            channel.eof().await?;
        }

        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut exit_code = None;

        while let Some(msg) = channel.wait().await {
            match msg {
                russh::ChannelMsg::Data { ref data } => {
                    stdout.extend_from_slice(data);
                }
                russh::ChannelMsg::ExtendedData { ref data, ext } => {
                    if ext == 1 {
                        stderr.extend_from_slice(data);
                    }
                }
                // The exit status can arrive before the last data frames, so
                // keep draining the channel after it.
                russh::ChannelMsg::ExitStatus { exit_status } => exit_code = Some(exit_status),
                _ => {}
            }
        }

        match exit_code {
            Some(exit_code) => Ok(ExecOutcome {
                stdout,
                stderr,
                exit_code,
            }),
            None => Err(SshError::NoExitStatus),
        }
    }

    /// Close the session.
    pub async fn disconnect(self) {
        let _ = self
            .handle
            .disconnect(russh::Disconnect::ByApplication, "", "")
            .await;
    }
}

fn classify_connect_error(e: russh::Error) -> SshError {
    match e {
        russh::Error::IO(io) => SshError::Connect(io),
        other => SshError::Protocol(other),
    }
}

async fn authenticate(
    handle: &mut russh::client::Handle<ClientHandler>,
    username: &str,
    auth: &AuthSpec,
) -> Result<(), SshError> {
    // Explicit key first, then any agent identity, then password, then the
    // usual default key files (mirrors what a plain ssh invocation tries).
    if let Some(ref key_path) = auth.key_path {
        return authenticate_key(handle, username, key_path).await;
    }

    if std::env::var("SSH_AUTH_SOCK").is_ok() && try_agent(handle, username).await? {
        return Ok(());
    }

    if let Some(ref password) = auth.password {
        let result = handle.authenticate_password(username, &***password).await?;
        if result.success() {
            return Ok(());
        }
        return Err(SshError::AuthFailed);
    }

    if let Some(home) = std::env::var_os("HOME") {
        for name in DEFAULT_KEY_FILES {
            let path = Path::new(&home).join(".ssh").join(name);
            if path.exists() && authenticate_key(handle, username, &path).await.is_ok() {
                return Ok(());
            }
        }
    }

    Err(SshError::AuthFailed)
}

async fn authenticate_key(
    handle: &mut russh::client::Handle<ClientHandler>,
    username: &str,
    key_path: &Path,
) -> Result<(), SshError> {
    let key = russh::keys::load_secret_key(key_path, None).map_err(SshError::KeyInvalid)?;
    let result = handle
        .authenticate_publickey(
            username,
            russh::keys::PrivateKeyWithHashAlg::new(
                Arc::new(key),
                handle.best_supported_rsa_hash().await?.flatten(),
            ),
        )
        .await?;
    if result.success() {
        Ok(())
    } else {
        Err(SshError::AuthFailed)
    }
}

async fn try_agent(
    handle: &mut russh::client::Handle<ClientHandler>,
    username: &str,
) -> Result<bool, SshError> {
    let mut agent = match russh::keys::agent::client::AgentClient::connect_env().await {
        Ok(agent) => agent,
        Err(_) => return Ok(false),
    };
    let identities = match agent.request_identities().await {
        Ok(identities) => identities,
        Err(_) => return Ok(false),
    };

    for identity in identities {
        let result = handle
            .authenticate_publickey_with(
                username,
                identity,
                handle.best_supported_rsa_hash().await?.flatten(),
                &mut agent,
            )
            .await;
        if let Ok(auth_result) = result {
            if auth_result.success() {
                return Ok(true);
            }
        }
    }
    Ok(false)
}
