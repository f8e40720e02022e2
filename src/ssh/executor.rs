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

//! The remote-execution boundary of the engine.
//!
//! [`RemoteExecutor`] is the seam the worker pool calls through: given a
//! host and an execution spec, produce a [`HostResult`]. It never returns an
//! error; every failure becomes a result carrying a transport status, so one
//! host can never abort the batch. [`SshExecutor`] is the production
//! implementation; tests substitute scripted executors.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use zeroize::Zeroizing;

use super::client::{AuthSpec, Session};
use super::sudo;
use crate::runner::result::{HostResult, TransportStatus};

/// Everything a worker needs to run the command on one host.
#[derive(Debug, Clone, Default)]
pub struct ExecSpec {
    /// The remote command (the interpreter, when a script is supplied)
    pub command: String,
    /// Script delivered over stdin: a local path, or inline content when no
    /// such file exists
    pub script: Option<String>,
    /// Login user; the local username when unset
    pub username: Option<String>,
    /// Password for authentication and sudo injection
    pub password: Option<Zeroizing<String>>,
    /// Run the command under sudo
    pub sudo: bool,
    /// Timeout in seconds for connect and execution, 0 for no timeout
    pub timeout: u64,
    /// Private key file; agent and default keys are tried when unset
    pub key_path: Option<PathBuf>,
}

impl ExecSpec {
    pub fn timeout_duration(&self) -> Option<Duration> {
        (self.timeout > 0).then(|| Duration::from_secs(self.timeout))
    }
}

/// A remote execution capability: one host in, one result out.
#[async_trait]
pub trait RemoteExecutor: Send + Sync {
    async fn execute(&self, host: &str, spec: &ExecSpec) -> HostResult;
}

/// A parsed `[user@]host[:port]` target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub host: String,
    pub port: u16,
    pub username: String,
}

impl Target {
    /// Parse a target string, filling in the default user and port 22.
    pub fn parse(target: &str, default_user: Option<&str>) -> Self {
        let (user_part, host_part) = match target.split_once('@') {
            Some((user, rest)) if !user.is_empty() => (Some(user), rest),
            _ => (None, target),
        };

        let (host, port) = match host_part.rsplit_once(':') {
            Some((host, port_str))
                if !port_str.is_empty() && port_str.chars().all(|c| c.is_ascii_digit()) =>
            {
                (host, port_str.parse().unwrap_or(22))
            }
            _ => (host_part, 22),
        };

        let username = user_part
            .map(String::from)
            .or_else(|| default_user.map(String::from))
            .unwrap_or_else(whoami::username);

        Self {
            host: host.to_string(),
            port,
            username,
        }
    }
}

/// Production executor: one SSH session per call.
pub struct SshExecutor;

#[async_trait]
impl RemoteExecutor for SshExecutor {
    async fn execute(&self, host: &str, spec: &ExecSpec) -> HostResult {
        let target = Target::parse(host, spec.username.as_deref());
        let auth = AuthSpec {
            password: spec.password.clone(),
            key_path: spec.key_path.clone(),
        };
        let timeout = spec.timeout_duration();

        let session = match Session::connect(
            &target.host,
            target.port,
            &target.username,
            &auth,
            timeout,
        )
        .await
        {
            Ok(session) => session,
            Err(e) => {
                tracing::debug!("connection to {host} failed: {e}");
                return HostResult::failure(host, e.transport_status());
            }
        };

        let command_line = if spec.sudo {
            sudo::wrap_command(&spec.command)
        } else {
            spec.command.clone()
        };

        let payload = match build_stdin_payload(spec).await {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!("could not prepare input for {host}: {e}");
                session.disconnect().await;
                return HostResult::failure(host, TransportStatus::UnknownError);
            }
        };

        let outcome = match session
            .execute(&command_line, payload.as_deref(), timeout)
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                tracing::debug!("execution on {host} failed: {e}");
                session.disconnect().await;
                return HostResult::failure(host, e.transport_status());
            }
        };
        session.disconnect().await;

        let stdout = split_lines(&outcome.stdout);
        let mut stderr = split_lines(&outcome.stderr);

        let mut status = TransportStatus::Ok;
        if spec.sudo {
            if sudo::password_rejected(&stderr) {
                status = TransportStatus::BadPassword;
            }
            let password = spec.password.as_ref().map(|p| p.as_str()).unwrap_or("");
            stderr = sudo::strip_prompt_artifacts(stderr, password);
        }

        let mut result = HostResult::completed(host, stdout, stderr, outcome.exit_code as i32);
        result.transport_status = status;
        result
    }
}

/// Assemble the bytes written to the remote stdin: the sudo password line
/// first, then the script body (read from disk when the value names an
/// existing file, otherwise taken as inline content).
async fn build_stdin_payload(spec: &ExecSpec) -> std::io::Result<Option<Vec<u8>>> {
    let mut payload = Vec::new();

    if spec.sudo {
        if let Some(ref password) = spec.password {
            payload.extend_from_slice(password.as_bytes());
            payload.push(b'\n');
        }
    }

    if let Some(ref script) = spec.script {
        let path = std::path::Path::new(script);
        if path.exists() {
            payload.extend_from_slice(&tokio::fs::read(path).await?);
        } else {
            payload.extend_from_slice(script.as_bytes());
        }
    }

    Ok((!payload.is_empty()).then_some(payload))
}

fn split_lines(bytes: &[u8]) -> Vec<String> {
    String::from_utf8_lossy(bytes)
        .lines()
        .map(String::from)
        .collect()
}
