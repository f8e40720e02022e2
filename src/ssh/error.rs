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

//! SSH error taxonomy.
//!
//! Every error maps onto a [`TransportStatus`] so the engine can fold a
//! failed session into a per-host result instead of aborting the batch.

use thiserror::Error;

use crate::runner::result::TransportStatus;

#[derive(Debug, Error)]
pub enum SshError {
    #[error("could not resolve or reach the host: {0}")]
    Connect(#[source] std::io::Error),

    #[error("connection timed out")]
    ConnectTimeout,

    #[error("authentication failed")]
    AuthFailed,

    #[error("ssh protocol error: {0}")]
    Protocol(#[from] russh::Error),

    #[error("command execution timed out")]
    ExecTimeout,

    #[error("channel closed without reporting an exit status")]
    NoExitStatus,

    #[error("could not deliver input to the privilege escalation prompt")]
    SudoPromptFailed,

    #[error("invalid key file: {0}")]
    KeyInvalid(#[source] russh::keys::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl SshError {
    /// The per-host status this failure folds into.
    pub fn transport_status(&self) -> TransportStatus {
        match self {
            SshError::Connect(_) => TransportStatus::ConnectFailed,
            SshError::ConnectTimeout | SshError::ExecTimeout => TransportStatus::Timeout,
            SshError::AuthFailed | SshError::KeyInvalid(_) => TransportStatus::AuthFailed,
            SshError::Protocol(_) | SshError::NoExitStatus => TransportStatus::ProtocolError,
            SshError::SudoPromptFailed => TransportStatus::SudoPromptFailed,
            SshError::Io(_) => TransportStatus::UnknownError,
        }
    }
}
