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

//! Result and batch types for fan-out execution.

use std::collections::BTreeMap;
use std::fmt;

/// Outcome of establishing and using the remote session, independent of the
/// remote command's own exit code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportStatus {
    /// Session established and command ran (see `exit_code` for its result)
    Ok,
    /// Authentication was rejected
    AuthFailed,
    /// Connect, execution or stream read timed out
    Timeout,
    /// TCP connection could not be established
    ConnectFailed,
    /// SSH-level protocol failure after the connection was up
    ProtocolError,
    /// Privilege escalation did not present a password prompt
    SudoPromptFailed,
    /// Failure that fits no other category
    UnknownError,
    /// Elevated execution requested without a password
    NoPassword,
    /// Privilege escalation rejected the password
    BadPassword,
}

impl TransportStatus {
    pub fn is_ok(&self) -> bool {
        matches!(self, TransportStatus::Ok)
    }

    /// Numeric status code, used when return codes are printed.
    pub fn code(&self) -> i32 {
        match self {
            TransportStatus::Ok => 0,
            TransportStatus::AuthFailed => 1,
            TransportStatus::Timeout => 2,
            TransportStatus::ConnectFailed => 3,
            TransportStatus::ProtocolError => 4,
            TransportStatus::SudoPromptFailed => 5,
            TransportStatus::UnknownError => 6,
            TransportStatus::NoPassword => 7,
            TransportStatus::BadPassword => 8,
        }
    }

    /// Human-readable description, used in failure reporting and output
    /// aggregation.
    pub fn message(&self) -> &'static str {
        match self {
            TransportStatus::Ok => "Ok",
            TransportStatus::AuthFailed => "Authentication error",
            TransportStatus::Timeout => "Timeout",
            TransportStatus::ConnectFailed => "SSH connection failed",
            TransportStatus::ProtocolError => "SSH protocol failure",
            TransportStatus::SudoPromptFailed => "Sudo did not send a password prompt",
            TransportStatus::UnknownError => "Unknown failure",
            TransportStatus::NoPassword => "Sudo password required",
            TransportStatus::BadPassword => "Invalid sudo password",
        }
    }
}

impl fmt::Display for TransportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// One execution outcome for one host.
#[derive(Debug, Clone)]
pub struct HostResult {
    pub host: String,
    /// Captured stdout, one entry per line
    pub stdout: Vec<String>,
    /// Captured stderr, one entry per line
    pub stderr: Vec<String>,
    /// Remote command exit code; meaningful only when `transport_status` is Ok
    pub exit_code: i32,
    pub transport_status: TransportStatus,
}

impl HostResult {
    /// A result for a host whose session never produced output.
    pub fn failure(host: impl Into<String>, status: TransportStatus) -> Self {
        Self {
            host: host.into(),
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: 0,
            transport_status: status,
        }
    }

    /// A result for a completed command.
    pub fn completed(
        host: impl Into<String>,
        stdout: Vec<String>,
        stderr: Vec<String>,
        exit_code: i32,
    ) -> Self {
        Self {
            host: host.into(),
            stdout,
            stderr,
            exit_code,
            transport_status: TransportStatus::Ok,
        }
    }

    /// Whether the session was established and the command exited zero.
    pub fn is_success(&self) -> bool {
        self.transport_status.is_ok() && self.exit_code == 0
    }

    pub fn stdout_string(&self) -> String {
        self.stdout.join("\n")
    }

    pub fn stderr_string(&self) -> String {
        self.stderr.join("\n")
    }
}

/// Shared run-level state threaded through every callback stage.
///
/// This is the one piece of mutable state crossing host boundaries. It is
/// owned by the engine's fold loop, which applies stages to one result at a
/// time, so no locking is needed; whatever one host's stage writes is
/// visible to the next processed result.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    pub total_host_count: usize,
    pub completed_host_count: usize,
    /// Hosts dispatched per worker scheduling round
    pub chunk_size: usize,

    /// Hosts whose transport failed, in fold order
    pub failures: Vec<String>,
    /// Content hash -> hosts sharing byte-identical output
    pub aggregate_hosts: BTreeMap<String, Vec<String>>,
    /// Content hash -> first-seen (stdout, stderr-or-failure) pair
    pub collapsed_output: BTreeMap<String, (Vec<String>, Vec<String>)>,

    /// Substring filter for the match stage
    pub match_filter: Option<String>,
    /// Helper command for the exec_command stage
    pub callback_script: Option<String>,
    /// Show transport/command return codes when printing
    pub print_rc: bool,
    /// Only print hosts that produced output
    pub only_output: bool,
    /// Collect transport failures into a final summary instead of inline
    pub summarize_failed: bool,
    /// Whether the print stage writes to the terminal at all
    pub output: bool,
}

impl RunContext {
    pub fn new(total_host_count: usize) -> Self {
        Self {
            total_host_count,
            output: true,
            ..Self::default()
        }
    }
}

/// The complete outcome of one fan-out run: every folded result plus the
/// shared context as it stood after the last result finished post-processing.
#[derive(Debug, Default)]
pub struct Batch {
    pub results: Vec<HostResult>,
    pub context: RunContext,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, HostResult> {
        self.results.iter()
    }

    /// Hosts that failed at the transport level.
    pub fn failures(&self) -> &[String] {
        &self.context.failures
    }

    /// Whether every host connected and exited zero.
    pub fn all_succeeded(&self) -> bool {
        self.results.iter().all(HostResult::is_success)
    }

    /// Print all output with `host:` prefixes, optionally followed by a
    /// failure summary line.
    pub fn print_output(&self, summarize_failures: bool) {
        for result in &self.results {
            for line in &result.stdout {
                println!("{}: {}", result.host, line.trim_end());
            }
            for line in &result.stderr {
                eprintln!("{}: {}", result.host, line.trim_end());
            }
        }
        if summarize_failures && !self.context.failures.is_empty() {
            println!(
                "SSH failures: {}",
                crate::hostlist::compress(&self.context.failures)
            );
        }
    }
}

impl<'a> IntoIterator for &'a Batch {
    type Item = &'a HostResult;
    type IntoIter = std::slice::Iter<'a, HostResult>;

    fn into_iter(self) -> Self::IntoIter {
        self.results.iter()
    }
}
