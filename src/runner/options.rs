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

//! Per-run options for the execution engine.

use std::path::PathBuf;
use zeroize::Zeroizing;

use super::callback::CallbackStage;
use crate::ssh::ExecSpec;

/// Absolute ceiling on worker count when the process limit is unreadable
const JOB_MAX_FALLBACK: usize = 100;

/// Upper bound for the worker pool, derived from the process-count resource
/// limit with headroom for everything else the process runs.
pub fn job_max() -> usize {
    let Ok(limits) = std::fs::read_to_string("/proc/self/limits") else {
        return JOB_MAX_FALLBACK;
    };
    for line in limits.lines() {
        if line.starts_with("Max processes") {
            if let Some(soft) = line.split_whitespace().nth(2) {
                if let Ok(limit) = soft.parse::<usize>() {
                    return (limit / 4).max(1);
                }
            }
        }
    }
    JOB_MAX_FALLBACK
}

/// Dispatch chunk size: hosts handed to a worker per scheduling round.
///
/// Batching trades scheduling overhead against load balance. The formula is
/// a tunable kept for compatibility, not a correctness invariant.
pub fn compute_chunk_size(host_count: usize, jobs: usize) -> usize {
    if jobs <= 1 || jobs >= host_count {
        return 1;
    }
    (host_count / jobs).saturating_sub(1).clamp(1, 10)
}

/// Options for one fan-out run.
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// The remote command (the interpreter, when a script is supplied)
    pub command: String,
    /// Script to deliver over stdin (path or inline content)
    pub script: Option<String>,
    pub username: Option<String>,
    pub password: Option<Zeroizing<String>>,
    /// Run under sudo; requires a password up front
    pub sudo: bool,
    /// Seconds per host for connect and execution, 0 for no timeout
    pub timeout: u64,
    /// Desired worker count, clamped to `[1, job_max()]` and the host count
    pub jobs: usize,
    /// Fold results in submission order instead of completion order
    pub sort: bool,
    /// Randomize host order before dispatch
    pub shuffle: bool,
    /// Dispatch chunk size; computed from the host count when unset
    pub chunksize: Option<usize>,
    /// Stop folding results after the first non-zero command exit
    pub exit_on_error: bool,
    /// SSH private key file
    pub key_path: Option<PathBuf>,
    /// Ordered callback pipeline applied to every result
    pub callbacks: Vec<CallbackStage>,

    /// Substring filter consumed by the match stage
    pub match_filter: Option<String>,
    /// Helper command consumed by the exec_command stage
    pub callback_script: Option<String>,
    /// Print transport/command return codes
    pub print_rc: bool,
    /// Only print hosts that produced output
    pub only_output: bool,
    /// Report transport failures in a final summary instead of inline
    pub summarize_failed: bool,
}

impl RunOptions {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            script: None,
            username: None,
            password: None,
            sudo: false,
            timeout: 0,
            jobs: 65,
            sort: false,
            shuffle: false,
            chunksize: None,
            exit_on_error: false,
            key_path: None,
            callbacks: vec![CallbackStage::SummarizeFailures],
            match_filter: None,
            callback_script: None,
            print_rc: false,
            only_output: false,
            summarize_failed: false,
        }
    }

    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs;
        self
    }

    pub fn with_timeout(mut self, timeout: u64) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_sudo(mut self, password: Option<Zeroizing<String>>) -> Self {
        self.sudo = true;
        self.password = password;
        self
    }

    pub fn with_callbacks(mut self, callbacks: Vec<CallbackStage>) -> Self {
        self.callbacks = callbacks;
        self
    }

    pub fn with_sort(mut self, sort: bool) -> Self {
        self.sort = sort;
        self
    }

    pub fn with_exit_on_error(mut self, exit_on_error: bool) -> Self {
        self.exit_on_error = exit_on_error;
        self
    }

    pub fn with_script(mut self, script: Option<String>) -> Self {
        self.script = script;
        self
    }

    /// The per-host execution spec handed to workers.
    pub(crate) fn exec_spec(&self) -> ExecSpec {
        ExecSpec {
            command: self.command.clone(),
            script: self.script.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            sudo: self.sudo,
            timeout: self.timeout,
            key_path: self.key_path.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_max_is_positive() {
        assert!(job_max() >= 1);
    }

    #[test]
    fn test_chunk_size_single_job() {
        assert_eq!(compute_chunk_size(100, 1), 1);
    }

    #[test]
    fn test_chunk_size_more_jobs_than_hosts() {
        assert_eq!(compute_chunk_size(5, 10), 1);
    }

    #[test]
    fn test_chunk_size_formula() {
        // floor(100/10) - 1 = 9
        assert_eq!(compute_chunk_size(100, 10), 9);
        // floor(30/10) - 1 = 2
        assert_eq!(compute_chunk_size(30, 10), 2);
        // floor(22/10) - 1 = 1
        assert_eq!(compute_chunk_size(22, 10), 1);
    }

    #[test]
    fn test_chunk_size_clamped_to_ten() {
        // floor(1000/10) - 1 = 99, clamped
        assert_eq!(compute_chunk_size(1000, 10), 10);
    }

    #[test]
    fn test_chunk_size_floor_of_one() {
        // floor(11/10) - 1 = 0, floored to 1
        assert_eq!(compute_chunk_size(11, 10), 1);
    }

    #[test]
    fn test_default_callbacks() {
        let options = RunOptions::new("uptime");
        assert_eq!(options.callbacks, vec![CallbackStage::SummarizeFailures]);
    }
}
