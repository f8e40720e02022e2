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

//! Scripted remote executor for engine tests.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hostmap::runner::{HostResult, TransportStatus};
use hostmap::ssh::{ExecSpec, RemoteExecutor};

/// Canned behavior for one host.
#[derive(Debug, Clone)]
pub struct MockResponse {
    pub delay_ms: u64,
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: i32,
    pub status: TransportStatus,
}

impl Default for MockResponse {
    fn default() -> Self {
        Self {
            delay_ms: 0,
            stdout: Vec::new(),
            stderr: Vec::new(),
            exit_code: 0,
            status: TransportStatus::Ok,
        }
    }
}

impl MockResponse {
    pub fn ok(stdout: &[&str]) -> Self {
        Self {
            stdout: stdout.iter().map(|s| s.to_string()).collect(),
            ..Self::default()
        }
    }

    pub fn exit(code: i32) -> Self {
        Self {
            exit_code: code,
            ..Self::default()
        }
    }

    pub fn failed(status: TransportStatus) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    pub fn with_delay(mut self, delay_ms: u64) -> Self {
        self.delay_ms = delay_ms;
        self
    }
}

/// An executor that answers from a table and records how it was driven.
#[derive(Default)]
pub struct MockExecutor {
    responses: HashMap<String, MockResponse>,
    fallback: MockResponse,
    active: AtomicUsize,
    peak: AtomicUsize,
    attempts: AtomicUsize,
    order: Mutex<Vec<String>>,
}

impl MockExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(mut self, host: &str, response: MockResponse) -> Self {
        self.responses.insert(host.to_string(), response);
        self
    }

    pub fn fallback(mut self, response: MockResponse) -> Self {
        self.fallback = response;
        self
    }

    pub fn into_arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// Highest number of concurrently in-flight executions observed.
    pub fn peak_concurrency(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }

    /// Total executions attempted.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Hosts in the order their executions completed.
    pub fn completion_order(&self) -> Vec<String> {
        self.order.lock().unwrap().clone()
    }
}

#[async_trait]
impl RemoteExecutor for MockExecutor {
    async fn execute(&self, host: &str, _spec: &ExecSpec) -> HostResult {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        let response = self.responses.get(host).unwrap_or(&self.fallback).clone();
        if response.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(response.delay_ms)).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        self.order.lock().unwrap().push(host.to_string());

        let mut result = HostResult::completed(
            host,
            response.stdout,
            response.stderr,
            response.exit_code,
        );
        result.transport_status = response.status;
        result
    }
}

/// Hosts `prefix1..=prefixN`.
pub fn hosts(prefix: &str, count: usize) -> Vec<String> {
    (1..=count).map(|i| format!("{prefix}{i}")).collect()
}
