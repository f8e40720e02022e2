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

//! haproxy-backed resolver.
//!
//! Expands `haproxy:balancer[:backend]` into the servers behind a backend.
//! haproxy does not expose backend membership remotely, so a helper script
//! (`get-haproxy-servers`, reading the stats socket) must be installed in the
//! connecting user's home directory on the balancer; it prints a JSON array
//! of server names for a backend and state filter.
//!
//! The resolver answers to `haproxy`, `haproxy_all`, `haproxy_up` and
//! `haproxy_down`; the alias selects the server-state filter, which is why
//! the invoked name is threaded through `expand`.

use anyhow::Result;
use async_trait::async_trait;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;
use tokio::process::Command;

use crate::config::Config;
use crate::hostlist::resolver::HostResolver;

/// Helper script expected on the balancer
const HELPER_SCRIPT: &str = "./get-haproxy-servers";

/// Fallback query timeout when the config does not set one
const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 2;

pub struct HaproxyResolver;

pub fn build() -> Result<Arc<dyn HostResolver>> {
    Ok(Arc::new(HaproxyResolver))
}

#[async_trait]
impl HostResolver for HaproxyResolver {
    fn names(&self) -> &[&'static str] {
        &["haproxy", "haproxy_all", "haproxy_up", "haproxy_down"]
    }

    fn category(&self) -> &[&'static str] {
        &["vip"]
    }

    async fn expand(&self, value: &str, invoked_name: &str) -> Result<Vec<String>> {
        let state = match invoked_name {
            "haproxy_up" => "UP",
            "haproxy_down" => "DOWN",
            _ => "ALL",
        };

        let (server, backend) = match value.split_once(':') {
            Some((server, backend)) if !backend.is_empty() => (server, backend),
            _ => (value, "all"),
        };
        if server.is_empty() {
            return Ok(Vec::new());
        }

        let settings = Config::global().haproxy_settings(server);
        let destination = match settings.user {
            Some(ref user) => format!("{user}@{server}"),
            None => server.to_string(),
        };
        let timeout = Duration::from_secs(settings.timeout.unwrap_or(DEFAULT_QUERY_TIMEOUT_SECS));

        let output = tokio::time::timeout(
            timeout,
            Command::new("ssh")
                .arg("-o")
                .arg("BatchMode=yes")
                .arg(&destination)
                .arg(HELPER_SCRIPT)
                .arg(backend)
                .arg(state)
                .stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::null())
                .kill_on_drop(true)
                .output(),
        )
        .await;

        // Any failure means the balancer has nothing for us; resolution is
        // best-effort and an empty answer drops the term.
        let output = match output {
            Ok(Ok(output)) if output.status.success() => output,
            Ok(Ok(output)) => {
                tracing::debug!(
                    "haproxy helper on {server} exited with {}",
                    output.status.code().unwrap_or(-1)
                );
                return Ok(Vec::new());
            }
            Ok(Err(e)) => {
                tracing::debug!("failed to run ssh to {server}: {e}");
                return Ok(Vec::new());
            }
            Err(_) => {
                tracing::debug!("haproxy query to {server} timed out");
                return Ok(Vec::new());
            }
        };

        match serde_json::from_slice::<Vec<String>>(&output.stdout) {
            Ok(hosts) => Ok(hosts),
            Err(e) => {
                tracing::debug!("unparseable haproxy helper output from {server}: {e}");
                Ok(Vec::new())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_value_yields_no_hosts() {
        let resolver = HaproxyResolver;
        let hosts = resolver.expand("", "haproxy").await.unwrap();
        assert!(hosts.is_empty());
    }

    #[tokio::test]
    async fn test_unreachable_balancer_yields_no_hosts() {
        // ssh to an invalid name fails fast; the resolver must swallow it
        let resolver = HaproxyResolver;
        let hosts = resolver
            .expand("no-such-balancer.invalid:web", "haproxy_up")
            .await
            .unwrap();
        assert!(hosts.is_empty());
    }
}
