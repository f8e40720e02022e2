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

//! Built-in callback stages.
//!
//! Every completed result flows through an ordered pipeline of stages. A
//! stage receives the result produced by the prior stage plus the shared
//! [`RunContext`] and returns the (possibly rewritten) result. Stages run in
//! the engine's fold loop, one result at a time, so context writes made for
//! one host are visible to the next.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use sha2::{Digest, Sha256};
use std::process::Stdio;
use std::str::FromStr;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use super::result::{HostResult, RunContext};
use crate::utils::status;

/// One link in the result post-processing pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallbackStage {
    /// Collect transport-failed hosts into the shared failure list
    SummarizeFailures,
    /// Blank all output unless it contains the configured substring
    FilterMatch,
    /// Replace stdout with a JSON array of [stdout, stderr, exit_code]
    FilterJson,
    /// Base64-encode stdout and stderr in place
    FilterBase64,
    /// Group hosts by content hash of their output
    AggregateOutput,
    /// Pipe the output through an external helper command
    ExecCommand,
    /// Print each line prefixed with `host:`
    PrintOutput,
    /// Live `completed/total` progress on the error stream
    StatusCount,
}

impl CallbackStage {
    pub fn name(&self) -> &'static str {
        match self {
            CallbackStage::SummarizeFailures => "summarize_failures",
            CallbackStage::FilterMatch => "filter_match",
            CallbackStage::FilterJson => "filter_json",
            CallbackStage::FilterBase64 => "filter_base64",
            CallbackStage::AggregateOutput => "aggregate_output",
            CallbackStage::ExecCommand => "exec_command",
            CallbackStage::PrintOutput => "print_output",
            CallbackStage::StatusCount => "status_count",
        }
    }

    /// Apply this stage to a result.
    pub async fn apply(&self, result: HostResult, ctx: &mut RunContext) -> HostResult {
        match self {
            CallbackStage::SummarizeFailures => summarize_failures(result, ctx),
            CallbackStage::FilterMatch => filter_match(result, ctx),
            CallbackStage::FilterJson => filter_json(result),
            CallbackStage::FilterBase64 => filter_base64(result),
            CallbackStage::AggregateOutput => aggregate_output(result, ctx),
            CallbackStage::ExecCommand => exec_command(result, ctx).await,
            CallbackStage::PrintOutput => print_output(result, ctx),
            CallbackStage::StatusCount => status_count(result, ctx),
        }
    }
}

impl FromStr for CallbackStage {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "summarize_failures" => Ok(CallbackStage::SummarizeFailures),
            "filter_match" => Ok(CallbackStage::FilterMatch),
            "filter_json" => Ok(CallbackStage::FilterJson),
            "filter_base64" => Ok(CallbackStage::FilterBase64),
            "aggregate_output" => Ok(CallbackStage::AggregateOutput),
            "exec_command" => Ok(CallbackStage::ExecCommand),
            "print_output" | "output_prefix_host" => Ok(CallbackStage::PrintOutput),
            "status_count" => Ok(CallbackStage::StatusCount),
            other => Err(format!("unknown callback stage '{other}'")),
        }
    }
}

/// Run a result through every stage in registration order.
pub async fn apply_pipeline(
    stages: &[CallbackStage],
    mut result: HostResult,
    ctx: &mut RunContext,
) -> HostResult {
    for stage in stages {
        result = stage.apply(result, ctx).await;
    }
    result
}

fn summarize_failures(result: HostResult, ctx: &mut RunContext) -> HostResult {
    if !result.transport_status.is_ok() {
        ctx.failures.push(result.host.clone());
    }
    result
}

fn filter_match(mut result: HostResult, ctx: &mut RunContext) -> HostResult {
    let Some(needle) = ctx.match_filter.as_deref() else {
        return result;
    };
    if !result.stdout_string().contains(needle) && !result.stderr_string().contains(needle) {
        result.stdout.clear();
        result.stderr.clear();
    }
    result
}

fn filter_json(mut result: HostResult) -> HostResult {
    let encoded = serde_json::to_string(&(&result.stdout, &result.stderr, result.exit_code))
        .unwrap_or_else(|_| "[[],[],0]".to_string());
    result.stdout = vec![encoded];
    result
}

fn filter_base64(mut result: HostResult) -> HostResult {
    result.stdout = vec![BASE64.encode(result.stdout_string())];
    result.stderr = vec![BASE64.encode(result.stderr_string())];
    result
}

fn aggregate_output(result: HostResult, ctx: &mut RunContext) -> HostResult {
    let mut hasher = Sha256::new();
    hasher.update(result.stdout_string().as_bytes());
    hasher.update(result.stderr_string().as_bytes());
    if !result.transport_status.is_ok() {
        hasher.update(result.transport_status.message().as_bytes());
    }
    let digest = format!("{:x}", hasher.finalize());

    match ctx.aggregate_hosts.get_mut(&digest) {
        Some(hosts) => {
            if !hosts.contains(&result.host) {
                hosts.push(result.host.clone());
            }
        }
        None => {
            ctx.aggregate_hosts
                .insert(digest.clone(), vec![result.host.clone()]);
            let stderr_or_failure = if result.transport_status.is_ok() {
                result.stderr.clone()
            } else {
                let mut error = result.stderr.clone();
                error.push(result.transport_status.message().to_string());
                error
            };
            ctx.collapsed_output
                .insert(digest, (result.stdout.clone(), stderr_or_failure));
        }
    }
    result
}

async fn exec_command(mut result: HostResult, ctx: &mut RunContext) -> HostResult {
    let Some(script) = ctx.callback_script.as_deref() else {
        return result;
    };
    status::clear();

    // The helper gets the host appended as an argument and the combined
    // output on stdin; its stdout becomes the new result output, however it
    // exits.
    let combined = format!("{}{}", result.stdout_string(), result.stderr_string());
    let spawned = Command::new("sh")
        .arg("-c")
        .arg(format!("{script} {}", result.host))
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn();

    let (out, err) = match spawned {
        Ok(mut child) => {
            if let Some(mut stdin) = child.stdin.take() {
                let _ = stdin.write_all(combined.as_bytes()).await;
            }
            match child.wait_with_output().await {
                Ok(output) => (
                    String::from_utf8_lossy(&output.stdout).to_string(),
                    String::from_utf8_lossy(&output.stderr).to_string(),
                ),
                Err(e) => {
                    tracing::debug!("callback helper failed for {}: {e}", result.host);
                    (String::new(), String::new())
                }
            }
        }
        Err(e) => {
            tracing::debug!("could not spawn callback helper for {}: {e}", result.host);
            (String::new(), String::new())
        }
    };

    result.stdout = if out.is_empty() { Vec::new() } else { vec![out] };
    result.stderr = if err.is_empty() { Vec::new() } else { vec![err] };
    println!("{}", result.stdout_string());
    result
}

fn print_output(mut result: HostResult, ctx: &mut RunContext) -> HostResult {
    status::clear();

    // Failed hosts are reported by the final summary instead when requested
    if ctx.summarize_failed && !result.transport_status.is_ok() {
        return result;
    }

    let rc = if ctx.print_rc {
        format!(
            " SSH_Returncode: {}\tCommand_Returncode: {}",
            result.transport_status.code(),
            result.exit_code
        )
    } else {
        String::new()
    };

    let mut output = Vec::new();
    let mut error = Vec::new();

    if !result.transport_status.is_ok() {
        let line = format!("{}: {}", result.host, result.transport_status.message());
        eprintln!("{line}");
        error.push(line);
    }

    for line in &result.stdout {
        let line = line.trim_end();
        if !line.is_empty() {
            println!("{}:{} {}", result.host, rc, line);
            output.push(format!("{}:{} {}", result.host, rc, line));
        }
    }
    for line in &result.stderr {
        let line = line.trim_end();
        if !line.is_empty() {
            eprintln!("{}:{} {}", result.host, rc, line);
            error.push(format!("{}:{} Error: {}", result.host, rc, line));
        }
    }

    if ctx.output
        && result.stdout.is_empty()
        && result.stderr.is_empty()
        && !ctx.only_output
        && ctx.print_rc
    {
        println!("{}:{}", result.host, rc);
    }

    result.stdout = output;
    result.stderr = error;
    result
}

fn status_count(result: HostResult, ctx: &mut RunContext) -> HostResult {
    status::progress(ctx.completed_host_count, ctx.total_host_count);
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::result::TransportStatus;

    fn ok_result(host: &str, stdout: &[&str], stderr: &[&str], exit_code: i32) -> HostResult {
        HostResult::completed(
            host,
            stdout.iter().map(|s| s.to_string()).collect(),
            stderr.iter().map(|s| s.to_string()).collect(),
            exit_code,
        )
    }

    #[tokio::test]
    async fn test_summarize_failures_records_failed_hosts() {
        let mut ctx = RunContext::new(2);
        let ok = ok_result("good", &["out"], &[], 0);
        let bad = HostResult::failure("bad", TransportStatus::Timeout);

        CallbackStage::SummarizeFailures.apply(ok, &mut ctx).await;
        CallbackStage::SummarizeFailures.apply(bad, &mut ctx).await;

        assert_eq!(ctx.failures, vec!["bad"]);
    }

    #[tokio::test]
    async fn test_filter_match_clears_non_matching_output() {
        let mut ctx = RunContext::new(1);
        ctx.match_filter = Some("needle".to_string());

        let kept = CallbackStage::FilterMatch
            .apply(ok_result("a", &["has needle here"], &[], 0), &mut ctx)
            .await;
        assert_eq!(kept.stdout, vec!["has needle here"]);

        let cleared = CallbackStage::FilterMatch
            .apply(ok_result("b", &["nothing"], &["else"], 0), &mut ctx)
            .await;
        assert!(cleared.stdout.is_empty());
        assert!(cleared.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_filter_match_checks_stderr_too() {
        let mut ctx = RunContext::new(1);
        ctx.match_filter = Some("warn".to_string());

        let kept = CallbackStage::FilterMatch
            .apply(ok_result("a", &["clean"], &["warn: hot"], 0), &mut ctx)
            .await;
        assert_eq!(kept.stdout, vec!["clean"]);
    }

    #[tokio::test]
    async fn test_filter_json_encodes_streams_and_exit_code() {
        let mut ctx = RunContext::new(1);
        let result = CallbackStage::FilterJson
            .apply(ok_result("a", &["out"], &["err"], 3), &mut ctx)
            .await;

        assert_eq!(result.stdout.len(), 1);
        let decoded: (Vec<String>, Vec<String>, i32) =
            serde_json::from_str(&result.stdout[0]).unwrap();
        assert_eq!(decoded, (vec!["out".to_string()], vec!["err".to_string()], 3));
    }

    #[tokio::test]
    async fn test_filter_base64_encodes_in_place() {
        let mut ctx = RunContext::new(1);
        let result = CallbackStage::FilterBase64
            .apply(ok_result("a", &["hello"], &["oops"], 0), &mut ctx)
            .await;

        assert_eq!(result.stdout, vec![BASE64.encode("hello")]);
        assert_eq!(result.stderr, vec![BASE64.encode("oops")]);
    }

    #[tokio::test]
    async fn test_aggregate_groups_identical_output() {
        let mut ctx = RunContext::new(3);
        for host in ["a", "b"] {
            CallbackStage::AggregateOutput
                .apply(ok_result(host, &["same"], &[], 0), &mut ctx)
                .await;
        }
        CallbackStage::AggregateOutput
            .apply(ok_result("c", &["different"], &[], 0), &mut ctx)
            .await;

        assert_eq!(ctx.aggregate_hosts.len(), 2);
        let group: Vec<_> = ctx
            .aggregate_hosts
            .values()
            .find(|hosts| hosts.len() == 2)
            .unwrap()
            .clone();
        assert_eq!(group, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_aggregate_one_byte_difference_splits_groups() {
        let mut ctx = RunContext::new(2);
        CallbackStage::AggregateOutput
            .apply(ok_result("a", &["out"], &[], 0), &mut ctx)
            .await;
        CallbackStage::AggregateOutput
            .apply(ok_result("b", &["out!"], &[], 0), &mut ctx)
            .await;
        assert_eq!(ctx.aggregate_hosts.len(), 2);
    }

    #[tokio::test]
    async fn test_aggregate_failure_message_lands_in_collapsed_output() {
        let mut ctx = RunContext::new(1);
        CallbackStage::AggregateOutput
            .apply(
                HostResult::failure("down1", TransportStatus::ConnectFailed),
                &mut ctx,
            )
            .await;

        let (_, (stdout, stderr)) = ctx.collapsed_output.iter().next().unwrap();
        assert!(stdout.is_empty());
        assert_eq!(stderr, &vec!["SSH connection failed".to_string()]);
    }

    #[tokio::test]
    async fn test_aggregate_failed_and_succeeded_hosts_never_share_a_group() {
        let mut ctx = RunContext::new(2);
        CallbackStage::AggregateOutput
            .apply(ok_result("up1", &[], &[], 0), &mut ctx)
            .await;
        CallbackStage::AggregateOutput
            .apply(
                HostResult::failure("down1", TransportStatus::ConnectFailed),
                &mut ctx,
            )
            .await;
        assert_eq!(ctx.aggregate_hosts.len(), 2);
    }

    #[tokio::test]
    async fn test_exec_command_replaces_output_with_helper_stdout() {
        let mut ctx = RunContext::new(1);
        ctx.callback_script = Some("tr a-z A-Z #".to_string());

        let result = CallbackStage::ExecCommand
            .apply(ok_result("web1", &["hello"], &[], 0), &mut ctx)
            .await;
        assert_eq!(result.stdout_string().trim(), "HELLO");
    }

    #[tokio::test]
    async fn test_exec_command_without_script_is_passthrough() {
        let mut ctx = RunContext::new(1);
        let result = CallbackStage::ExecCommand
            .apply(ok_result("web1", &["hello"], &[], 0), &mut ctx)
            .await;
        assert_eq!(result.stdout, vec!["hello"]);
    }

    #[tokio::test]
    async fn test_print_output_rewrites_lines_with_host_prefix() {
        let mut ctx = RunContext::new(1);
        let result = CallbackStage::PrintOutput
            .apply(ok_result("web1", &["one", "two"], &["bad"], 0), &mut ctx)
            .await;

        assert_eq!(result.stdout, vec!["web1: one", "web1: two"]);
        assert_eq!(result.stderr, vec!["web1: Error: bad"]);
    }

    #[tokio::test]
    async fn test_print_output_suppressed_for_failures_when_summarizing() {
        let mut ctx = RunContext::new(1);
        ctx.summarize_failed = true;
        let result = CallbackStage::PrintOutput
            .apply(
                HostResult::failure("down1", TransportStatus::Timeout),
                &mut ctx,
            )
            .await;
        // Untouched: the summary line reports it instead
        assert!(result.stdout.is_empty());
        assert!(result.stderr.is_empty());
    }

    #[tokio::test]
    async fn test_print_output_includes_return_codes_when_asked() {
        let mut ctx = RunContext::new(1);
        ctx.print_rc = true;
        let result = CallbackStage::PrintOutput
            .apply(ok_result("web1", &["done"], &[], 2), &mut ctx)
            .await;
        assert_eq!(
            result.stdout,
            vec!["web1: SSH_Returncode: 0\tCommand_Returncode: 2 done"]
        );
    }

    #[test]
    fn test_stage_names_round_trip() {
        for stage in [
            CallbackStage::SummarizeFailures,
            CallbackStage::FilterMatch,
            CallbackStage::FilterJson,
            CallbackStage::FilterBase64,
            CallbackStage::AggregateOutput,
            CallbackStage::ExecCommand,
            CallbackStage::PrintOutput,
            CallbackStage::StatusCount,
        ] {
            assert_eq!(stage.name().parse::<CallbackStage>().unwrap(), stage);
        }
        assert!("bogus".parse::<CallbackStage>().is_err());
    }
}
