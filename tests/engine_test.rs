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

//! Engine integration tests, driven through a scripted remote executor.

mod common;

use common::{hosts, MockExecutor, MockResponse};
use hostmap::runner::{run_with_executor, CallbackStage, RunOptions, TransportStatus};
use zeroize::Zeroizing;

#[tokio::test]
async fn test_single_host_echo() {
    let executor = MockExecutor::new()
        .respond("localhost", MockResponse::ok(&["hello"]))
        .into_arc();

    let batch = run_with_executor(
        vec!["localhost".to_string()],
        RunOptions::new("echo hello"),
        executor,
    )
    .await;

    assert_eq!(batch.len(), 1);
    let result = &batch.results[0];
    assert_eq!(result.host, "localhost");
    assert_eq!(result.transport_status, TransportStatus::Ok);
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.stdout, vec!["hello"]);
}

#[tokio::test]
async fn test_every_host_gets_a_result() {
    let executor = MockExecutor::new()
        .fallback(MockResponse::ok(&["up"]))
        .into_arc();

    let batch = run_with_executor(hosts("web", 20), RunOptions::new("uptime"), executor).await;

    assert_eq!(batch.len(), 20);
    assert!(batch.all_succeeded());
    assert_eq!(batch.context.completed_host_count, 20);
    assert_eq!(batch.context.total_host_count, 20);
}

#[tokio::test]
async fn test_concurrency_never_exceeds_jobs() {
    let executor = MockExecutor::new()
        .fallback(MockResponse::default().with_delay(25))
        .into_arc();

    let options = RunOptions::new("uptime").with_jobs(3);
    let batch = run_with_executor(hosts("web", 12), options, executor.clone()).await;

    assert_eq!(batch.len(), 12);
    assert!(
        executor.peak_concurrency() <= 3,
        "peak concurrency {} exceeded jobs=3",
        executor.peak_concurrency()
    );
}

#[tokio::test]
async fn test_jobs_clamped_to_host_count() {
    let executor = MockExecutor::new()
        .fallback(MockResponse::default().with_delay(10))
        .into_arc();

    let options = RunOptions::new("uptime").with_jobs(500);
    let batch = run_with_executor(hosts("web", 4), options, executor.clone()).await;

    assert_eq!(batch.len(), 4);
    assert!(executor.peak_concurrency() <= 4);
}

#[tokio::test]
async fn test_no_password_short_circuit() {
    let executor = MockExecutor::new().into_arc();

    let mut options = RunOptions::new("whoami");
    options.sudo = true;
    options.password = None;
    let batch = run_with_executor(hosts("web", 5), options, executor.clone()).await;

    assert_eq!(batch.len(), 5);
    assert!(batch
        .iter()
        .all(|r| r.transport_status == TransportStatus::NoPassword));
    assert_eq!(executor.attempts(), 0, "no connection may be attempted");
    assert_eq!(batch.context.completed_host_count, 0);
    assert_eq!(batch.failures(), &hosts("web", 5)[..]);
}

#[tokio::test]
async fn test_sudo_with_password_connects() {
    let executor = MockExecutor::new()
        .fallback(MockResponse::ok(&["root"]))
        .into_arc();

    let options = RunOptions::new("whoami").with_sudo(Some(Zeroizing::new("pw".to_string())));
    let batch = run_with_executor(hosts("web", 2), options, executor.clone()).await;

    assert_eq!(executor.attempts(), 2);
    assert!(batch.all_succeeded());
}

#[tokio::test]
async fn test_exit_on_error_stops_after_first_failure() {
    // h1 fails fast; h2 completes much later. Only h1 may be folded.
    let executor = MockExecutor::new()
        .respond("h1", MockResponse::exit(1).with_delay(10))
        .respond("h2", MockResponse::exit(1).with_delay(300))
        .into_arc();

    let options = RunOptions::new("false").with_exit_on_error(true);
    let batch = run_with_executor(
        vec!["h1".to_string(), "h2".to_string()],
        options,
        executor,
    )
    .await;

    assert_eq!(batch.len(), 1);
    assert_eq!(batch.results[0].host, "h1");
    assert_eq!(batch.results[0].exit_code, 1);
}

#[tokio::test]
async fn test_exit_on_error_ignores_zero_exits() {
    let executor = MockExecutor::new()
        .fallback(MockResponse::ok(&["fine"]))
        .into_arc();

    let options = RunOptions::new("true").with_exit_on_error(true);
    let batch = run_with_executor(hosts("web", 6), options, executor).await;
    assert_eq!(batch.len(), 6);
}

#[tokio::test]
async fn test_sort_folds_in_submission_order() {
    // Completion order is reversed by delays; sort restores listing order.
    let executor = MockExecutor::new()
        .respond("a", MockResponse::ok(&["a"]).with_delay(80))
        .respond("b", MockResponse::ok(&["b"]).with_delay(40))
        .respond("c", MockResponse::ok(&["c"]).with_delay(5))
        .into_arc();

    let options = RunOptions::new("echo").with_sort(true).with_jobs(3);
    let batch = run_with_executor(
        vec!["a".to_string(), "b".to_string(), "c".to_string()],
        options,
        executor.clone(),
    )
    .await;

    let folded: Vec<&str> = batch.iter().map(|r| r.host.as_str()).collect();
    assert_eq!(folded, vec!["a", "b", "c"]);
    assert_eq!(executor.completion_order()[0], "c");
}

#[tokio::test]
async fn test_unsorted_folds_in_completion_order() {
    let executor = MockExecutor::new()
        .respond("a", MockResponse::ok(&["a"]).with_delay(120))
        .respond("b", MockResponse::ok(&["b"]).with_delay(5))
        .into_arc();

    let options = RunOptions::new("echo").with_jobs(2);
    let batch = run_with_executor(
        vec!["a".to_string(), "b".to_string()],
        options,
        executor,
    )
    .await;

    let folded: Vec<&str> = batch.iter().map(|r| r.host.as_str()).collect();
    assert_eq!(folded, vec!["b", "a"]);
}

#[tokio::test]
async fn test_failures_collected_through_pipeline() {
    let executor = MockExecutor::new()
        .respond("good1", MockResponse::ok(&["ok"]))
        .respond("bad1", MockResponse::failed(TransportStatus::ConnectFailed))
        .respond("bad2", MockResponse::failed(TransportStatus::Timeout))
        .into_arc();

    let batch = run_with_executor(
        vec!["good1".to_string(), "bad1".to_string(), "bad2".to_string()],
        RunOptions::new("uptime"),
        executor,
    )
    .await;

    let mut failures = batch.failures().to_vec();
    failures.sort();
    assert_eq!(failures, vec!["bad1", "bad2"]);
    assert!(!batch.all_succeeded());
}

#[tokio::test]
async fn test_aggregation_groups_across_a_run() {
    let executor = MockExecutor::new()
        .respond("web1", MockResponse::ok(&["kernel 6.1"]))
        .respond("web2", MockResponse::ok(&["kernel 6.1"]))
        .respond("web3", MockResponse::ok(&["kernel 6.2"]))
        .respond("down1", MockResponse::failed(TransportStatus::ConnectFailed))
        .into_arc();

    let options = RunOptions::new("uname -r").with_callbacks(vec![
        CallbackStage::SummarizeFailures,
        CallbackStage::AggregateOutput,
    ]);
    let batch = run_with_executor(
        vec![
            "web1".to_string(),
            "web2".to_string(),
            "web3".to_string(),
            "down1".to_string(),
        ],
        options,
        executor,
    )
    .await;

    // Three distinct outputs: the shared kernel line, the odd one, the failure
    assert_eq!(batch.context.aggregate_hosts.len(), 3);
    let mut shared: Vec<String> = batch
        .context
        .aggregate_hosts
        .values()
        .find(|group| group.len() == 2)
        .cloned()
        .unwrap();
    shared.sort();
    assert_eq!(shared, vec!["web1", "web2"]);

    // The failed host's group carries the failure message
    let failed_group = batch
        .context
        .aggregate_hosts
        .iter()
        .find(|(_, group)| group.contains(&"down1".to_string()))
        .map(|(digest, _)| digest)
        .unwrap();
    let (_, stderr) = &batch.context.collapsed_output[failed_group];
    assert_eq!(stderr, &vec!["SSH connection failed".to_string()]);
}

#[tokio::test]
async fn test_chunk_size_recorded_in_context() {
    let executor = MockExecutor::new().into_arc();

    let options = RunOptions::new("uptime").with_jobs(10);
    let batch = run_with_executor(hosts("web", 100), options, executor).await;
    // floor(100/10) - 1 = 9
    assert_eq!(batch.context.chunk_size, 9);
}

#[tokio::test]
async fn test_explicit_chunk_size_wins() {
    let executor = MockExecutor::new().into_arc();

    let mut options = RunOptions::new("uptime").with_jobs(10);
    options.chunksize = Some(2);
    let batch = run_with_executor(hosts("web", 100), options, executor).await;
    assert_eq!(batch.context.chunk_size, 2);
}

#[tokio::test]
async fn test_shuffle_still_covers_every_host() {
    let executor = MockExecutor::new()
        .fallback(MockResponse::ok(&["ok"]))
        .into_arc();

    let mut options = RunOptions::new("uptime");
    options.shuffle = true;
    let batch = run_with_executor(hosts("web", 30), options, executor).await;

    let mut seen: Vec<&str> = batch.iter().map(|r| r.host.as_str()).collect();
    seen.sort();
    let expected = hosts("web", 30);
    let mut expected: Vec<&str> = expected.iter().map(String::as_str).collect();
    expected.sort();
    assert_eq!(seen, expected);
}

#[tokio::test]
async fn test_empty_host_list_returns_empty_batch() {
    let executor = MockExecutor::new().into_arc();
    let batch = run_with_executor(Vec::new(), RunOptions::new("uptime"), executor).await;
    assert!(batch.is_empty());
    assert_eq!(batch.context.total_host_count, 0);
}

#[tokio::test]
async fn test_command_failure_is_distinct_from_transport_failure() {
    let executor = MockExecutor::new()
        .respond("cmdfail", MockResponse::exit(2))
        .respond("netfail", MockResponse::failed(TransportStatus::ConnectFailed))
        .into_arc();

    let batch = run_with_executor(
        vec!["cmdfail".to_string(), "netfail".to_string()],
        RunOptions::new("check"),
        executor,
    )
    .await;

    let cmdfail = batch.iter().find(|r| r.host == "cmdfail").unwrap();
    assert_eq!(cmdfail.transport_status, TransportStatus::Ok);
    assert_eq!(cmdfail.exit_code, 2);

    let netfail = batch.iter().find(|r| r.host == "netfail").unwrap();
    assert_eq!(netfail.transport_status, TransportStatus::ConnectFailed);

    // Only the transport failure lands in the failure list
    assert_eq!(batch.failures(), &["netfail".to_string()][..]);
}
