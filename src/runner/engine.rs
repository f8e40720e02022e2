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

//! The fan-out execution engine.
//!
//! `run` dispatches one execution task per host against a bounded worker
//! pool and folds completions into a [`Batch`], threading every result
//! through the callback pipeline. All shared state (the [`RunContext`])
//! is mutated only in the single consumer loop, so workers stay isolated
//! and no locks are needed.

use rand::seq::SliceRandom;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use super::callback::{apply_pipeline, CallbackStage};
use super::options::{compute_chunk_size, job_max, RunOptions};
use super::result::{Batch, HostResult, RunContext, TransportStatus};
use crate::ssh::{RemoteExecutor, SshExecutor};
use crate::utils::status;

/// Run a command across a resolved host list over SSH.
///
/// The host list must already be expanded; range syntax is not interpreted
/// here.
pub async fn run(hosts: Vec<String>, options: RunOptions) -> Batch {
    run_with_executor(hosts, options, Arc::new(SshExecutor)).await
}

/// Run against an explicit remote-execution implementation.
///
/// This is the seam tests use to drive the engine without a network.
pub async fn run_with_executor(
    hosts: Vec<String>,
    options: RunOptions,
    executor: Arc<dyn RemoteExecutor>,
) -> Batch {
    let mut hosts = hosts;
    if options.shuffle {
        hosts.shuffle(&mut rand::thread_rng());
    }

    let mut ctx = RunContext::new(hosts.len());
    ctx.match_filter = options.match_filter.clone();
    ctx.callback_script = options.callback_script.clone();
    ctx.print_rc = options.print_rc;
    ctx.only_output = options.only_output;
    ctx.summarize_failed = options.summarize_failed;

    if hosts.is_empty() {
        return Batch {
            results: Vec::new(),
            context: ctx,
        };
    }

    // Elevated execution without a password can only fail; report every
    // host up front without attempting a single connection.
    if options.sudo && options.password.is_none() {
        let results: Vec<HostResult> = hosts
            .iter()
            .map(|host| HostResult::failure(host, TransportStatus::NoPassword))
            .collect();
        ctx.failures = hosts;
        return Batch {
            results,
            context: ctx,
        };
    }

    let jobs = options.jobs.clamp(1, job_max()).min(hosts.len());
    let chunk_size = options
        .chunksize
        .filter(|&size| size > 0)
        .unwrap_or_else(|| compute_chunk_size(hosts.len(), jobs));
    ctx.chunk_size = chunk_size;

    tracing::debug!(
        "dispatching {} hosts across {jobs} workers (chunks of {chunk_size})",
        hosts.len()
    );

    let show_status = options.callbacks.contains(&CallbackStage::StatusCount);
    if show_status {
        status::progress(0, ctx.total_host_count);
    }

    let semaphore = Arc::new(Semaphore::new(jobs));
    let cancel = CancellationToken::new();
    let (tx, mut rx) = mpsc::unbounded_channel::<(usize, HostResult)>();
    let spec = Arc::new(options.exec_spec());

    // One task per chunk; the semaphore keeps at most `jobs` of them
    // executing. Hosts inside a chunk run sequentially, streaming each
    // result back as soon as it completes.
    let indexed: Vec<(usize, String)> = hosts.into_iter().enumerate().collect();
    for chunk in indexed.chunks(chunk_size) {
        let chunk: Vec<(usize, String)> = chunk.to_vec();
        let semaphore = Arc::clone(&semaphore);
        let cancel = cancel.clone();
        let tx = tx.clone();
        let spec = Arc::clone(&spec);
        let executor = Arc::clone(&executor);

        tokio::spawn(async move {
            let _permit = match semaphore.acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => return,
            };
            for (index, host) in chunk {
                if cancel.is_cancelled() {
                    break;
                }
                let result = executor.execute(&host, &spec).await;
                if tx.send((index, result)).is_err() {
                    break;
                }
            }
        });
    }
    drop(tx);

    // The fold loop: the only place shared state is touched. Completions
    // arrive in finish order; `sort` folds them back into submission order
    // through a reorder buffer.
    let mut results = Vec::with_capacity(ctx.total_host_count);
    let mut reorder: BTreeMap<usize, HostResult> = BTreeMap::new();
    let mut next_index = 0usize;

    'consume: loop {
        let received = tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, terminating workers");
                cancel.cancel();
                break 'consume;
            }
            received = rx.recv() => received,
        };
        let Some((index, result)) = received else {
            break;
        };

        if options.sort {
            reorder.insert(index, result);
            while let Some(ready) = reorder.remove(&next_index) {
                next_index += 1;
                if fold(&options, &mut ctx, &mut results, ready).await {
                    cancel.cancel();
                    break 'consume;
                }
            }
        } else if fold(&options, &mut ctx, &mut results, result).await {
            cancel.cancel();
            break 'consume;
        }
    }

    if show_status {
        status::clear();
    }

    Batch {
        results,
        context: ctx,
    }
}

/// Fold one completed result into the batch. Returns true when consumption
/// must stop (`exit_on_error` tripped by a non-zero command exit).
async fn fold(
    options: &RunOptions,
    ctx: &mut RunContext,
    results: &mut Vec<HostResult>,
    result: HostResult,
) -> bool {
    ctx.completed_host_count += 1;
    let result = apply_pipeline(&options.callbacks, result, ctx).await;
    let stop = options.exit_on_error && result.exit_code != 0;
    results.push(result);
    stop
}
