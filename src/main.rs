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

use anyhow::{Context, Result};
use clap::Parser;
use owo_colors::OwoColorize;
use zeroize::Zeroizing;

use hostmap::{
    cli::Cli,
    config::Config,
    hostlist,
    runner::{self, Batch, RunOptions},
    utils::{init_logging, status},
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let config = Config::global();
    let args: Vec<String> = std::env::args().collect();

    // Config-file defaults apply only when the flag was not given explicitly
    let jobs = if has_flag(&args, "--jobs") || has_flag(&args, "-j") {
        cli.jobs
    } else {
        config.defaults.jobs.unwrap_or(cli.jobs)
    };
    let timeout = if has_flag(&args, "--timeout") {
        cli.timeout
    } else {
        config.defaults.timeout.unwrap_or(cli.timeout)
    };

    let interactive = status::is_tty();
    let callbacks = cli.build_callbacks(interactive);
    let show_status = !cli.no_status && interactive;

    if show_status {
        status::info("Looking up hosts");
    }
    let hosts = hostlist::expand(&cli.hostrange)
        .await
        .with_context(|| format!("failed to expand host range '{}'", cli.hostrange))?;
    if show_status {
        status::clear();
    }
    if hosts.is_empty() {
        anyhow::bail!("host range '{}' expanded to no hosts", cli.hostrange);
    }

    let command = resolve_command(&cli)?;
    let password = obtain_password(&cli)?;

    let script = cli
        .runscript
        .as_ref()
        .map(|path| path.to_string_lossy().to_string());

    let mut options = RunOptions::new(command);
    options.script = script;
    options.username = cli.username.clone();
    options.password = password;
    options.sudo = cli.sudo;
    options.timeout = timeout;
    options.jobs = jobs;
    options.sort = cli.sort;
    options.shuffle = cli.shuffle;
    options.chunksize = cli.chunksize;
    options.exit_on_error = cli.exit_on_error;
    options.key_path = cli.identity.clone();
    options.callbacks = callbacks;
    options.match_filter = cli.match_filter.clone();
    options.callback_script = cli.callback_script.clone();
    options.print_rc = cli.print_rc;
    options.only_output = cli.only_output;
    options.summarize_failed = cli.summarize_failed;

    let batch = runner::run(hosts, options).await;

    if cli.aggregate_output {
        print_aggregated(&batch);
    }
    if cli.summarize_failed && !batch.failures().is_empty() {
        println!(
            "{} {}",
            "SSH failed to:".red(),
            hostlist::compress(batch.failures())
        );
    }

    if !batch.all_succeeded() {
        std::process::exit(1);
    }
    Ok(())
}

fn has_flag(args: &[String], flag: &str) -> bool {
    let prefix = format!("{flag}=");
    args.iter().any(|arg| arg == flag || arg.starts_with(&prefix))
}

/// The remote command; with a script and no explicit command, the script's
/// shebang names the interpreter.
fn resolve_command(cli: &Cli) -> Result<String> {
    let command = cli.command();
    if !command.is_empty() {
        return Ok(command);
    }

    if let Some(ref script) = cli.runscript {
        let content = std::fs::read_to_string(script)
            .with_context(|| format!("failed to read script {script:?}"))?;
        if let Some(interpreter) = content
            .lines()
            .next()
            .and_then(|line| line.strip_prefix("#!"))
        {
            return Ok(interpreter.trim().to_string());
        }
        anyhow::bail!("script {script:?} has no shebang line; pass the shell to run it with");
    }

    anyhow::bail!("no command specified\nExample: hostmap 'web[1-3]' uptime");
}

/// Resolve the password: prompt when asked (or when sudo needs one), fall
/// back to the environment.
fn obtain_password(cli: &Cli) -> Result<Option<Zeroizing<String>>> {
    if let Ok(password) = std::env::var("HOSTMAP_SUDO_PASSWORD") {
        if !cli.password {
            return Ok(Some(Zeroizing::new(password)));
        }
    }

    if cli.password || cli.sudo {
        let user = cli
            .username
            .clone()
            .unwrap_or_else(whoami::username);
        let prompt = if cli.sudo {
            format!("Enter sudo password for user {user}: ")
        } else {
            format!("Enter password for user {user}: ")
        };
        let password = rpassword::prompt_password(prompt).context("failed to read password")?;
        return Ok(Some(Zeroizing::new(password)));
    }

    Ok(None)
}

/// Print aggregated output: one block per content-hash group, each line
/// prefixed with the member host list.
fn print_aggregated(batch: &Batch) {
    status::clear();
    for (digest, hosts) in &batch.context.aggregate_hosts {
        let Some((stdout, stderr)) = batch.context.collapsed_output.get(digest) else {
            continue;
        };
        let hostline = hostlist::compress(hosts);
        for line in stdout {
            println!("{hostline}: {}", line.trim_end());
        }
        for line in stderr {
            eprintln!("{hostline}: {}", line.trim_end());
        }
    }
}
