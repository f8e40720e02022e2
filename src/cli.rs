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

use clap::Parser;
use std::path::PathBuf;

use crate::runner::CallbackStage;

#[derive(Parser, Debug)]
#[command(
    name = "hostmap",
    version,
    about = "Parallel command execution across host ranges",
    long_about = "hostmap expands a host-range expression into a list of hosts and runs an\nidentical command on every host in parallel over SSH, feeding each result\nthrough an output-processing pipeline before reporting.\n\nRange expressions support bracket ranges (web[01-10]), comma lists, set\ndifference (web[01-10],-,web[04-06]) and pluggable resolvers\n(file:/path, dns:name, haproxy_up:lb1:backend).",
    after_help = "EXAMPLES:\n  Run on a range:              hostmap 'web[01-10]' uptime\n  Exclude part of a range:     hostmap 'web[01-10],-,web[04-06]' uptime\n  Hosts from a file:           hostmap file:/etc/hosts.d/web 'df -h'\n  Aggregate identical output:  hostmap --aggregate-output 'db[1-8]' 'uname -r'\n  Run a script:                hostmap --runscript ./check.sh 'app[1-4]' /bin/bash\n  Sudo with prompt:            hostmap --sudo 'web[1-3]' 'systemctl restart nginx'"
)]
pub struct Cli {
    /// Host-range expression of targets to operate on
    #[arg(value_name = "hostrange")]
    pub hostrange: String,

    /// Command to run on the remote hosts (the shell to pass a script to
    /// when --runscript is used)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command_args: Vec<String>,

    #[arg(
        short = 'j',
        long,
        default_value = "65",
        help = "Number of parallel commands to execute",
        help_heading = "Job Settings"
    )]
    pub jobs: usize,

    #[arg(
        long,
        default_value = "0",
        help = "Per-host timeout in seconds, 0 for no timeout",
        help_heading = "Job Settings"
    )]
    pub timeout: u64,

    #[arg(
        long,
        help = "Print output in the order hosts were listed",
        help_heading = "Job Settings"
    )]
    pub sort: bool,

    #[arg(
        long,
        help = "Shuffle (randomize) the order of hosts",
        help_heading = "Job Settings"
    )]
    pub shuffle: bool,

    #[arg(
        long,
        help = "Hosts dispatched to a worker per scheduling round [default: computed]",
        help_heading = "Job Settings"
    )]
    pub chunksize: Option<usize>,

    #[arg(
        long,
        help = "Stop collecting results after the first non-zero exit code",
        help_heading = "Job Settings"
    )]
    pub exit_on_error: bool,

    #[arg(
        long,
        help = "Replace stdout with a JSON array of [stdout, stderr, exit_code]",
        help_heading = "Output Formats"
    )]
    pub output_json: bool,

    #[arg(
        long,
        help = "Base64-encode stdout and stderr",
        help_heading = "Output Formats"
    )]
    pub output_base64: bool,

    #[arg(
        long,
        help = "Print a list of hosts that failed at the end instead of inline",
        help_heading = "Output Options"
    )]
    pub summarize_failed: bool,

    #[arg(
        long,
        visible_alias = "collapse",
        help = "Group hosts with identical output and print each group once",
        help_heading = "Output Options"
    )]
    pub aggregate_output: bool,

    #[arg(
        long,
        help = "Only print lines for hosts that returned output",
        help_heading = "Output Options"
    )]
    pub only_output: bool,

    #[arg(
        long,
        help = "Print the return code values with each line",
        help_heading = "Output Options"
    )]
    pub print_rc: bool,

    #[arg(
        long = "match",
        value_name = "STRING",
        help = "Only show host output containing this string",
        help_heading = "Output Options"
    )]
    pub match_filter: Option<String>,

    #[arg(
        long,
        help = "Don't show the live completed/total status counter",
        help_heading = "Output Options"
    )]
    pub no_status: bool,

    #[arg(
        long,
        value_name = "FILE",
        help = "Run a script on all hosts; the command is the shell to pass it to",
        help_heading = "Execution Options"
    )]
    pub runscript: Option<PathBuf>,

    #[arg(
        long,
        value_name = "COMMAND",
        help = "Pipe each host's output through this helper; the hostname is\npassed as the first argument and the output on stdin",
        help_heading = "Execution Options"
    )]
    pub callback_script: Option<String>,

    #[arg(
        long,
        help = "Run the command as root via sudo (prompts for a password)",
        help_heading = "Execution Options"
    )]
    pub sudo: bool,

    #[arg(
        short = 'u',
        long,
        help = "Username for SSH connections [default: current user]",
        help_heading = "Execution Options"
    )]
    pub username: Option<String>,

    #[arg(
        short = 'P',
        long,
        help = "Prompt for a password",
        help_heading = "Execution Options"
    )]
    pub password: bool,

    #[arg(
        short = 'i',
        long,
        value_name = "FILE",
        help = "SSH private key file",
        help_heading = "Execution Options"
    )]
    pub identity: Option<PathBuf>,

    #[arg(
        short = 'v',
        long,
        action = clap::ArgAction::Count,
        help = "Increase verbosity (-v, -vv, -vvv)"
    )]
    pub verbose: u8,
}

impl Cli {
    /// The remote command, joined from the trailing arguments.
    pub fn command(&self) -> String {
        self.command_args.join(" ")
    }

    /// Assemble the callback pipeline implied by the output options.
    ///
    /// `interactive` gates the live status counter: it is only useful on a
    /// terminal.
    pub fn build_callbacks(&self, interactive: bool) -> Vec<CallbackStage> {
        let mut callbacks = vec![CallbackStage::SummarizeFailures];
        if self.match_filter.is_some() {
            callbacks.push(CallbackStage::FilterMatch);
        }
        if self.output_base64 {
            callbacks.push(CallbackStage::FilterBase64);
        }
        if self.output_json {
            callbacks.push(CallbackStage::FilterJson);
        }
        if self.callback_script.is_some() {
            callbacks.push(CallbackStage::ExecCommand);
        } else if self.aggregate_output {
            callbacks.push(CallbackStage::AggregateOutput);
        } else {
            callbacks.push(CallbackStage::PrintOutput);
        }
        if !self.no_status {
            if interactive {
                callbacks.push(CallbackStage::StatusCount);
            } else {
                tracing::debug!("not a tty, disabling the status counter");
            }
        }
        callbacks
    }
}
