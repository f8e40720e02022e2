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

//! Sudo prompt handling.
//!
//! Elevated commands run as `sudo -k -S <command>`: `-k` forces a fresh
//! password prompt so the password can be injected over stdin
//! deterministically, `-S` makes sudo read it from stdin. The prompt itself
//! is echoed on stderr, so the leading stderr lines must be scrubbed before
//! the output is handed back.

/// Prompt artifacts that may appear at the start of stderr, across
/// distributions.
pub const SUDO_PROMPT_PATTERNS: &[&str] = &["assword:", "[sudo] password", "password for "];

/// Patterns indicating the password was rejected.
pub const SUDO_FAILURE_PATTERNS: &[&str] = &[
    "sorry, try again",
    "incorrect password",
    "authentication failure",
    "sudo: 3 incorrect password attempts",
    "sudo: no password was provided",
];

/// The lecture sudo prints on first use.
const SUDO_LECTURE: &[&str] = &[
    "We trust you have received the usual lecture from the local System",
    "Administrator. It usually boils down to these three things:",
    "#1) Respect the privacy of others.",
    "#2) Think before you type.",
    "#3) With great power comes great responsibility.",
];

/// Wrap a command for elevated execution.
pub fn wrap_command(command: &str) -> String {
    format!("sudo -k -S {command}")
}

/// Remove echoed password prompts and the sudo lecture from the start of the
/// captured stderr. Scrubbing stops at the first line that is none of these,
/// so real error output is untouched.
pub fn strip_prompt_artifacts(stderr: Vec<String>, password: &str) -> Vec<String> {
    let mut kept = Vec::with_capacity(stderr.len());
    let mut scrubbing = true;

    for line in stderr {
        if scrubbing {
            let trimmed = line.trim();
            let is_artifact = trimmed.is_empty()
                || (!password.is_empty() && line.contains(password))
                || SUDO_PROMPT_PATTERNS.iter().any(|p| line.contains(p))
                || SUDO_LECTURE.contains(&trimmed)
                || trimmed.starts_with("sudo:");
            if is_artifact {
                continue;
            }
            scrubbing = false;
        }
        kept.push(line);
    }
    kept
}

/// Whether the captured output indicates a rejected sudo password.
pub fn password_rejected(stderr: &[String]) -> bool {
    stderr.iter().any(|line| {
        let lower = line.to_lowercase();
        SUDO_FAILURE_PATTERNS.iter().any(|p| lower.contains(p))
    })
}
