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

//! Status-line helpers for interactive terminals.
//!
//! Progress is drawn on stderr by overwriting the current line; everything
//! is a no-op when stderr is not a tty so piped output stays clean.

use std::io::Write;

/// Move to column 0 and erase to end of line
const LINE_RESET: &str = "\x1b[0G\x1b[0K";

pub fn is_tty() -> bool {
    atty::is(atty::Stream::Stderr)
}

/// Clear the current status line.
pub fn clear() {
    if !is_tty() {
        return;
    }
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{LINE_RESET}");
    let _ = stderr.flush();
}

/// Overwrite the status line with an informational message.
pub fn info(text: &str) {
    if !is_tty() {
        return;
    }
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{LINE_RESET}{text}");
    let _ = stderr.flush();
}

/// Overwrite the status line with a completed/total counter.
pub fn progress(completed: usize, total: usize) {
    let mut stderr = std::io::stderr();
    let _ = write!(stderr, "{LINE_RESET}{completed}/{total}");
    let _ = stderr.flush();
}
