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

//! File-backed resolver: `file:/path/to/hosts` reads one host per line.
//!
//! Blank lines and `#` comments are skipped. The entries may themselves be
//! further expressions; the expander re-expands resolver output.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::hostlist::resolver::HostResolver;

/// Maximum hostfile size (1 MB)
const MAX_HOSTFILE_SIZE: u64 = 1024 * 1024;

/// Maximum number of lines in a hostfile
const MAX_HOSTFILE_LINES: usize = 100_000;

pub struct FileResolver;

pub fn build() -> Result<Arc<dyn HostResolver>> {
    Ok(Arc::new(FileResolver))
}

#[async_trait]
impl HostResolver for FileResolver {
    fn names(&self) -> &[&'static str] {
        &["file"]
    }

    async fn expand(&self, value: &str, _invoked_name: &str) -> Result<Vec<String>> {
        let metadata = tokio::fs::metadata(value)
            .await
            .with_context(|| format!("hostfile not found: {value}"))?;
        if metadata.len() > MAX_HOSTFILE_SIZE {
            anyhow::bail!(
                "hostfile '{value}' is {} bytes, exceeding the {MAX_HOSTFILE_SIZE} byte limit",
                metadata.len()
            );
        }

        let content = tokio::fs::read_to_string(value)
            .await
            .with_context(|| format!("failed to read hostfile '{value}'"))?;

        if content.lines().count() > MAX_HOSTFILE_LINES {
            anyhow::bail!("hostfile '{value}' has more than {MAX_HOSTFILE_LINES} lines");
        }

        Ok(content
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(String::from)
            .collect())
    }
}
