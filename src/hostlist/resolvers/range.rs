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

//! Bracket-range resolver.
//!
//! This is the resolver bare terms default to; registering it by name also
//! allows explicit `range:node[1-5]` references.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::hostlist::resolver::HostResolver;

pub struct RangeResolver;

pub fn build() -> Result<Arc<dyn HostResolver>> {
    Ok(Arc::new(RangeResolver))
}

#[async_trait]
impl HostResolver for RangeResolver {
    fn names(&self) -> &[&'static str] {
        &["range"]
    }

    async fn expand(&self, value: &str, _invoked_name: &str) -> Result<Vec<String>> {
        Ok(crate::hostlist::expand_pattern(value)?)
    }
}
