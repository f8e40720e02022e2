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

//! Type-dispatch meta-resolver for load-balancer VIPs.
//!
//! `type_vip:value` does not know which balancer implementation fronts a
//! VIP, so it tries every registered resolver of category `vip` until one
//! produces a non-empty answer. The `_up`/`_down` aliases restrict the
//! candidates to the matching filtered aliases of those resolvers. When no
//! candidate claims the value it falls through unchanged, so an unclaimed
//! VIP address degrades to a plain host.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

use crate::hostlist::resolver::{HostResolver, ResolverRegistry};

pub struct VipDispatchResolver;

pub fn build() -> Result<Arc<dyn HostResolver>> {
    Ok(Arc::new(VipDispatchResolver))
}

#[async_trait]
impl HostResolver for VipDispatchResolver {
    fn names(&self) -> &[&'static str] {
        &["type", "type_vip", "type_vip_up", "type_vip_down"]
    }

    async fn expand(&self, value: &str, invoked_name: &str) -> Result<Vec<String>> {
        let suffix = match invoked_name {
            "type_vip_up" => "_up",
            "type_vip_down" => "_down",
            _ => "",
        };

        for (name, resolver) in ResolverRegistry::global().by_category("vip") {
            // Unfiltered dispatch goes to the base alias only; filtered
            // dispatch goes to the alias carrying the matching suffix.
            let candidate = if suffix.is_empty() {
                !name.contains('_')
            } else {
                name.ends_with(suffix)
            };
            if !candidate {
                continue;
            }

            match resolver.expand(value, &name).await {
                Ok(hosts) if !hosts.is_empty() => return Ok(hosts),
                Ok(_) => continue,
                Err(e) => {
                    tracing::debug!("vip candidate '{name}' failed for '{value}': {e:#}");
                    continue;
                }
            }
        }

        Ok(vec![value.to_string()])
    }
}
