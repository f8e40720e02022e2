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

//! Pluggable host resolvers and the process-wide registry.
//!
//! A resolver maps a parameter string to a list of hosts (or further
//! expressions that the expander re-expands). A resolver may register under
//! several names; the invoked alias is passed into `expand` so one instance
//! can serve filtered variants of the same backend (e.g. `haproxy_up` /
//! `haproxy_down`).
//!
//! The registry is built once from a static table of constructors and cached
//! for the process lifetime. A constructor that fails is skipped rather than
//! aborting registry construction.

use anyhow::Result;
use async_trait::async_trait;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::Arc;

use super::resolvers;

/// A named source of hosts consulted during range expansion.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// All names this resolver answers to. The first name is canonical.
    fn names(&self) -> &[&'static str];

    /// Categories used by type-dispatch meta-resolvers to pick candidates.
    fn category(&self) -> &[&'static str] {
        &[]
    }

    /// Expand a parameter string into hosts or further expressions.
    ///
    /// `invoked_name` is the alias the caller used, letting multi-name
    /// resolvers vary behavior per alias.
    async fn expand(&self, value: &str, invoked_name: &str) -> Result<Vec<String>>;
}

type ResolverCtor = fn() -> Result<Arc<dyn HostResolver>>;

/// Built-in resolver constructors, registered in order. Later constructors
/// never displace a name an earlier one already claimed.
const BUILTIN_RESOLVERS: &[ResolverCtor] = &[
    resolvers::range::build,
    resolvers::file::build,
    resolvers::dns::build_dns,
    resolvers::dns::build_dnsip,
    resolvers::haproxy::build,
    resolvers::vip::build,
];

/// Name-to-resolver mapping, shared for the process lifetime.
pub struct ResolverRegistry {
    by_name: HashMap<String, Arc<dyn HostResolver>>,
}

static REGISTRY: Lazy<ResolverRegistry> = Lazy::new(ResolverRegistry::builtin);

impl ResolverRegistry {
    /// Build a registry holding all built-in resolvers.
    pub fn builtin() -> Self {
        let mut registry = Self {
            by_name: HashMap::new(),
        };
        for ctor in BUILTIN_RESOLVERS {
            match ctor() {
                Ok(resolver) => registry.register(resolver),
                Err(e) => {
                    // Best-effort loading: a broken resolver is absent, not fatal.
                    tracing::debug!("skipping resolver that failed to load: {e:#}");
                }
            }
        }
        registry
    }

    /// An empty registry, useful for tests that register their own resolvers.
    pub fn empty() -> Self {
        Self {
            by_name: HashMap::new(),
        }
    }

    /// The process-wide registry, built on first use.
    pub fn global() -> &'static ResolverRegistry {
        &REGISTRY
    }

    /// Register a resolver under all of its declared names.
    pub fn register(&mut self, resolver: Arc<dyn HostResolver>) {
        for name in resolver.names() {
            self.by_name
                .entry(name.to_lowercase())
                .or_insert_with(|| Arc::clone(&resolver));
        }
    }

    /// Look up a resolver by name (case-insensitive).
    pub fn get(&self, name: &str) -> Option<&Arc<dyn HostResolver>> {
        self.by_name.get(&name.to_lowercase())
    }

    /// All registered names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.by_name.keys().cloned().collect();
        names.sort();
        names
    }

    /// Resolvers of a given category, as (registered name, resolver) pairs.
    pub fn by_category(&self, category: &str) -> Vec<(String, Arc<dyn HostResolver>)> {
        let mut found: Vec<(String, Arc<dyn HostResolver>)> = self
            .by_name
            .iter()
            .filter(|(_, r)| r.category().contains(&category))
            .map(|(name, r)| (name.clone(), Arc::clone(r)))
            .collect();
        found.sort_by(|a, b| a.0.cmp(&b.0));
        found
    }
}
