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

//! Host-range expression support.
//!
//! A host-range expression is a comma-separated list of terms denoting a set
//! of target hosts:
//! - literal hosts: `web1.example.com`
//! - bracket ranges: `node[01-05]`, `rack[1-2]-node[1-3]` (cartesian product)
//! - resolver references: `file:/etc/hosts.d/web`, `dns:service.example.com`,
//!   `haproxy_up:lb1:web-backend`
//! - the set-difference operator `-` between terms:
//!   `web[01-10],-,web[04-06]`
//!
//! Resolver output may itself contain further resolver syntax; expansion
//! recurses until the list settles, unless a single pass is requested.
//!
//! # Examples
//!
//! ```rust
//! use hostmap::hostlist;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let hosts = hostlist::expand("foo[01-03]").await.unwrap();
//! assert_eq!(hosts, vec!["foo01", "foo02", "foo03"]);
//! # }
//! ```

pub mod error;
pub mod parser;
pub mod resolver;
pub mod resolvers;

pub use error::HostlistError;
pub use parser::{parse_host_pattern, HostPattern, PatternSegment};
pub use resolver::{HostResolver, ResolverRegistry};

/// Maximum number of hosts a single pattern may generate
const MAX_EXPANSION_SIZE: usize = 100_000;

/// Maximum number of resolver passes before expansion is considered cyclic
const MAX_RESOLVER_PASSES: usize = 16;

/// The set-difference operator token
const DIFFERENCE_TOKEN: &str = "-";

/// Expand a host-range expression into a list of hosts.
///
/// Uses the process-wide resolver registry and recurses until no resolver
/// reference remains.
pub async fn expand(expr: &str) -> Result<Vec<String>, HostlistError> {
    expand_with(ResolverRegistry::global(), expr, false).await
}

/// Expand a host-range expression with exactly one resolver pass.
///
/// Syntax a single pass does not resolve is passed through literally.
pub async fn expand_one_pass(expr: &str) -> Result<Vec<String>, HostlistError> {
    expand_with(ResolverRegistry::global(), expr, true).await
}

/// Expand an expression against an explicit resolver registry.
pub async fn expand_with(
    registry: &ResolverRegistry,
    expr: &str,
    one_pass: bool,
) -> Result<Vec<String>, HostlistError> {
    let terms = split_terms(expr)?;
    expand_terms(registry, terms, one_pass).await
}

/// Expand a sequence of already-split terms against a resolver registry.
///
/// This is the recursion entry point: resolver output is fed back through
/// until no resolver fires, capped at [`MAX_RESOLVER_PASSES`].
pub async fn expand_terms(
    registry: &ResolverRegistry,
    terms: Vec<String>,
    one_pass: bool,
) -> Result<Vec<String>, HostlistError> {
    let mut current = terms;
    for _ in 0..MAX_RESOLVER_PASSES {
        let (next, resolver_fired) = expand_pass(registry, &current).await?;
        current = next;
        if one_pass || !resolver_fired {
            return Ok(current);
        }
    }
    Err(HostlistError::RecursionLimit {
        limit: MAX_RESOLVER_PASSES,
    })
}

/// One expansion pass over the term sequence.
///
/// Returns the expanded list and whether any named resolver fired (which
/// means another pass may be needed).
async fn expand_pass(
    registry: &ResolverRegistry,
    terms: &[String],
) -> Result<(Vec<String>, bool), HostlistError> {
    let mut out: Vec<String> = Vec::new();
    let mut resolver_fired = false;
    let mut pending_difference = false;

    for term in terms {
        let term = term.trim();
        if term.is_empty() {
            continue;
        }
        if term == DIFFERENCE_TOKEN {
            pending_difference = true;
            continue;
        }

        let expanded = if let Some((name, params)) = split_resolver_ref(term) {
            match registry.get(name) {
                Some(resolver) => {
                    resolver_fired = true;
                    match resolver.expand(params, &name.to_lowercase()).await {
                        Ok(hosts) => hosts,
                        Err(e) => {
                            tracing::warn!("resolver '{name}' failed for '{params}': {e:#}");
                            Vec::new()
                        }
                    }
                }
                None => {
                    tracing::warn!("unknown resolver '{name}' in term '{term}'");
                    Vec::new()
                }
            }
        } else {
            expand_pattern(term)?
        };

        if pending_difference {
            subtract(&mut out, &expanded);
            pending_difference = false;
        } else {
            out.extend(expanded);
        }
    }

    Ok((out, resolver_fired))
}

/// Split a term into a resolver reference, if it is one.
///
/// A reference is `name:params` where the name is a plain identifier before
/// the first colon. Everything after the first colon (including further
/// colons) is the parameter string.
fn split_resolver_ref(term: &str) -> Option<(&str, &str)> {
    let (name, params) = term.split_once(':')?;
    if name.is_empty()
        || !name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return None;
    }
    Some((name, params))
}

/// Expand a bare term through bracket-range distribution.
///
/// A term without brackets expands to itself.
pub fn expand_pattern(term: &str) -> Result<Vec<String>, HostlistError> {
    if term.is_empty() {
        return Ok(Vec::new());
    }

    let pattern = parse_host_pattern(term)?;

    let expansion_count = pattern.expansion_count();
    if expansion_count > MAX_EXPANSION_SIZE {
        return Err(HostlistError::RangeTooLarge {
            expression: term.to_string(),
            count: expansion_count,
            limit: MAX_EXPANSION_SIZE,
        });
    }

    if !pattern.has_brackets() {
        return Ok(vec![term.to_string()]);
    }

    // Cartesian product across segments
    let mut results = vec![String::new()];
    for segment in &pattern.segments {
        match segment {
            PatternSegment::Literal(lit) => {
                for result in &mut results {
                    result.push_str(lit);
                }
            }
            PatternSegment::Bracket(expr) => {
                let values = expr.values();
                let mut next = Vec::with_capacity(results.len().saturating_mul(values.len()));
                for result in &results {
                    for value in &values {
                        let mut combined = result.clone();
                        combined.push_str(value);
                        next.push(combined);
                    }
                }
                results = next;
            }
        }
    }

    Ok(results)
}

/// Remove every host of `right` from the accumulated set, then drop
/// duplicates. First-seen order of the surviving hosts is kept so the
/// output is deterministic even though difference is a set operation.
fn subtract(accumulated: &mut Vec<String>, right: &[String]) {
    let remove: std::collections::HashSet<&String> = right.iter().collect();
    let mut seen = std::collections::HashSet::new();
    accumulated.retain(|host| !remove.contains(host) && seen.insert(host.clone()));
}

/// Split an expression by commas, respecting bracket boundaries.
pub fn split_terms(expr: &str) -> Result<Vec<String>, HostlistError> {
    let mut terms = Vec::new();
    let mut current = String::new();
    let mut bracket_depth = 0usize;

    for ch in expr.chars() {
        match ch {
            '[' => {
                bracket_depth += 1;
                current.push(ch);
            }
            ']' => {
                if bracket_depth == 0 {
                    return Err(HostlistError::UnmatchedBracket {
                        expression: expr.to_string(),
                    });
                }
                bracket_depth -= 1;
                current.push(ch);
            }
            ',' if bracket_depth == 0 => {
                if !current.trim().is_empty() {
                    terms.push(current.trim().to_string());
                }
                current.clear();
            }
            _ => current.push(ch),
        }
    }

    if bracket_depth != 0 {
        return Err(HostlistError::UnclosedBracket {
            expression: expr.to_string(),
        });
    }
    if !current.trim().is_empty() {
        terms.push(current.trim().to_string());
    }

    Ok(terms)
}

/// Compress a host list into a range representation.
///
/// This is a cosmetic pass: it joins the hosts without attempting to fold
/// them back into bracket ranges.
pub fn compress(hosts: &[String]) -> String {
    hosts.join(",")
}
