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

//! DNS-backed resolvers.
//!
//! `dnsip:name` resolves a name to its unique addresses. `dns:name` does the
//! same but tags each address as `type_vip:<addr>` so that load-balancer
//! dispatch gets a chance to expand a VIP address into its backends on the
//! next expansion pass; when no balancer claims it, type dispatch falls back
//! to the address itself.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::hostlist::resolver::HostResolver;

pub struct DnsResolver {
    name: &'static [&'static str],
    tag_vip: bool,
}

pub fn build_dns() -> Result<Arc<dyn HostResolver>> {
    Ok(Arc::new(DnsResolver {
        name: &["dns"],
        tag_vip: true,
    }))
}

pub fn build_dnsip() -> Result<Arc<dyn HostResolver>> {
    Ok(Arc::new(DnsResolver {
        name: &["dnsip"],
        tag_vip: false,
    }))
}

#[async_trait]
impl HostResolver for DnsResolver {
    fn names(&self) -> &[&'static str] {
        self.name
    }

    async fn expand(&self, value: &str, _invoked_name: &str) -> Result<Vec<String>> {
        let addrs = tokio::net::lookup_host((value, 0u16))
            .await
            .with_context(|| format!("DNS lookup failed for '{value}'"))?;

        let mut seen = std::collections::HashSet::new();
        let mut hosts = Vec::new();
        for addr in addrs {
            let ip = addr.ip().to_string();
            if seen.insert(ip.clone()) {
                if self.tag_vip {
                    hosts.push(format!("type_vip:{ip}"));
                } else {
                    hosts.push(ip);
                }
            }
        }
        Ok(hosts)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dnsip_resolves_localhost() {
        let resolver = DnsResolver {
            name: &["dnsip"],
            tag_vip: false,
        };
        let hosts = resolver.expand("localhost", "dnsip").await.unwrap();
        assert!(!hosts.is_empty());
        assert!(hosts
            .iter()
            .all(|h| h == "127.0.0.1" || h == "::1" || h.parse::<std::net::IpAddr>().is_ok()));
    }

    #[tokio::test]
    async fn test_dns_tags_addresses_for_vip_dispatch() {
        let resolver = DnsResolver {
            name: &["dns"],
            tag_vip: true,
        };
        let hosts = resolver.expand("localhost", "dns").await.unwrap();
        assert!(!hosts.is_empty());
        assert!(hosts.iter().all(|h| h.starts_with("type_vip:")));
    }
}
