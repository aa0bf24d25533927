//! Wildcard DNS detection.
//!
//! A target with catch-all DNS resolves every label, so passive enumeration
//! returns subdomains that do not exist. We resolve a few random labels per
//! target, collect the addresses, and drop any discovered host resolving to
//! one of them.

use crate::types::Target;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use rand::distributions::Uniform;
use rand::Rng;
use std::collections::{HashMap, HashSet};
use std::net::IpAddr;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info};
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

/// Random-label lookups issued per target.
pub const DEFAULT_PROBES: usize = 3;

const LABEL_LEN: usize = 12;
const RESOLVE_CONCURRENCY: usize = 20;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("lookup of {host} failed: {reason}")]
pub struct LookupError {
    pub host: String,
    pub reason: String,
}

/// Name resolution used by the wildcard detector.
#[async_trait]
pub trait HostResolver: Send + Sync {
    /// Every A/AAAA address of `host`.
    async fn resolve(&self, host: &str) -> Result<HashSet<IpAddr>, LookupError>;
}

/// System DNS through trust-dns.
pub struct TrustDnsResolver {
    resolver: TokioAsyncResolver,
}

impl TrustDnsResolver {
    pub fn new(timeout: Duration) -> Self {
        let mut opts = ResolverOpts::default();
        opts.timeout = timeout;
        opts.attempts = 1;
        Self {
            resolver: TokioAsyncResolver::tokio(ResolverConfig::default(), opts),
        }
    }
}

#[async_trait]
impl HostResolver for TrustDnsResolver {
    async fn resolve(&self, host: &str) -> Result<HashSet<IpAddr>, LookupError> {
        let response = self
            .resolver
            .lookup_ip(host)
            .await
            .map_err(|e| LookupError {
                host: host.to_string(),
                reason: e.to_string(),
            })?;
        Ok(response.iter().collect())
    }
}

/// Fixed host table. Unknown hosts fail to resolve.
#[derive(Debug, Default, Clone)]
pub struct StaticResolver {
    table: HashMap<String, HashSet<IpAddr>>,
    /// Answer returned for any name under these suffixes not in `table`.
    wildcards: HashMap<String, HashSet<IpAddr>>,
}

impl StaticResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_host(mut self, host: &str, ips: &[IpAddr]) -> Self {
        self.table
            .insert(host.to_string(), ips.iter().copied().collect());
        self
    }

    /// Resolve every name under `domain` to `ips`.
    pub fn with_wildcard(mut self, domain: &str, ips: &[IpAddr]) -> Self {
        self.wildcards
            .insert(domain.to_string(), ips.iter().copied().collect());
        self
    }
}

#[async_trait]
impl HostResolver for StaticResolver {
    async fn resolve(&self, host: &str) -> Result<HashSet<IpAddr>, LookupError> {
        if let Some(ips) = self.table.get(host) {
            return Ok(ips.clone());
        }
        self.wildcards
            .iter()
            .find(|(domain, _)| host.ends_with(&format!(".{}", domain)))
            .map(|(_, ips)| ips.clone())
            .ok_or_else(|| LookupError {
                host: host.to_string(),
                reason: "no such host".to_string(),
            })
    }
}

/// A random lowercase label of twelve letters.
pub fn random_label<R: Rng + ?Sized>(rng: &mut R) -> String {
    let letters = Uniform::new_inclusive(b'a', b'z');
    (0..LABEL_LEN)
        .map(|_| char::from(rng.sample(letters)))
        .collect()
}

/// Union of the addresses returned for random labels under every target.
pub async fn detect_wildcards(
    targets: &[Target],
    resolver: &dyn HostResolver,
    probes: usize,
) -> HashSet<IpAddr> {
    let names: Vec<String> = {
        let mut rng = rand::thread_rng();
        targets
            .iter()
            .flat_map(|t| {
                (0..probes)
                    .map(|_| format!("{}.{}", random_label(&mut rng), t))
                    .collect::<Vec<_>>()
            })
            .collect()
    };

    let answers: Vec<HashSet<IpAddr>> = stream::iter(names)
        .map(|name| async move {
            match resolver.resolve(&name).await {
                Ok(ips) => ips,
                Err(e) => {
                    debug!(error = %e, "random label did not resolve");
                    HashSet::new()
                }
            }
        })
        .buffer_unordered(RESOLVE_CONCURRENCY)
        .collect()
        .await;

    let wildcard_ips: HashSet<IpAddr> = answers.into_iter().flatten().collect();
    info!(count = wildcard_ips.len(), "wildcard IPs: {:?}", wildcard_ips);
    wildcard_ips
}

/// Drop hosts that resolve to any wildcard address.
///
/// Identity when `wildcard_ips` is empty. Hosts that fail to resolve are kept.
/// Order of the input is preserved.
pub async fn filter_wildcards(
    hosts: Vec<String>,
    wildcard_ips: &HashSet<IpAddr>,
    resolver: &dyn HostResolver,
) -> Vec<String> {
    if wildcard_ips.is_empty() {
        return hosts;
    }

    let before = hosts.len();
    let verdicts: Vec<(usize, bool)> = stream::iter(hosts.iter().enumerate())
        .map(|(idx, host)| async move {
            let keep = match resolver.resolve(host).await {
                Ok(ips) => ips.is_disjoint(wildcard_ips),
                Err(_) => true,
            };
            (idx, keep)
        })
        .buffer_unordered(RESOLVE_CONCURRENCY)
        .collect()
        .await;

    let keep: HashSet<usize> = verdicts
        .into_iter()
        .filter_map(|(idx, keep)| keep.then_some(idx))
        .collect();
    let filtered: Vec<String> = hosts
        .into_iter()
        .enumerate()
        .filter_map(|(idx, host)| keep.contains(&idx).then_some(host))
        .collect();

    info!(before, after = filtered.len(), "wildcard filter applied");
    filtered
}
