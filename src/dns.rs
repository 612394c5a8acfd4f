use anyhow::Result;
use async_trait::async_trait;
use hickory_resolver::config::{LookupIpStrategy, NameServerConfig, Protocol, ResolverConfig, ResolverOpts};
use hickory_resolver::TokioAsyncResolver;
use std::collections::BTreeSet;
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::address::{extract_ipv4_literals, is_global};
use crate::batch::{run_bounded, CancelFlag};
use crate::config::DnsConfig;
use crate::error::FissionError;

/// A-record lookup backend
#[async_trait]
pub trait AddressLookup: Send + Sync {
    /// IPv4 addresses for `domain`; any failure is an `Err` with a readable reason
    async fn lookup_ipv4(&self, domain: &str) -> Result<Vec<Ipv4Addr>>;
}

/// `AddressLookup` backed by hickory's async resolver
pub struct HickoryLookup {
    resolver: TokioAsyncResolver,
}

impl HickoryLookup {
    /// Build a resolver from the `[dns]` configuration section
    pub fn from_config(config: &DnsConfig) -> Result<Self, FissionError> {
        let (resolver_config, mut opts) = if config.nameservers.is_empty() {
            match hickory_resolver::system_conf::read_system_conf() {
                Ok(system) => system,
                Err(e) => {
                    warn!("Could not read system resolver configuration ({}), using defaults", e);
                    (ResolverConfig::default(), ResolverOpts::default())
                }
            }
        } else {
            let mut resolver_config = ResolverConfig::new();
            for (i, address) in config.nameservers.iter().enumerate() {
                let socket_addr: SocketAddr = address.parse().map_err(|e| {
                    FissionError::Resolver(format!("invalid nameserver dns.nameservers[{}] '{}': {}", i, address, e))
                })?;
                resolver_config.add_name_server(NameServerConfig::new(socket_addr, Protocol::Udp));
            }
            let mut opts = ResolverOpts::default();
            opts.use_hosts_file = false;
            (resolver_config, opts)
        };

        opts.timeout = Duration::from_secs(config.timeout_secs);
        opts.attempts = config.attempts;
        opts.ip_strategy = LookupIpStrategy::Ipv4Only;

        Ok(Self {
            resolver: TokioAsyncResolver::tokio(resolver_config, opts),
        })
    }
}

#[async_trait]
impl AddressLookup for HickoryLookup {
    async fn lookup_ipv4(&self, domain: &str) -> Result<Vec<Ipv4Addr>> {
        let lookup = self.resolver.ipv4_lookup(domain).await?;
        Ok(lookup.iter().map(|record| record.0).collect())
    }
}

/// Success or failure of one A-record lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DnsOutcome {
    /// Distinct addresses in the order the resolver returned them
    Success(Vec<Ipv4Addr>),
    Failure(String),
}

/// Result of resolving one domain
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsLookupResult {
    pub domain: String,
    pub outcome: DnsOutcome,
}

impl DnsLookupResult {
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, DnsOutcome::Success(_))
    }

    /// nslookup-style transcript for this lookup
    pub fn transcript(&self) -> String {
        let domain = &self.domain;
        match &self.outcome {
            DnsOutcome::Success(addresses) => {
                let joined = addresses
                    .iter()
                    .map(|a| a.to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "Server: Unspecified\nAddress: 0.0.0.0#53\n\nNon-authoritative answer:\n{domain} canonical name = {domain}.\nName: {domain}\nAddress: {joined}"
                )
            }
            DnsOutcome::Failure(reason) => format!(
                "Server: Unspecified\nAddress: 0.0.0.0#53\n\n** server can't find {domain}: NXDOMAIN\nError: {reason}"
            ),
        }
    }

    /// Transcript preceded by the `--- DNS Lookup for .. ---` header line
    pub fn render(&self) -> String {
        format!("--- DNS Lookup for {} ---\n{}", self.domain, self.transcript())
    }
}

/// Report text for a batch: rendered blocks separated by a blank line
pub fn render_report(results: &[DnsLookupResult]) -> String {
    let mut report = String::new();
    for result in results {
        report.push_str(&result.render());
        report.push_str("\n\n");
    }
    report
}

/// Union of `previous` with every global IPv4 literal in the successful transcripts
pub fn merge_global_ips(results: &[DnsLookupResult], previous: &BTreeSet<Ipv4Addr>) -> BTreeSet<Ipv4Addr> {
    let mut merged = previous.clone();
    for result in results.iter().filter(|r| r.is_success()) {
        for ip in extract_ipv4_literals(&result.transcript()) {
            if is_global(&ip) {
                merged.insert(ip);
            } else {
                debug!("Discarding non-global address {} for {}", ip, result.domain);
            }
        }
    }
    merged
}

/// Aggregated outcome of resolving many domains
#[derive(Debug, Clone)]
pub struct DnsSweep {
    /// Previously known addresses plus every new global address
    pub ips: BTreeSet<Ipv4Addr>,
    /// One result per resolved domain, in input order
    pub results: Vec<DnsLookupResult>,
    /// False when cancellation left some domains unresolved
    pub complete: bool,
}

impl DnsSweep {
    pub fn failures(&self) -> usize {
        self.results.iter().filter(|r| !r.is_success()).count()
    }
}

/// Concurrent A-record resolver
#[derive(Clone)]
pub struct DnsBatchResolver {
    lookup: Arc<dyn AddressLookup>,
}

impl DnsBatchResolver {
    pub fn new(lookup: Arc<dyn AddressLookup>) -> Self {
        Self { lookup }
    }

    /// Resolve one domain; failures are captured in the result, never returned
    pub async fn lookup(&self, domain: &str) -> DnsLookupResult {
        debug!("Performing DNS lookup for {}", domain);

        let outcome = match self.lookup.lookup_ipv4(domain).await {
            Ok(addresses) if addresses.is_empty() => {
                DnsOutcome::Failure(format!("no A records found for {}", domain))
            }
            Ok(addresses) => {
                let mut seen = BTreeSet::new();
                let distinct = addresses.into_iter().filter(|a| seen.insert(*a)).collect();
                DnsOutcome::Success(distinct)
            }
            Err(e) => {
                debug!("DNS lookup failed for {}: {}", domain, e);
                DnsOutcome::Failure(e.to_string())
            }
        };

        DnsLookupResult {
            domain: domain.to_string(),
            outcome,
        }
    }

    /// Resolve every domain with at most `width` lookups in flight and merge
    /// the global addresses found into `previously_known`.
    pub async fn resolve_and_merge(
        &self,
        domains: &[String],
        previously_known: &BTreeSet<Ipv4Addr>,
        width: usize,
        cancel: &CancelFlag,
    ) -> Result<DnsSweep, FissionError> {
        info!("Resolving {} domains (workers: {})", domains.len(), width);

        let outcome = run_bounded(
            "dns",
            domains.iter().enumerate().collect(),
            width,
            cancel,
            |(index, domain): (usize, &String)| async move { (index, self.lookup(domain).await) },
        )
        .await?;

        let complete = outcome.is_complete();
        let mut indexed = outcome.items;
        indexed.sort_by_key(|(index, _)| *index);
        let results: Vec<DnsLookupResult> = indexed.into_iter().map(|(_, result)| result).collect();

        let ips = merge_global_ips(&results, previously_known);

        let failed = results.iter().filter(|r| !r.is_success()).count();
        info!(
            "DNS lookups completed: {} resolved, {} failed, {} unique IPv4 addresses ({} new)",
            results.len() - failed,
            failed,
            ips.len(),
            ips.len() - previously_known.len().min(ips.len())
        );

        Ok(DnsSweep { ips, results, complete })
    }
}
