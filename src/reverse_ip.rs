//! Reverse-IP lookup across interchangeable backends
//!
//! For one IP the resolver draws backends without replacement, at random by
//! default, until one of them lists at least one domain or the attempt budget
//! runs out. An empty result is the normal outcome for an IP nobody has indexed.

use std::collections::{BTreeSet, HashSet};
use std::net::Ipv4Addr;
use tracing::{debug, info, warn};

use crate::backend::{BackendDescriptor, BackendOrder};
use crate::batch::{run_bounded, BatchOutcome, CancelFlag};
use crate::error::FissionError;
use crate::extract::extract_domains;
use crate::http::FetchClient;

/// Outcome of resolving one IP
#[derive(Debug, Clone, PartialEq)]
pub struct ReverseLookupResult {
    pub ip: Ipv4Addr,
    pub domains: Vec<String>,
    pub attempts_used: usize,
    pub backends_tried: HashSet<String>,
}

/// Aggregated outcome of resolving many IPs
#[derive(Debug, Clone)]
pub struct ReverseSweep {
    pub domains: HashSet<String>,
    pub results: Vec<ReverseLookupResult>,
    /// False when cancellation left some IPs unqueried
    pub complete: bool,
}

/// Reverse-IP resolver over a fixed backend registry
#[derive(Debug, Clone)]
pub struct ReverseIpResolver {
    client: FetchClient,
    backends: Vec<BackendDescriptor>,
    max_attempts: usize,
    order: BackendOrder,
}

impl ReverseIpResolver {
    pub fn new(client: FetchClient, backends: Vec<BackendDescriptor>, max_attempts: usize) -> Result<Self, FissionError> {
        if backends.is_empty() {
            return Err(FissionError::NoBackends);
        }
        Ok(Self {
            client,
            backends,
            max_attempts,
            order: BackendOrder::Random,
        })
    }

    /// Draw backends in `order` instead of at random
    pub fn with_order(mut self, order: BackendOrder) -> Self {
        self.order = order;
        self
    }

    pub fn backends(&self) -> &[BackendDescriptor] {
        &self.backends
    }

    /// Find the domains hosted behind `ip`.
    ///
    /// Each attempt removes one backend from the candidate set, so no
    /// backend is queried twice for the same IP. The first attempt that
    /// extracts a non-empty domain list wins. A page with no domains counts
    /// as a failed attempt, the same as a fetch error.
    pub async fn resolve_ip(&self, ip: Ipv4Addr) -> ReverseLookupResult {
        let ip_str = ip.to_string();
        let mut candidates: Vec<&BackendDescriptor> = self.backends.iter().collect();
        let mut tried = HashSet::new();
        let mut attempts = 0;

        debug!("Fetching domains for {}", ip_str);

        while attempts < self.max_attempts {
            if candidates.is_empty() {
                debug!("No backends left for {}", ip_str);
                break;
            }

            let index = self.order.pick(candidates.len());
            let backend = candidates.remove(index);
            tried.insert(backend.id.clone());
            attempts += 1;

            let url = backend.lookup_url(&ip_str);
            match self.client.fetch(&url).await {
                Ok(body) => {
                    let domains = extract_domains(&body, backend.pattern);
                    if !domains.is_empty() {
                        debug!("Found {} domains for {} via {}", domains.len(), ip_str, backend.id);
                        return ReverseLookupResult {
                            ip,
                            domains,
                            attempts_used: attempts,
                            backends_tried: tried,
                        };
                    }
                    debug!("{} listed no domains for {}", backend.id, ip_str);
                }
                Err(e) => {
                    debug!("Error fetching domains for {} from {}: {}", ip_str, backend.id, e);
                }
            }
        }

        debug!("Giving up on {} after {} attempts", ip_str, attempts);
        ReverseLookupResult {
            ip,
            domains: Vec::new(),
            attempts_used: attempts,
            backends_tried: tried,
        }
    }

    /// Resolve every IP with at most `width` lookups in flight and union the domains
    pub async fn resolve_all(
        &self,
        ips: &BTreeSet<Ipv4Addr>,
        width: usize,
        cancel: &CancelFlag,
    ) -> Result<ReverseSweep, FissionError> {
        info!("Resolving domains for {} IPs (workers: {})", ips.len(), width);

        let outcome: BatchOutcome<ReverseLookupResult> = run_bounded(
            "request",
            ips.iter().copied().collect(),
            width,
            cancel,
            |ip| self.resolve_ip(ip),
        )
        .await?;

        let domains: HashSet<String> = outcome
            .items
            .iter()
            .flat_map(|result| result.domains.iter().cloned())
            .collect();

        let empty = outcome.items.iter().filter(|r| r.domains.is_empty()).count();
        if empty > 0 {
            warn!("{} of {} IPs yielded no domains", empty, outcome.items.len());
        }
        info!("Found {} unique domains from {} IPs", domains.len(), outcome.items.len());

        Ok(ReverseSweep {
            domains,
            complete: outcome.is_complete(),
            results: outcome.items,
        })
    }
}
