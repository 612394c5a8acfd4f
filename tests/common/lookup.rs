use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::net::Ipv4Addr;
use std::sync::atomic::{AtomicUsize, Ordering};

use fission::dns::AddressLookup;

/// Answers A-record queries from a fixed table; unknown names are NXDOMAIN
#[derive(Default)]
pub struct StaticLookup {
    records: HashMap<String, Vec<Ipv4Addr>>,
    queries: AtomicUsize,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, domain: &str, addresses: &[&str]) -> Self {
        let parsed = addresses
            .iter()
            .map(|a| a.parse().expect("test address must be valid IPv4"))
            .collect();
        self.records.insert(domain.to_string(), parsed);
        self
    }

    pub fn query_count(&self) -> usize {
        self.queries.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AddressLookup for StaticLookup {
    async fn lookup_ipv4(&self, domain: &str) -> Result<Vec<Ipv4Addr>> {
        self.queries.fetch_add(1, Ordering::SeqCst);
        self.records
            .get(domain)
            .cloned()
            .ok_or_else(|| anyhow!("no record found for Query {{ name: Name(\"{}.\"), query_type: A }}", domain))
    }
}
