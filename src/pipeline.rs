//! The two-phase discovery cycle
//!
//! 1. IP -> domain: reverse-IP lookups for every known IP, merged into the
//!    domain corpus.
//! 2. Domain -> IP: A-record lookups for every known domain, written to the
//!    DNS report and merged into the IP corpus.

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{info, warn};

use crate::batch::CancelFlag;
use crate::config::AppConfig;
use crate::corpus;
use crate::dns::{AddressLookup, DnsBatchResolver, HickoryLookup};
use crate::error::FissionError;
use crate::http::FetchClient;
use crate::reverse_ip::ReverseIpResolver;

/// Counts for one phase of a run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PhaseSummary {
    /// Items read from the input corpus
    pub inputs: usize,
    /// Items produced by the lookups, before merging
    pub discovered: usize,
    /// Size of the output corpus after merging
    pub corpus_size: usize,
    /// Inputs whose lookup failed or found nothing
    pub failures: usize,
    /// False when the run was interrupted before every input was dispatched
    pub complete: bool,
    pub skipped: bool,
}

impl PhaseSummary {
    fn skipped() -> Self {
        Self { complete: true, skipped: true, ..Self::default() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub ip_to_domain: PhaseSummary,
    pub domain_to_ip: PhaseSummary,
}

impl RunSummary {
    pub fn is_complete(&self) -> bool {
        self.ip_to_domain.complete && self.domain_to_ip.complete
    }
}

/// Runs discovery cycles over the configured corpora
pub struct Fission {
    config: AppConfig,
    reverse: ReverseIpResolver,
    dns: DnsBatchResolver,
    cancel: CancelFlag,
}

impl Fission {
    /// Build every component from configuration, using the system DNS stack
    pub fn from_config(config: AppConfig, cancel: CancelFlag) -> Result<Self, FissionError> {
        let lookup = HickoryLookup::from_config(&config.dns)?;
        Self::with_lookup(config, Arc::new(lookup), cancel)
    }

    /// Build with a caller-supplied A-record backend
    pub fn with_lookup(
        config: AppConfig,
        lookup: Arc<dyn AddressLookup>,
        cancel: CancelFlag,
    ) -> Result<Self, FissionError> {
        config.validate()?;

        let client = FetchClient::from_config(&config.http)?;
        let reverse = ReverseIpResolver::new(
            client,
            config.backend_registry(),
            config.reverse_ip.max_attempts,
        )?
        .with_order(config.reverse_ip.backend_order);

        Ok(Self {
            reverse,
            dns: DnsBatchResolver::new(lookup),
            config,
            cancel,
        })
    }

    /// Grow the domain corpus from the IP corpus
    pub async fn ip_to_domain(&self) -> Result<PhaseSummary> {
        info!("Starting IP to domain lookup...");
        let files = &self.config.files;

        let ips = corpus::load_ip_corpus(&files.ips_file)?.global;
        if ips.is_empty() {
            warn!("No IP addresses found. Skipping IP to domain lookup.");
            return Ok(PhaseSummary::skipped());
        }
        info!(
            "Found {} IP addresses to process across {} backends.",
            ips.len(),
            self.reverse.backends().len()
        );

        let sweep = self
            .reverse
            .resolve_all(&ips, self.config.concurrency.max_workers_request, &self.cancel)
            .await
            .context("IP to domain lookup could not start")?;
        info!("Found {} new domains from IP lookup.", sweep.domains.len());

        let existing = corpus::load_domain_corpus(&files.domains_file)?;
        info!("Found {} existing domains.", existing.len());

        let merged = corpus::merge_domains(&existing, &sweep.domains);
        info!("Total unique domains after merging: {}", merged.len());
        corpus::save_domain_corpus(&files.domains_file, &merged)?;

        if !sweep.complete {
            warn!("IP to domain lookup was interrupted; saved partial results.");
        }
        info!("IP to domain lookup completed.");

        Ok(PhaseSummary {
            inputs: ips.len(),
            discovered: sweep.domains.len(),
            corpus_size: merged.len(),
            failures: sweep.results.iter().filter(|r| r.domains.is_empty()).count(),
            complete: sweep.complete,
            skipped: false,
        })
    }

    /// Grow the IP corpus from the domain corpus
    pub async fn domain_to_ip(&self) -> Result<PhaseSummary> {
        info!("Starting domain to IP lookup...");
        let files = &self.config.files;

        let domains = corpus::load_domain_corpus(&files.domains_file)?;
        if domains.is_empty() {
            warn!("No domains found in file. Skipping domain to IP lookup.");
            return Ok(PhaseSummary::skipped());
        }

        let mut ip_corpus = corpus::load_ip_corpus(&files.ips_file)?;
        let known = ip_corpus.global.len();
        let sweep = self
            .dns
            .resolve_and_merge(
                &domains,
                &ip_corpus.global,
                self.config.concurrency.max_workers_dns,
                &self.cancel,
            )
            .await
            .context("Domain to IP lookup could not start")?;

        corpus::write_dns_report(&files.dns_result_file, &sweep.results)?;
        let failures = sweep.failures();
        let complete = sweep.complete;
        ip_corpus.global = sweep.ips;
        corpus::save_ip_corpus(&files.ips_file, &ip_corpus)?;

        if !complete {
            warn!("Domain to IP lookup was interrupted; saved partial results.");
        }
        info!("DNS lookups completed. Found {} unique IPv4 addresses.", ip_corpus.global.len());

        Ok(PhaseSummary {
            inputs: domains.len(),
            discovered: ip_corpus.global.len() - known,
            corpus_size: ip_corpus.len(),
            failures,
            complete,
            skipped: false,
        })
    }

    /// Run both phases in order, honouring the skip flags and cancellation
    pub async fn run(&self, skip_ip_to_domain: bool, skip_domain_to_ip: bool) -> Result<RunSummary> {
        info!("Starting Fission process...");
        let mut summary = RunSummary {
            ip_to_domain: PhaseSummary::skipped(),
            domain_to_ip: PhaseSummary::skipped(),
        };

        if skip_ip_to_domain {
            info!("Skipping IP to domain lookup as requested.");
        } else {
            summary.ip_to_domain = self.ip_to_domain().await?;
        }

        if skip_domain_to_ip {
            info!("Skipping domain to IP lookup as requested.");
        } else if self.cancel.is_cancelled() {
            warn!("Interrupted; not starting domain to IP lookup.");
            summary.domain_to_ip.complete = false;
        } else {
            summary.domain_to_ip = self.domain_to_ip().await?;
        }

        info!("Fission process completed.");
        Ok(summary)
    }
}
