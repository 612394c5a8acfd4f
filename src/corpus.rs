//! Newline-delimited corpus files
//!
//! The IP corpus is kept sorted, the domain corpus keeps first-seen order.
//! Neither loses entries across a load and save.
//! Every write goes through a sibling temp file and a rename so an interrupted
//! run never leaves a truncated corpus behind.

use anyhow::{Context, Result};
use std::collections::{BTreeSet, HashSet};
use std::fs;
use std::io::Write;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

use crate::address::{is_global, parse_ipv4};
use crate::dns::{render_report, DnsLookupResult};

/// Read non-blank, trimmed lines; a missing file is created empty
pub fn load_lines(path: &Path) -> Result<Vec<String>> {
    if !path.exists() {
        warn!("File not found: {}. Creating empty file.", path.display());
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory {}", parent.display()))?;
        }
        fs::write(path, "").with_context(|| format!("Failed to create {}", path.display()))?;
        return Ok(Vec::new());
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect())
}

/// The persisted IP corpus.
///
/// Only global addresses are fed to lookups. Every other persisted line is
/// kept and written back unchanged, so the corpus never shrinks.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IpCorpus {
    pub global: BTreeSet<Ipv4Addr>,
    pub non_global: BTreeSet<Ipv4Addr>,
    /// Lines that are not IPv4 addresses, in order of first appearance
    pub unparsed: Vec<String>,
}

impl IpCorpus {
    /// Number of distinct entries that will be written back
    pub fn len(&self) -> usize {
        self.global.len() + self.non_global.len() + self.unparsed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Load the IP corpus, setting aside lines that are not global IPv4 addresses
pub fn load_ip_corpus(path: &Path) -> Result<IpCorpus> {
    let mut corpus = IpCorpus::default();
    for line in load_lines(path)? {
        match parse_ipv4(&line) {
            Some(ip) if is_global(&ip) => {
                corpus.global.insert(ip);
            }
            Some(ip) => {
                debug!("Not looking up non-global address {} from {}", ip, path.display());
                corpus.non_global.insert(ip);
            }
            None => {
                warn!("Not looking up invalid IPv4 address '{}' from {}", line, path.display());
                if !corpus.unparsed.contains(&line) {
                    corpus.unparsed.push(line);
                }
            }
        }
    }
    Ok(corpus)
}

/// Load the domain corpus, deduplicated in order of first appearance
pub fn load_domain_corpus(path: &Path) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    Ok(load_lines(path)?
        .into_iter()
        .filter(|domain| seen.insert(domain.clone()))
        .collect())
}

/// Existing domains in their original order followed by new ones, sorted
pub fn merge_domains(existing: &[String], discovered: &HashSet<String>) -> Vec<String> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut merged: Vec<String> = existing
        .iter()
        .filter(|d| seen.insert(d.as_str()))
        .cloned()
        .collect();

    let mut fresh: Vec<&String> = discovered
        .iter()
        .filter(|d| !seen.contains(d.as_str()))
        .collect();
    fresh.sort();
    merged.extend(fresh.into_iter().cloned());
    merged
}

/// Write the IP corpus: addresses in ascending numeric order, then any
/// unparsed lines in their original order
pub fn save_ip_corpus(path: &Path, corpus: &IpCorpus) -> Result<()> {
    let mut content = String::new();
    for ip in corpus.global.union(&corpus.non_global) {
        content.push_str(&ip.to_string());
        content.push('\n');
    }
    for line in &corpus.unparsed {
        content.push_str(line);
        content.push('\n');
    }
    write_atomic(path, &content)?;
    info!("Saved {} IPs to {}", corpus.len(), path.display());
    Ok(())
}

/// Write the domain corpus, dropping duplicates and blank entries
pub fn save_domain_corpus(path: &Path, domains: &[String]) -> Result<()> {
    let mut seen = HashSet::new();
    let mut content = String::new();
    let mut count = 0;
    for domain in domains.iter().map(|d| d.trim()).filter(|d| !d.is_empty()) {
        if seen.insert(domain) {
            content.push_str(domain);
            content.push('\n');
            count += 1;
        }
    }
    write_atomic(path, &content)?;
    info!("Saved {} domains to {}", count, path.display());
    Ok(())
}

/// Write the DNS lookup report
pub fn write_dns_report(path: &Path, results: &[DnsLookupResult]) -> Result<()> {
    write_atomic(path, &render_report(results))?;
    info!("Wrote {} DNS lookup records to {}", results.len(), path.display());
    Ok(())
}

/// Write to a temp file next to `path`, then rename over it
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let temp_path = temp_path_for(path);
    {
        let mut file = fs::File::create(&temp_path)
            .with_context(|| format!("Failed to create {}", temp_path.display()))?;
        file.write_all(content.as_bytes())
            .with_context(|| format!("Failed to write {}", temp_path.display()))?;
        file.sync_all()?;
    }

    fs::rename(&temp_path, path)
        .with_context(|| format!("Failed to move {} into place", path.display()))?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "corpus".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}
