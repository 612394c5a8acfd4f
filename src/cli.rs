use clap::Parser;
use std::path::PathBuf;

use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "fission")]
#[command(about = "Grows a corpus of CDN-fronted IPs and domains via reverse-IP and DNS lookups")]
#[command(version)]
pub struct Cli {
    /// Create default configuration file at ./config/fission.toml
    #[arg(long)]
    pub init: bool,

    /// Configuration file (defaults to ./config/fission.toml, then built-in defaults)
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Path to IP list file
    #[arg(long, value_name = "PATH")]
    pub ip_file: Option<PathBuf>,

    /// Path to domain list file
    #[arg(long, value_name = "PATH")]
    pub domain_file: Option<PathBuf>,

    /// Path to DNS result file
    #[arg(long, value_name = "PATH")]
    pub dns_result_file: Option<PathBuf>,

    /// Skip IP to domain lookup
    #[arg(long)]
    pub skip_ip_to_domain: bool,

    /// Skip domain to IP lookup
    #[arg(long)]
    pub skip_domain_to_ip: bool,

    /// Concurrent reverse-IP requests (overrides config and MAX_WORKERS_REQUEST)
    #[arg(long, value_name = "N")]
    pub workers_request: Option<usize>,

    /// Concurrent DNS lookups (overrides config and MAX_WORKERS_DNS)
    #[arg(long, value_name = "N")]
    pub workers_dns: Option<usize>,

    /// Verbose logging (use -v for per-item detail, -vv for everything)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Log file, appended to on every run
    #[arg(long, value_name = "PATH", default_value = "fission.log")]
    pub log_file: PathBuf,

    /// Do not write a log file
    #[arg(long)]
    pub no_log_file: bool,
}

impl Cli {
    /// Apply command-line overrides on top of file and environment settings
    pub fn apply_overrides(&self, config: &mut AppConfig) {
        if let Some(path) = &self.ip_file {
            config.files.ips_file = path.clone();
        }
        if let Some(path) = &self.domain_file {
            config.files.domains_file = path.clone();
        }
        if let Some(path) = &self.dns_result_file {
            config.files.dns_result_file = path.clone();
        }
        if let Some(n) = self.workers_request {
            config.concurrency.max_workers_request = n;
        }
        if let Some(n) = self.workers_dns {
            config.concurrency.max_workers_dns = n;
        }
    }

    pub fn log_file_path(&self) -> Option<&std::path::Path> {
        if self.no_log_file {
            None
        } else {
            Some(self.log_file.as_path())
        }
    }
}
