//! Configuration management for fission
//!
//! Defaults live in `config/fission.toml`, which is embedded into the binary.
//! A config file on disk replaces the embedded template, environment variables
//! override individual values, and command-line flags override both.

use serde::Deserialize;
use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

use crate::backend::{BackendDescriptor, BackendOrder, PatternKind};

/// Configuration file path relative to working directory
pub const CONFIG_PATH: &str = "./config/fission.toml";

/// Default configuration file content - this is the ONLY place defaults exist
pub const DEFAULT_CONFIG: &str = include_str!("../config/fission.toml");

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found at {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] io::Error),

    #[error("Failed to parse configuration file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid value for environment variable {var}: '{value}'")]
    InvalidEnv { var: String, value: String },

    #[error("Invalid value for '{field}': {value}")]
    InvalidValue { field: String, value: String },

    #[error("Configuration field '{field}' must be greater than zero")]
    MustBePositive { field: String },

    #[error("Configuration field '{field}' cannot be empty")]
    EmptyRequired { field: String },

    #[error("Duplicate backend id '{0}'")]
    DuplicateBackend(String),

    #[error("Invalid URL in '{field}': {url}")]
    InvalidUrl { field: String, url: String },

    #[error("Invalid address in '{field}': {address} (expected ip:port format)")]
    InvalidAddress { field: String, address: String },
}

/// Root configuration structure
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub files: FilesConfig,
    pub http: HttpConfig,
    pub concurrency: ConcurrencyConfig,
    pub reverse_ip: ReverseIpConfig,
    pub dns: DnsConfig,
    pub backends: Vec<BackendConfig>,
}

/// Corpus and report locations
#[derive(Debug, Clone, Deserialize)]
pub struct FilesConfig {
    pub ips_file: PathBuf,
    pub domains_file: PathBuf,
    pub dns_result_file: PathBuf,
}

/// HTTP client and retry policy configuration
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Applies to each attempt separately
    pub request_timeout_secs: u64,
    /// Total attempts per request, including the first
    pub max_attempts: u32,
    pub backoff_factor: f64,
    pub max_backoff_secs: u64,
    pub retry_status_codes: Vec<u16>,
}

impl HttpConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Delay before the given attempt (1-indexed).
    ///
    /// The first retry happens immediately; after that the delay doubles,
    /// scaled by `backoff_factor` and capped at `max_backoff_secs`.
    pub fn calculate_backoff_delay(&self, attempt: u32) -> Duration {
        if attempt <= 2 {
            return Duration::ZERO;
        }
        let exponent = (attempt - 2).min(31) as i32;
        let secs = self.backoff_factor * 2f64.powi(exponent);
        let capped = secs.min(self.max_backoff_secs as f64).max(0.0);
        Duration::from_secs_f64(capped)
    }
}

/// Worker pool widths
#[derive(Debug, Clone, Deserialize)]
pub struct ConcurrencyConfig {
    pub max_workers_request: usize,
    pub max_workers_dns: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReverseIpConfig {
    /// Distinct backends tried per IP
    pub max_attempts: usize,
    #[serde(default)]
    pub backend_order: BackendOrder,
}

/// DNS resolution configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DnsConfig {
    pub timeout_secs: u64,
    pub attempts: usize,
    /// `ip:port` entries; empty means the system resolver configuration
    #[serde(default)]
    pub nameservers: Vec<String>,
}

/// One reverse-IP backend as written in the config file
#[derive(Debug, Clone, Deserialize)]
pub struct BackendConfig {
    pub id: String,
    pub base_url: String,
    pub pattern: PatternKind,
}

impl AppConfig {
    /// Load configuration: `./config/fission.toml` if present, else the embedded defaults
    pub fn load() -> Result<Self, ConfigError> {
        let path = Path::new(CONFIG_PATH);
        if path.exists() {
            Self::load_from_path(path)
        } else {
            Self::embedded_default()
        }
    }

    /// Load configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        let config: AppConfig = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse the template compiled into the binary
    pub fn embedded_default() -> Result<Self, ConfigError> {
        Ok(toml::from_str(DEFAULT_CONFIG)?)
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) -> Result<(), ConfigError> {
        self.apply_env_with(|name| std::env::var(name).ok())
    }

    /// Apply overrides using an arbitrary variable lookup
    pub fn apply_env_with<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = lookup("IPS_FILE") {
            self.files.ips_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("DOMAINS_FILE") {
            self.files.domains_file = PathBuf::from(v);
        }
        if let Some(v) = lookup("DNS_RESULT_FILE") {
            self.files.dns_result_file = PathBuf::from(v);
        }
        if let Some(v) = parse_env(&lookup, "MAX_WORKERS_REQUEST")? {
            self.concurrency.max_workers_request = v;
        }
        if let Some(v) = parse_env(&lookup, "MAX_WORKERS_DNS")? {
            self.concurrency.max_workers_dns = v;
        }
        if let Some(v) = parse_env(&lookup, "MAX_RETRIES")? {
            self.http.max_attempts = v;
        }
        if let Some(v) = parse_env(&lookup, "BACKOFF_FACTOR")? {
            self.http.backoff_factor = v;
        }
        if let Some(v) = parse_env(&lookup, "REQUEST_TIMEOUT")? {
            self.http.request_timeout_secs = v;
        }
        Ok(())
    }

    /// Validate all configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (field, value) in [
            ("concurrency.max_workers_request", self.concurrency.max_workers_request),
            ("concurrency.max_workers_dns", self.concurrency.max_workers_dns),
            ("reverse_ip.max_attempts", self.reverse_ip.max_attempts),
            ("dns.attempts", self.dns.attempts),
        ] {
            if value == 0 {
                return Err(ConfigError::MustBePositive { field: field.to_string() });
            }
        }
        if self.http.max_attempts == 0 {
            return Err(ConfigError::MustBePositive { field: "http.max_attempts".to_string() });
        }
        if self.http.request_timeout_secs == 0 {
            return Err(ConfigError::MustBePositive { field: "http.request_timeout_secs".to_string() });
        }
        if self.dns.timeout_secs == 0 {
            return Err(ConfigError::MustBePositive { field: "dns.timeout_secs".to_string() });
        }
        if !self.http.backoff_factor.is_finite() || self.http.backoff_factor < 0.0 {
            return Err(ConfigError::InvalidValue {
                field: "http.backoff_factor".to_string(),
                value: self.http.backoff_factor.to_string(),
            });
        }

        for (field, path) in [
            ("files.ips_file", &self.files.ips_file),
            ("files.domains_file", &self.files.domains_file),
            ("files.dns_result_file", &self.files.dns_result_file),
        ] {
            if path.as_os_str().is_empty() {
                return Err(ConfigError::EmptyRequired { field: field.to_string() });
            }
        }

        if self.backends.is_empty() {
            return Err(ConfigError::EmptyRequired { field: "backends".to_string() });
        }
        let mut seen = HashSet::new();
        for (i, backend) in self.backends.iter().enumerate() {
            if !seen.insert(backend.id.as_str()) {
                return Err(ConfigError::DuplicateBackend(backend.id.clone()));
            }
            if !(backend.base_url.starts_with("http://") || backend.base_url.starts_with("https://")) {
                return Err(ConfigError::InvalidUrl {
                    field: format!("backends[{}].base_url", i),
                    url: backend.base_url.clone(),
                });
            }
        }

        for (i, address) in self.dns.nameservers.iter().enumerate() {
            if address.parse::<std::net::SocketAddr>().is_err() {
                return Err(ConfigError::InvalidAddress {
                    field: format!("dns.nameservers[{}]", i),
                    address: address.clone(),
                });
            }
        }

        Ok(())
    }

    /// Backend registry built from the `[[backends]]` tables
    pub fn backend_registry(&self) -> Vec<BackendDescriptor> {
        self.backends
            .iter()
            .map(|b| BackendDescriptor::new(b.id.clone(), b.base_url.clone(), b.pattern))
            .collect()
    }

    /// Create default configuration file at the standard location
    pub fn create_default_config() -> Result<PathBuf, ConfigError> {
        Self::create_default_config_at(Path::new(CONFIG_PATH))
    }

    pub fn create_default_config_at(path: &Path) -> Result<PathBuf, ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let mut file = fs::File::create(path)?;
        file.write_all(DEFAULT_CONFIG.as_bytes())?;

        Ok(path.to_path_buf())
    }
}

fn parse_env<F, T>(lookup: &F, var: &str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(var) {
        None => Ok(None),
        Some(raw) => raw.trim().parse::<T>().map(Some).map_err(|_| ConfigError::InvalidEnv {
            var: var.to_string(),
            value: raw,
        }),
    }
}
