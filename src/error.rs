use thiserror::Error;

use crate::config::ConfigError;
use crate::http::FetchError;

/// Setup failures that abort a run.
///
/// Per-IP and per-domain failures never surface here; they are recorded in the
/// batch results instead.
#[derive(Error, Debug)]
pub enum FissionError {
    #[error("Worker pool '{pool}' must have a width of at least 1")]
    InvalidPoolWidth { pool: &'static str },

    #[error("Backend registry is empty")]
    NoBackends,

    #[error("Failed to set up HTTP client: {0}")]
    HttpClient(#[from] FetchError),

    #[error("Failed to set up DNS resolver: {0}")]
    Resolver(String),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}
