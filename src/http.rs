//! HTTP fetch client for reverse-IP backends
//!
//! Every request carries a randomly chosen browser User-Agent and is wrapped in
//! the shared retry policy from [`crate::retry`].

use rand::seq::SliceRandom;
use reqwest::header::{ACCEPT, CONNECTION, USER_AGENT};
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

use crate::config::HttpConfig;
use crate::retry::RetryHelper;

/// Desktop and mobile browser User-Agent strings rotated per request
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/123.0.0.0 Safari/537.36 Edg/123.0.2420.81",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Safari/605.1.15",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 14.4; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    "Mozilla/5.0 (X11; Ubuntu; Linux x86_64; rv:125.0) Gecko/20100101 Firefox/125.0",
    "Mozilla/5.0 (iPhone; CPU iPhone OS 17_4_1 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.4.1 Mobile/15E148 Safari/604.1",
    "Mozilla/5.0 (Linux; Android 14; Pixel 8) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.6367.82 Mobile Safari/537.36",
];

/// Pick a plausible browser User-Agent at random
pub fn random_user_agent() -> &'static str {
    USER_AGENTS
        .choose(&mut rand::thread_rng())
        .copied()
        .unwrap_or(USER_AGENTS[0])
}

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("{url} returned retryable HTTP {status}")]
    TransientStatus { url: String, status: u16 },

    #[error("Request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Giving up on {url} after {attempts} attempts: {last}")]
    RetriesExhausted {
        url: String,
        attempts: u32,
        #[source]
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Whether the retry policy should try this request again
    pub fn is_transient(&self) -> bool {
        match self {
            FetchError::TransientStatus { .. } => true,
            FetchError::Transport { source, .. } => {
                source.is_timeout() || source.is_connect() || source.is_request()
            }
            _ => false,
        }
    }
}

/// GET client shared by all reverse-IP workers
#[derive(Debug, Clone)]
pub struct FetchClient {
    client: reqwest::Client,
    retry: RetryHelper,
    timeout: Duration,
}

impl FetchClient {
    /// Create a client from the HTTP section of the configuration
    pub fn from_config(config: &HttpConfig) -> Result<Self, FetchError> {
        let timeout = config.request_timeout();
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            client,
            retry: RetryHelper::new(config),
            timeout,
        })
    }

    /// GET `url` and return the body, retrying transient failures
    pub async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.retry
            .with_retry(|| self.fetch_once(url), FetchError::is_transient)
            .await
            .map_err(|failure| {
                if failure.exhausted {
                    FetchError::RetriesExhausted {
                        url: url.to_string(),
                        attempts: failure.attempts,
                        last: Box::new(failure.error),
                    }
                } else {
                    failure.error
                }
            })
    }

    async fn fetch_once(&self, url: &str) -> Result<String, FetchError> {
        let user_agent = random_user_agent();
        debug!("GET {} (UA: {})", url, user_agent);

        let response = self
            .client
            .get(url)
            .header(USER_AGENT, user_agent)
            .header(ACCEPT, "*/*")
            .header(CONNECTION, "keep-alive")
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|source| FetchError::Transport { url: url.to_string(), source })?;

        let status = response.status();
        if !status.is_success() {
            let status = status.as_u16();
            return Err(if self.retry.is_retryable_status(status) {
                FetchError::TransientStatus { url: url.to_string(), status }
            } else {
                FetchError::Status { url: url.to_string(), status }
            });
        }

        response
            .text()
            .await
            .map_err(|source| FetchError::Body { url: url.to_string(), source })
    }
}
