//! Reverse-IP backend registry
//!
//! A backend is a third-party service that lists the domains it has seen
//! behind an IP address. Each one is described by a base URL and the shape of
//! the HTML page it returns.

use rand::Rng;
use serde::Deserialize;
use std::fmt;

/// Structural shape of a backend's result page
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternKind {
    /// `<ul id="list">` containing `<a>` elements
    UlList,
    /// `<div id="J_domain">` containing `<p><a>..</a></p>` rows
    DivDomain,
    /// Any pattern name this build does not know how to extract
    #[serde(other)]
    Unsupported,
}

impl fmt::Display for PatternKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternKind::UlList => write!(f, "ul_list"),
            PatternKind::DivDomain => write!(f, "div_domain"),
            PatternKind::Unsupported => write!(f, "unsupported"),
        }
    }
}

/// One reverse-IP lookup service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendDescriptor {
    pub id: String,
    pub base_url: String,
    pub pattern: PatternKind,
}

impl BackendDescriptor {
    pub fn new(id: impl Into<String>, base_url: impl Into<String>, pattern: PatternKind) -> Self {
        Self {
            id: id.into(),
            base_url: base_url.into(),
            pattern,
        }
    }

    /// Lookup URL for an IP: the base URL followed by the address and a trailing slash
    pub fn lookup_url(&self, ip: &str) -> String {
        format!("{}{}/", self.base_url, ip)
    }
}

/// Order in which a resolver draws backends for one IP
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendOrder {
    /// Uniformly at random from the backends not yet tried
    #[default]
    Random,
    /// Registry order
    InOrder,
}

impl BackendOrder {
    /// Index of the next candidate to try, `len` being the number left
    pub fn pick(&self, len: usize) -> usize {
        match self {
            BackendOrder::Random => rand::thread_rng().gen_range(0..len),
            BackendOrder::InOrder => 0,
        }
    }
}
