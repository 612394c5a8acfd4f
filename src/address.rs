//! IPv4 classification and literal extraction

use once_cell::sync::Lazy;
use regex::Regex;
use std::net::Ipv4Addr;

static IPV4_LITERAL_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:[0-9]{1,3}\.){3}[0-9]{1,3}\b").unwrap()
});

/// True for publicly routable unicast addresses.
///
/// Excludes "this network", private, shared (CGNAT), loopback, link-local,
/// IETF protocol assignments, documentation, benchmarking, multicast,
/// reserved and broadcast ranges.
pub fn is_global(ip: &Ipv4Addr) -> bool {
    let [a, b, c, d] = ip.octets();

    // 192.0.0.9 and 192.0.0.10 are globally reachable anycast assignments
    if a == 192 && b == 0 && c == 0 && (d == 9 || d == 10) {
        return true;
    }

    !(a == 0
        || ip.is_private()
        || (a == 100 && (b & 0xc0) == 64)
        || ip.is_loopback()
        || ip.is_link_local()
        || (a == 192 && b == 0 && c == 0)
        || ip.is_documentation()
        || (a == 198 && (b & 0xfe) == 18)
        || ip.is_multicast()
        || a >= 240)
}

/// Every well-formed IPv4 literal in `text`, in order of appearance
pub fn extract_ipv4_literals(text: &str) -> Vec<Ipv4Addr> {
    IPV4_LITERAL_REGEX
        .find_iter(text)
        .filter_map(|m| m.as_str().parse::<Ipv4Addr>().ok())
        .collect()
}

/// Parse a corpus line as an IPv4 address
pub fn parse_ipv4(line: &str) -> Option<Ipv4Addr> {
    line.trim().parse().ok()
}
