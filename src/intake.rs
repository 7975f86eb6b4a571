//! Listing URL intake.
//!
//! Mentions arrive as free text. This module finds the listing link in them
//! and decides whether the service is willing to fetch it.

use crate::error::ScoutError;
use regex::Regex;
use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::OnceLock;
use url::Url;

const TRAILING_PUNCTUATION: &[char] = &['.', ',', ';', ':', '!', '?', ')', ']', '}', '\'', '"'];

fn url_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r#"(?i)\bhttps?://[^\s<>"]+"#).expect("static regex"))
}

/// Returns the first parseable `http(s)` link in `text`, without trailing punctuation.
pub fn extract_listing_url(text: &str) -> Option<String> {
    url_pattern().find_iter(text).find_map(|m| {
        let candidate = m.as_str().trim_end_matches(TRAILING_PUNCTUATION);
        Url::parse(candidate).ok().map(|_| candidate.to_string())
    })
}

/// Which URLs the agent agrees to fetch.
#[derive(Debug, Clone)]
pub struct UrlPolicy {
    pub allowed_schemes: HashSet<String>,
    pub block_localhost: bool,
    pub block_private_ips: bool,
    /// When non-empty only these domains (and their sub-domains) pass.
    pub allowed_domains: HashSet<String>,
    pub blocked_domains: HashSet<String>,
}

impl Default for UrlPolicy {
    fn default() -> Self {
        Self {
            allowed_schemes: ["http", "https"].iter().map(|s| s.to_string()).collect(),
            block_localhost: true,
            block_private_ips: true,
            allowed_domains: HashSet::new(),
            blocked_domains: HashSet::new(),
        }
    }
}

impl UrlPolicy {
    /// A policy that accepts any http(s) host, loopback included.
    pub fn permissive() -> Self {
        Self {
            block_localhost: false,
            block_private_ips: false,
            ..Self::default()
        }
    }

    pub fn allow_domain(mut self, domain: impl Into<String>) -> Self {
        self.allowed_domains.insert(domain.into().to_lowercase());
        self
    }

    pub fn block_domain(mut self, domain: impl Into<String>) -> Self {
        self.blocked_domains.insert(domain.into().to_lowercase());
        self
    }

    pub fn validate(&self, raw: &str) -> Result<Url, ScoutError> {
        let url = Url::parse(raw)?;

        if !self.allowed_schemes.contains(url.scheme()) {
            return Err(ScoutError::InvalidUrlScheme(url.scheme().to_string()));
        }

        let host = url
            .host_str()
            .ok_or_else(|| ScoutError::InvalidUrl(format!("no host in {raw}")))?
            .to_lowercase();

        if !self.allowed_domains.is_empty() {
            if !matches_domain(&self.allowed_domains, &host) {
                return Err(ScoutError::DomainNotAllowed(host));
            }
        } else if matches_domain(&self.blocked_domains, &host) {
            return Err(ScoutError::DomainBlocked(host));
        }

        if self.block_localhost && is_localhost(&host) {
            return Err(ScoutError::LocalhostBlocked);
        }

        if self.block_private_ips {
            let bare = host.trim_start_matches('[').trim_end_matches(']');
            if let Ok(ip) = bare.parse::<IpAddr>() {
                if is_non_public(&ip) {
                    return Err(ScoutError::PrivateIpBlocked(ip.to_string()));
                }
            }
        }

        Ok(url)
    }
}

fn matches_domain(domains: &HashSet<String>, host: &str) -> bool {
    domains
        .iter()
        .any(|d| host == d || host.ends_with(&format!(".{d}")))
}

fn is_localhost(host: &str) -> bool {
    matches!(host, "localhost" | "127.0.0.1" | "::1" | "[::1]") || host.ends_with(".localhost")
}

fn is_non_public(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => is_non_public_v4(v4),
        IpAddr::V6(v6) => {
            if let Some(mapped) = v6.to_ipv4_mapped() {
                return is_non_public_v4(&mapped);
            }
            is_non_public_v6(v6)
        }
    }
}

fn is_non_public_v4(ip: &Ipv4Addr) -> bool {
    let [a, b, ..] = ip.octets();
    ip.is_private()
        || ip.is_loopback()
        || ip.is_link_local()
        || ip.is_unspecified()
        || ip.is_broadcast()
        || a == 0
        // 100.64.0.0/10 carrier-grade NAT
        || (a == 100 && (b & 0b1100_0000) == 0b0100_0000)
        // 224.0.0.0/4 multicast and 240.0.0.0/4 reserved
        || a >= 224
}

fn is_non_public_v6(ip: &Ipv6Addr) -> bool {
    let first = ip.segments()[0];
    ip.is_loopback()
        || ip.is_unspecified()
        || ip.is_multicast()
        // fe80::/10
        || (first & 0xffc0) == 0xfe80
        // fc00::/7
        || (first & 0xfe00) == 0xfc00
}
