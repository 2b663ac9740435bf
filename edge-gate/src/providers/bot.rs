// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Bot Verifier
//!
//! Admits a declared crawler without a token when its address checks out:
//! 1. `User-Agent` mentions the crawler (cheap, checked first)
//! 2. reverse lookup of the caller IP ends in a permitted domain
//! 3. forward lookup of that name resolves back to the same IP
//!
//! Every failure answers "not verified"; nothing is raised to the caller.

use async_trait::async_trait;
use hickory_resolver::TokioAsyncResolver;
use std::net::IpAddr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

use crate::edge::EdgeRequest;
use crate::error::GateError;

pub const CRAWLER_USER_AGENT: &str = "googlebot";
pub const CRAWLER_DOMAINS: [&str; 2] = ["googlebot.com", "google.com"];
pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Error)]
pub enum DnsError {
    #[error("DNS lookup failed: {0}")]
    Lookup(String),

    #[error("Resolver configuration failed: {0}")]
    Config(String),
}

// =============================================================================
// Resolver
// =============================================================================

#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Names the address points back to (PTR records).
    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, DnsError>;

    /// Addresses a name resolves to.
    async fn forward(&self, name: &str) -> Result<Vec<IpAddr>, DnsError>;
}

/// Resolver using the host's DNS configuration.
pub struct SystemDnsResolver {
    resolver: TokioAsyncResolver,
}

impl SystemDnsResolver {
    pub fn from_system_conf() -> Result<Self, DnsError> {
        let resolver =
            TokioAsyncResolver::tokio_from_system_conf().map_err(|e| DnsError::Config(e.to_string()))?;
        Ok(Self { resolver })
    }
}

#[async_trait]
impl DnsResolver for SystemDnsResolver {
    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, DnsError> {
        let lookup = self
            .resolver
            .reverse_lookup(ip)
            .await
            .map_err(|e| DnsError::Lookup(e.to_string()))?;
        Ok(lookup.iter().map(|ptr| ptr.to_string()).collect())
    }

    async fn forward(&self, name: &str) -> Result<Vec<IpAddr>, DnsError> {
        let lookup = self
            .resolver
            .lookup_ip(name)
            .await
            .map_err(|e| DnsError::Lookup(e.to_string()))?;
        Ok(lookup.iter().collect())
    }
}

// =============================================================================
// Verifier
// =============================================================================

pub struct BotVerifier {
    resolver: Arc<dyn DnsResolver>,
    domains: &'static [&'static str],
}

impl BotVerifier {
    pub fn new(resolver: Arc<dyn DnsResolver>) -> Self {
        Self {
            resolver,
            domains: &CRAWLER_DOMAINS,
        }
    }

    /// Whether the request comes from a genuine crawler.
    pub async fn is_verified(&self, request: &EdgeRequest) -> bool {
        let declared = request
            .headers
            .first("user-agent")
            .is_some_and(|ua| ua.to_ascii_lowercase().contains(CRAWLER_USER_AGENT));
        if !declared {
            return false;
        }

        let ip = request.headers.first(FORWARDED_FOR_HEADER).unwrap_or_default();
        match self.check_source(ip).await {
            Ok(()) => {
                debug!(ip = %ip, "Crawler verified");
                true
            }
            Err(e) => {
                info!(error = %e, "Crawler not verified");
                false
            }
        }
    }

    fn domain_permitted(&self, name: &str) -> bool {
        let name = name.trim_end_matches('.').to_ascii_lowercase();
        self.domains
            .iter()
            .any(|d| name == *d || name.ends_with(&format!(".{}", d)))
    }

    async fn check_source(&self, ip: &str) -> Result<(), GateError> {
        let addr: IpAddr = ip
            .trim()
            .parse()
            .map_err(|_| GateError::ReverseDnsMismatch(format!("not a valid IP: {}", ip)))?;

        let names = self
            .resolver
            .reverse(addr)
            .await
            .map_err(|e| GateError::ReverseDnsMismatch(e.to_string()))?;

        let name = names
            .iter()
            .find(|n| self.domain_permitted(n))
            .ok_or_else(|| {
                GateError::ReverseDnsMismatch(format!(
                    "{} does not match domain {} (resolves to {})",
                    addr,
                    self.domains.join(", "),
                    names.join(", ")
                ))
            })?;

        let addresses = self
            .resolver
            .forward(name.trim_end_matches('.'))
            .await
            .map_err(|e| GateError::ReverseDnsMismatch(e.to_string()))?;

        if addresses.contains(&addr) {
            Ok(())
        } else {
            Err(GateError::ReverseDnsMismatch(format!(
                "{} does not resolve back to {}",
                name, addr
            )))
        }
    }
}
