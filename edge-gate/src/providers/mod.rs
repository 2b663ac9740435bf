// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Token Verifiers
//!
//! One verifier per trust source, all built the same way: resolve the host,
//! fetch the platform key for it, verify the RS256 signature, then apply the
//! provider's claim checks.
//!
//! | Verifier | Claim checks |
//! |---|---|
//! | enterprise session | trusted provider, `level >= tier` |
//! | patient session | provider expected for the cookie used |
//! | access code | `PROVIDED_ACCESS_CODE`, stack and env, whitelist |
//! | marketing | `PROVIDED_MARKETING`, `level == 1`, stack and env, whitelist |

pub mod access_code;
pub mod bot;
pub mod enterprise;
pub mod marketing;
pub mod patient;
pub mod whitelist;

pub use bot::{BotVerifier, DnsError, DnsResolver, SystemDnsResolver};
pub use patient::PatientCookie;
pub use whitelist::{comparable_path, PathStyle, WhitelistMatcher};

use std::sync::Arc;
use tracing::debug;

use crate::auth::claims::PlatformClaims;
use crate::auth::cookies::token_from_request;
use crate::auth::jwt::verify_rs256;
use crate::edge::{EdgeRequest, HOST_HEADER, SOURCE_HEADER};
use crate::error::GateError;
use crate::upstream::{KeySource, WhitelistApi};

// =============================================================================
// Verdict
// =============================================================================

/// Result of one step in a tenant's chain.
#[derive(Debug)]
pub enum Verdict {
    /// The request may proceed.
    Allowed,
    /// The step applied and rejected the request.
    Denied(GateError),
    /// The step does not apply to this request.
    TryNext,
}

impl From<Result<(), GateError>> for Verdict {
    fn from(result: Result<(), GateError>) -> Self {
        match result {
            Ok(()) => Verdict::Allowed,
            Err(e) => Verdict::Denied(e),
        }
    }
}

/// Host a token was minted for: `X-Source` first, then `Host`.
pub fn resolve_host(request: &EdgeRequest) -> Result<String, GateError> {
    request
        .headers
        .first(SOURCE_HEADER)
        .or_else(|| request.headers.first(HOST_HEADER))
        .filter(|h| !h.is_empty())
        .map(str::to_string)
        .ok_or(GateError::InvalidHost)
}

// =============================================================================
// Shared verification
// =============================================================================

/// A platform token whose signature checked out.
#[derive(Debug, Clone)]
pub struct VerifiedToken {
    pub host: String,
    pub token: String,
    pub claims: PlatformClaims,
}

/// Shared state of the platform token verifiers.
pub struct TokenVerifiers {
    environment: String,
    region: String,
    keys: Arc<dyn KeySource>,
    whitelist: Arc<dyn WhitelistApi>,
    marketing_paths: WhitelistMatcher,
    access_code_paths: WhitelistMatcher,
}

impl TokenVerifiers {
    pub fn new(
        environment: impl Into<String>,
        region: impl Into<String>,
        keys: Arc<dyn KeySource>,
        whitelist: Arc<dyn WhitelistApi>,
    ) -> Self {
        Self {
            environment: environment.into(),
            region: region.into(),
            keys,
            whitelist,
            marketing_paths: WhitelistMatcher::new(PathStyle::Rooted),
            access_code_paths: WhitelistMatcher::new(PathStyle::Relative),
        }
    }

    pub fn environment(&self) -> &str {
        &self.environment
    }

    /// Extract the token in `cookie`, then verify it against the host's key.
    pub async fn verify_cookie(
        &self,
        request: &EdgeRequest,
        cookie: &str,
    ) -> Result<VerifiedToken, GateError> {
        let token = token_from_request(request, &self.environment, cookie)?;
        let host = resolve_host(request)?;

        let key = self.keys.public_key(&host).await?;
        let claims: PlatformClaims = verify_rs256(&token, &key)?;

        debug!(
            cookie = %cookie,
            provider = ?claims.provider,
            "Platform token verified"
        );

        Ok(VerifiedToken {
            host,
            token,
            claims,
        })
    }

    /// Optional `accessToken` forwarded alongside a whitelist-scoped token.
    fn companion_access_token(&self, request: &EdgeRequest) -> Option<String> {
        token_from_request(
            request,
            &self.environment,
            crate::auth::cookies::ACCESS_TOKEN_COOKIE,
        )
        .ok()
    }

    fn check_deployment(&self, claims: &PlatformClaims) -> Result<(), GateError> {
        if claims.matches_deployment(&self.region, &self.environment) {
            Ok(())
        } else {
            Err(GateError::RegionMismatch)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge::HeaderMultiMap;

    fn request(headers: &[(&str, &str)]) -> EdgeRequest {
        EdgeRequest::new("/level-3/", "", HeaderMultiMap::from_pairs(headers.iter().copied()))
    }

    #[test]
    fn test_resolve_host_prefers_source() {
        let req = request(&[("Host", "cdn.example.org"), ("X-Source", "www.example.org")]);
        assert_eq!(resolve_host(&req).unwrap(), "www.example.org");
    }

    #[test]
    fn test_resolve_host_falls_back_to_host() {
        let req = request(&[("Host", "www.example.org")]);
        assert_eq!(resolve_host(&req).unwrap(), "www.example.org");
    }

    #[test]
    fn test_resolve_host_missing() {
        let req = request(&[]);
        assert!(matches!(resolve_host(&req), Err(GateError::InvalidHost)));
    }

    #[test]
    fn test_verdict_from_result() {
        assert!(matches!(Verdict::from(Ok(())), Verdict::Allowed));
        assert!(matches!(
            Verdict::from(Err(GateError::RegionMismatch)),
            Verdict::Denied(GateError::RegionMismatch)
        ));
    }
}
