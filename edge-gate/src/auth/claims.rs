// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Token Claims
//!
//! Two distinct views of a token payload:
//! - `ProviderHint`: read WITHOUT signature verification, only used to pick a verifier
//! - `PlatformClaims`: produced by a verifier after the signature checked out
//!
//! Nothing that authorizes a request may accept a `ProviderHint`.

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Provider
// =============================================================================

/// Trust source that issued a platform token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Provider {
    JanrainHcp,
    JanrainPatient,
    ProvidedAnonymous,
    ProvidedMarketing,
    ProvidedAccessCode,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::JanrainHcp,
        Provider::JanrainPatient,
        Provider::ProvidedAnonymous,
        Provider::ProvidedMarketing,
        Provider::ProvidedAccessCode,
    ];

    /// Parse the `provider` claim value. Exact match, the claim is case-sensitive.
    pub fn from_claim(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == value)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::JanrainHcp => "JANRAIN_HCP",
            Provider::JanrainPatient => "JANRAIN_PATIENT",
            Provider::ProvidedAnonymous => "PROVIDED_ANONYMOUS",
            Provider::ProvidedMarketing => "PROVIDED_MARKETING",
            Provider::ProvidedAccessCode => "PROVIDED_ACCESS_CODE",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Verified claims
// =============================================================================

/// Claims of a platform token whose RS256 signature has been verified.
///
/// Shape varies by provider, so every claim is optional here and each verifier
/// enforces the ones it needs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PlatformClaims {
    #[serde(default)]
    pub provider: Option<String>,

    /// Tier granted by enterprise-session and marketing tokens
    #[serde(default)]
    pub level: Option<i64>,

    /// Deployment stack the token was minted for
    #[serde(default, rename = "stackId")]
    pub stack_id: Option<String>,

    #[serde(default)]
    pub env: Option<String>,

    /// Opaque correlation id of a whitelist-scoped token
    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub exp: Option<i64>,

    #[serde(default)]
    pub iat: Option<i64>,
}

impl PlatformClaims {
    /// Parsed `provider` claim; `None` when absent or unknown.
    pub fn provider(&self) -> Option<Provider> {
        self.provider.as_deref().and_then(Provider::from_claim)
    }

    /// Whether `stackId` and `env` both match this deployment.
    pub fn matches_deployment(&self, region: &str, environment: &str) -> bool {
        self.stack_id.as_deref() == Some(region) && self.env.as_deref() == Some(environment)
    }
}

// =============================================================================
// Unverified hint
// =============================================================================

/// Provider name read from an unverified token payload.
///
/// Only useful to route the request to a verifier; the verifier re-checks it.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ProviderHint {
    #[serde(default)]
    provider: Option<String>,
}

impl ProviderHint {
    pub fn provider(&self) -> Option<Provider> {
        self.provider.as_deref().and_then(Provider::from_claim)
    }
}

// =============================================================================
// Identity provider token
// =============================================================================

/// Claims read from the enterprise directory ID token.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct IdTokenClaims {
    #[serde(default)]
    pub sub: Option<String>,

    /// User principal name, preferred over `sub` when present
    #[serde(default)]
    pub upn: Option<String>,

    #[serde(default)]
    pub exp: Option<i64>,
}

impl IdTokenClaims {
    pub fn subject(&self) -> Option<&str> {
        self.upn.as_deref().or(self.sub.as_deref())
    }
}
