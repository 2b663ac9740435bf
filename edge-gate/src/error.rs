// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Gate Errors
//!
//! Every failure a verifier, the login flow or a collaborator can raise while
//! deciding on a request. The outer handler turns any of them into a flat 401;
//! the variant only matters for fallback routing, logging and metrics.

use thiserror::Error;

use crate::auth::jwt::JwtError;
use crate::auth::oidc::OidcError;
use crate::params::ParameterError;
use crate::upstream::UpstreamError;

#[derive(Debug, Error)]
pub enum GateError {
    #[error("token not found in cookie '{cookie}'")]
    TokenNotFound { cookie: String },

    #[error("invalid host: neither X-Source nor Host header present")]
    InvalidHost,

    #[error("provider '{provider}' is not trusted here")]
    UntrustedProvider { provider: String },

    #[error("invalid level: {0}")]
    InvalidLevel(String),

    #[error("token stack/environment does not match this deployment")]
    RegionMismatch,

    #[error("unsupported extension for '{uri}', expected .json")]
    UnsupportedExtension { uri: String },

    #[error("token is not allowed to visit '{path}'")]
    NotAllowedForPath { path: String },

    #[error("discovery document is missing '{0}'")]
    DiscoveryDocumentMissing(&'static str),

    #[error("identity provider returned an error: {0}")]
    RemoteAuthError(String),

    #[error("no code found in callback")]
    MissingCode,

    #[error("signature invalid: {0}")]
    SignatureInvalid(String),

    #[error("signature expired")]
    SignatureExpired,

    #[error("reverse DNS mismatch: {0}")]
    ReverseDnsMismatch(String),

    #[error("invalid uri: {0}")]
    InvalidUri(String),

    #[error("'{0}' is not an HTML page")]
    NotHtml(String),

    #[error("session issuance failed: {0}")]
    Session(String),

    #[error("upstream call failed: {0}")]
    Upstream(#[from] UpstreamError),

    #[error("identity provider call failed: {0}")]
    IdentityProvider(#[from] OidcError),

    #[error("parameter store: {0}")]
    Parameters(#[from] ParameterError),
}

impl From<JwtError> for GateError {
    fn from(err: JwtError) -> Self {
        match err {
            JwtError::Expired => GateError::SignatureExpired,
            other => GateError::SignatureInvalid(other.to_string()),
        }
    }
}

impl GateError {
    /// Short stable label, used as a metrics dimension.
    pub fn reason(&self) -> &'static str {
        match self {
            GateError::TokenNotFound { .. } => "token_not_found",
            GateError::InvalidHost => "invalid_host",
            GateError::UntrustedProvider { .. } => "untrusted_provider",
            GateError::InvalidLevel(_) => "invalid_level",
            GateError::RegionMismatch => "region_mismatch",
            GateError::UnsupportedExtension { .. } => "unsupported_extension",
            GateError::NotAllowedForPath { .. } => "not_allowed_for_path",
            GateError::DiscoveryDocumentMissing(_) => "discovery_document_missing",
            GateError::RemoteAuthError(_) => "remote_auth_error",
            GateError::MissingCode => "missing_code",
            GateError::SignatureInvalid(_) => "signature_invalid",
            GateError::SignatureExpired => "signature_expired",
            GateError::ReverseDnsMismatch(_) => "reverse_dns_mismatch",
            GateError::InvalidUri(_) => "invalid_uri",
            GateError::NotHtml(_) => "not_html",
            GateError::Session(_) => "session",
            GateError::Upstream(_) => "upstream",
            GateError::IdentityProvider(_) => "identity_provider",
            GateError::Parameters(_) => "parameters",
        }
    }

    pub(crate) fn token_not_found(cookie: &str) -> Self {
        GateError::TokenNotFound {
            cookie: cookie.to_string(),
        }
    }
}
