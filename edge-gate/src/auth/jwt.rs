// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! JWT Validation
//!
//! RS256 verification shared by every verifier and the login flow, plus the
//! unverified payload read used for provider routing.
//!
//! Features:
//! - RS256 only, no leeway, audience not checked
//! - Expiry reported as its own error so the login flow can redirect on it
//! - `sniff_provider` never touches the signature

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use thiserror::Error;
use tracing::debug;

use super::claims::ProviderHint;

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Token expired")]
    Expired,

    #[error("Invalid signature")]
    InvalidSignature,

    #[error("Unsupported algorithm: {0}. Only RS256 is supported.")]
    UnsupportedAlgorithm(String),

    #[error("Token decode error: {0}")]
    DecodeError(String),

    #[error("Token header has no kid")]
    MissingKid,

    #[error("Key not found for kid: {0}")]
    KeyNotFound(String),

    #[error("Invalid key material: {0}")]
    InvalidKey(String),

    #[error("Token is empty")]
    EmptyToken,
}

impl From<jsonwebtoken::errors::Error> for JwtError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            ErrorKind::InvalidSignature => JwtError::InvalidSignature,
            ErrorKind::InvalidAlgorithm => JwtError::UnsupportedAlgorithm(e.to_string()),
            _ => JwtError::DecodeError(e.to_string()),
        }
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Validation rules for every token this service accepts.
fn rs256_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.leeway = 0;
    validation.validate_aud = false;
    // Platform tokens do not always carry exp; expiry is still enforced when present.
    validation.required_spec_claims = HashSet::new();
    validation
}

/// Verify an RS256 token and deserialize its claims.
///
/// Surrounding whitespace is ignored.
pub fn verify_rs256<T: DeserializeOwned>(token: &str, key: &DecodingKey) -> Result<T, JwtError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(JwtError::EmptyToken);
    }

    let data = decode::<T>(token, key, &rs256_validation())?;
    debug!("JWT signature verified");
    Ok(data.claims)
}

/// Key id from the token header.
pub fn key_id(token: &str) -> Result<String, JwtError> {
    let header = decode_header(token.trim())
        .map_err(|e| JwtError::DecodeError(format!("Invalid token header: {}", e)))?;

    if header.alg != Algorithm::RS256 {
        return Err(JwtError::UnsupportedAlgorithm(format!("{:?}", header.alg)));
    }

    header.kid.ok_or(JwtError::MissingKid)
}

/// Parse a PEM encoded RSA public key.
pub fn decoding_key_from_pem(pem: &str) -> Result<DecodingKey, JwtError> {
    DecodingKey::from_rsa_pem(pem.trim().as_bytes()).map_err(|e| JwtError::InvalidKey(e.to_string()))
}

// =============================================================================
// Unverified read
// =============================================================================

/// Read the `provider` claim without checking the signature.
///
/// Returns `None` for anything that is not a three-part token with a JSON
/// payload. Routing only, never authorization.
pub fn sniff_provider(token: &str) -> Option<ProviderHint> {
    let mut parts = token.trim().split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    serde_json::from_slice(&bytes).ok()
}

// =============================================================================
// Tests
// =============================================================================
