// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Local Session
//!
//! After a successful enterprise directory login the gate issues its own
//! RS256 token, carried in the `TOKEN` cookie.

use chrono::Utc;
use cookie::time::{Duration as CookieDuration, OffsetDateTime};
use cookie::Cookie;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use super::jwt::{decoding_key_from_pem, verify_rs256, JwtError};

pub const SESSION_COOKIE: &str = "TOKEN";

/// Claims of a locally issued session token. No custom claims.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Host the session was issued for
    pub aud: String,
    /// `upn` or `sub` of the directory user
    pub sub: String,
    pub iat: i64,
    pub exp: i64,
}

/// Key pair used to sign and verify local sessions.
#[derive(Clone)]
pub struct SessionKeys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SessionKeys {
    pub fn from_pem(private_pem: &str, public_pem: &str) -> Result<Self, JwtError> {
        let encoding = EncodingKey::from_rsa_pem(private_pem.trim().as_bytes())
            .map_err(|e| JwtError::InvalidKey(e.to_string()))?;
        let decoding = decoding_key_from_pem(public_pem)?;
        Ok(Self { encoding, decoding })
    }

    /// Sign a session for `subject` on `audience`, valid for `duration_secs`.
    pub fn issue(&self, audience: &str, subject: &str, duration_secs: u64) -> Result<String, JwtError> {
        let now = Utc::now().timestamp();
        let claims = SessionClaims {
            aud: audience.to_string(),
            sub: subject.to_string(),
            iat: now,
            exp: now.saturating_add(i64::try_from(duration_secs).unwrap_or(i64::MAX)),
        };

        encode(&Header::new(Algorithm::RS256), &claims, &self.encoding)
            .map_err(|e| JwtError::InvalidKey(e.to_string()))
    }

    pub fn verify(&self, token: &str) -> Result<SessionClaims, JwtError> {
        verify_rs256(token, &self.decoding)
    }
}

/// `Set-Cookie` value carrying a fresh session.
pub fn session_cookie(token: &str, max_age_secs: u64) -> String {
    Cookie::build((SESSION_COOKIE, token.to_string()))
        .path("/")
        .max_age(CookieDuration::seconds(i64::try_from(max_age_secs).unwrap_or(i64::MAX)))
        .http_only(true)
        .secure(true)
        .build()
        .to_string()
}

/// `Set-Cookie` value that expires any existing session.
pub fn clearing_cookie() -> String {
    Cookie::build((SESSION_COOKIE, ""))
        .path("/")
        .expires(OffsetDateTime::UNIX_EPOCH)
        .build()
        .to_string()
}
