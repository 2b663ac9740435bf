// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Platform Upstream
//!
//! Collaborators on the content platform's own API:
//! - `KeySource`: public key that signs platform tokens, per host
//! - `WhitelistApi`: `auth/valid`, listing what a whitelist-scoped token may reach

pub mod client;

pub use client::{PlatformClient, PlatformClientConfig};

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use serde::Deserialize;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum UpstreamError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Failed to get the public key for host {host}: {reason}")]
    InvalidKey { host: String, reason: String },
}

// =============================================================================
// Collaborator traits
// =============================================================================

#[async_trait]
pub trait KeySource: Send + Sync {
    /// Public key for tokens presented on `host`.
    async fn public_key(&self, host: &str) -> Result<Arc<DecodingKey>, UpstreamError>;
}

#[async_trait]
pub trait WhitelistApi: Send + Sync {
    async fn auth_valid(&self, query: &AuthValidQuery) -> Result<AuthValidResponse, UpstreamError>;
}

// =============================================================================
// auth/valid
// =============================================================================

/// One `auth/valid` call. Tokens are forwarded as cookies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthValidQuery {
    pub host: String,
    /// Cookie the primary token travels in (`marketingToken` or `accessCode`)
    pub cookie_name: &'static str,
    pub token: String,
    /// Optional `accessToken`, forwarded so upstream caching sees the same request as the frontend
    pub access_token: Option<String>,
    pub api_version: String,
}

pub const DEFAULT_API_VERSION: &str = "api";

impl AuthValidQuery {
    pub fn cookie_header(&self) -> String {
        match &self.access_token {
            Some(access) => format!("{}={}; accessToken={}", self.cookie_name, self.token, access),
            None => format!("{}={}", self.cookie_name, self.token),
        }
    }

    pub fn path(&self) -> String {
        format!("/{}/auth/valid", self.api_version)
    }
}

/// Response of `auth/valid`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthValidResponse {
    #[serde(default)]
    pub results: Vec<WhitelistResult>,
}

/// What one whitelist-scoped grant allows.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct WhitelistResult {
    #[serde(default, rename = "loginType")]
    pub login_type: Option<String>,

    #[serde(default)]
    pub urls: Vec<String>,

    #[serde(default)]
    pub services: Vec<String>,

    #[serde(default)]
    pub events: Vec<String>,

    #[serde(default)]
    pub materials: Vec<String>,

    #[serde(default)]
    pub provider: Option<String>,
}
