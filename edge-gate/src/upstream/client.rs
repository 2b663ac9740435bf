// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Platform API Client
//!
//! Operations:
//! - `GET /api/auth/public-key`, memoized per host (failures are not cached)
//! - `GET /<apiVersion>/auth/valid` with the tokens forwarded as cookies

use async_trait::async_trait;
use jsonwebtoken::DecodingKey;
use moka::future::Cache;
use reqwest::header::COOKIE;
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use super::{AuthValidQuery, AuthValidResponse, KeySource, UpstreamError, WhitelistApi};
use crate::auth::jwt::decoding_key_from_pem;

// =============================================================================
// Client Configuration
// =============================================================================

#[derive(Debug, Clone)]
pub struct PlatformClientConfig {
    /// URL scheme used to reach a host
    pub scheme: String,

    /// Request timeout in seconds
    pub timeout_seconds: u64,

    /// Hosts whose key is kept
    pub key_cache_capacity: u64,
}

impl Default for PlatformClientConfig {
    fn default() -> Self {
        Self {
            scheme: "https".to_string(),
            timeout_seconds: 5,
            key_cache_capacity: 64,
        }
    }
}

// =============================================================================
// Platform Client
// =============================================================================

pub struct PlatformClient {
    client: Client,
    config: PlatformClientConfig,
    keys: Cache<String, Arc<DecodingKey>>,
}

impl PlatformClient {
    pub fn new(config: PlatformClientConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()?;

        let keys = Cache::builder().max_capacity(config.key_cache_capacity).build();

        Ok(Self {
            client,
            config,
            keys,
        })
    }

    fn url(&self, host: &str, path: &str) -> String {
        format!("{}://{}{}", self.config.scheme, host, path)
    }

    async fn fetch_public_key(&self, host: &str) -> Result<DecodingKey, UpstreamError> {
        let url = self.url(host, "/api/auth/public-key");
        debug!(url = %url, "Fetching platform public key");

        let invalid = |reason: String| UpstreamError::InvalidKey {
            host: host.to_string(),
            reason,
        };

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| invalid(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            error!(status, host = %host, "Failed to call auth/public-key");
            return Err(invalid(format!("HTTP {}", status)));
        }

        let body = response.text().await.map_err(|e| invalid(e.to_string()))?;

        // The endpoint may answer with the PEM as a JSON string
        let pem = if body.trim_start().starts_with('"') {
            serde_json::from_str::<String>(&body).map_err(|e| invalid(e.to_string()))?
        } else {
            body
        };

        decoding_key_from_pem(&pem).map_err(|e| invalid(e.to_string()))
    }

    /// Drop every memoized key.
    #[cfg(test)]
    pub fn reset_keys(&self) {
        self.keys.invalidate_all();
    }
}

#[async_trait]
impl KeySource for PlatformClient {
    async fn public_key(&self, host: &str) -> Result<Arc<DecodingKey>, UpstreamError> {
        if let Some(key) = self.keys.get(host).await {
            debug!(host = %host, "Public key cache hit");
            return Ok(key);
        }

        let key = Arc::new(self.fetch_public_key(host).await?);
        self.keys.insert(host.to_string(), key.clone()).await;
        info!(host = %host, "Public key cached");

        Ok(key)
    }
}

#[async_trait]
impl WhitelistApi for PlatformClient {
    async fn auth_valid(&self, query: &AuthValidQuery) -> Result<AuthValidResponse, UpstreamError> {
        let url = self.url(&query.host, &query.path());
        debug!(url = %url, cookie = %query.cookie_name, "Calling auth/valid");

        let response = self
            .client
            .get(&url)
            .header(COOKIE, query.cookie_header())
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let message = response.text().await.unwrap_or_default();
            error!(status, "Failed to call auth/valid");
            return Err(UpstreamError::Api { status, message });
        }

        let valid: AuthValidResponse = response.json().await?;
        debug!(results = valid.results.len(), "auth/valid answered");
        Ok(valid)
    }
}

// =============================================================================
// Tests
// =============================================================================
