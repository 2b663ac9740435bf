// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! OIDC Discovery
//!
//! Identity provider collaborator for the enterprise directory login.
//!
//! Features:
//! - Discovery document fetch (endpoints are optional until the login flow needs them)
//! - JWKS fetch and JWK to `DecodingKey` conversion
//! - Authorization-code exchange over a form-encoded POST

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, error, info};

// =============================================================================
// Errors
// =============================================================================

#[derive(Debug, Error)]
pub enum OidcError {
    #[error("Failed to fetch discovery document: {0}")]
    DiscoveryFetchError(String),

    #[error("Failed to fetch JWKS: {0}")]
    JwksFetchError(String),

    #[error("Token exchange failed: {0}")]
    TokenExchangeError(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

// =============================================================================
// Discovery Document
// =============================================================================

/// OIDC discovery document. Only the fields the login flow reads.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscoveryDocument {
    #[serde(default)]
    pub issuer: Option<String>,

    #[serde(default)]
    pub authorization_endpoint: Option<String>,

    #[serde(default)]
    pub token_endpoint: Option<String>,

    /// JWKS URI for public keys
    #[serde(default)]
    pub jwks_uri: Option<String>,
}

// =============================================================================
// JWKS (JSON Web Key Set)
// =============================================================================

/// JSON Web Key Set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Jwks {
    #[serde(default)]
    pub keys: Vec<Jwk>,
}

impl Jwks {
    /// Key whose `kid` matches exactly.
    pub fn find(&self, kid: &str) -> Option<&Jwk> {
        self.keys.iter().find(|k| k.kid.as_deref() == Some(kid))
    }
}

/// JSON Web Key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Jwk {
    /// Key type (e.g., "RSA")
    pub kty: String,

    #[serde(default)]
    pub kid: Option<String>,

    #[serde(default)]
    pub alg: Option<String>,

    #[serde(rename = "use", default)]
    pub key_use: Option<String>,

    /// RSA modulus, base64url
    #[serde(default)]
    pub n: Option<String>,

    /// RSA exponent, base64url
    #[serde(default)]
    pub e: Option<String>,
}

impl Jwk {
    pub fn is_rsa(&self) -> bool {
        self.kty == "RSA"
    }

    /// Convert to jsonwebtoken DecodingKey.
    pub fn to_decoding_key(&self) -> Result<jsonwebtoken::DecodingKey, OidcError> {
        if !self.is_rsa() {
            return Err(OidcError::InvalidKey(format!(
                "Unsupported key type: {}",
                self.kty
            )));
        }

        let n = self
            .n
            .as_ref()
            .ok_or_else(|| OidcError::InvalidKey("Missing RSA modulus (n)".to_string()))?;
        let e = self
            .e
            .as_ref()
            .ok_or_else(|| OidcError::InvalidKey("Missing RSA exponent (e)".to_string()))?;

        jsonwebtoken::DecodingKey::from_rsa_components(n, e)
            .map_err(|e| OidcError::InvalidKey(format!("Invalid RSA key: {}", e)))
    }
}

// =============================================================================
// Token endpoint
// =============================================================================

/// Token endpoint response. Only the ID token is used.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    pub id_token: String,

    #[serde(default)]
    pub token_type: Option<String>,

    #[serde(default)]
    pub expires_in: Option<u64>,
}

// =============================================================================
// Identity Provider API
// =============================================================================

/// Calls made to the enterprise directory.
#[async_trait]
pub trait IdentityProviderApi: Send + Sync {
    async fn discovery_document(&self, url: &str) -> Result<DiscoveryDocument, OidcError>;

    async fn jwks(&self, jwks_uri: &str) -> Result<Jwks, OidcError>;

    /// POST the form-encoded body to the token endpoint.
    async fn exchange_code(
        &self,
        token_endpoint: &str,
        form: &[(String, String)],
    ) -> Result<TokenResponse, OidcError>;
}

/// reqwest-backed identity provider client.
pub struct HttpIdentityProvider {
    client: Client,
}

impl HttpIdentityProvider {
    pub fn new(http_timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(http_timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self { client }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        on_error: fn(String) -> OidcError,
    ) -> Result<T, OidcError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| on_error(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, url = %url, "Identity provider request failed");
            return Err(on_error(format!("HTTP {}: {}", status, body)));
        }

        response.json().await.map_err(|e| on_error(e.to_string()))
    }
}

#[async_trait]
impl IdentityProviderApi for HttpIdentityProvider {
    async fn discovery_document(&self, url: &str) -> Result<DiscoveryDocument, OidcError> {
        info!(url = %url, "Fetching discovery document");
        self.get_json(url, OidcError::DiscoveryFetchError).await
    }

    async fn jwks(&self, jwks_uri: &str) -> Result<Jwks, OidcError> {
        info!(url = %jwks_uri, "Fetching JWKS");
        let jwks: Jwks = self.get_json(jwks_uri, OidcError::JwksFetchError).await?;
        debug!(key_count = jwks.keys.len(), "JWKS fetched");
        Ok(jwks)
    }

    async fn exchange_code(
        &self,
        token_endpoint: &str,
        form: &[(String, String)],
    ) -> Result<TokenResponse, OidcError> {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(form)
            .finish();

        debug!(url = %token_endpoint, "Exchanging authorization code");

        let response = self
            .client
            .post(token_endpoint)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(body)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(status = %status, "Token exchange rejected");
            return Err(OidcError::TokenExchangeError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| OidcError::TokenExchangeError(e.to_string()))
    }
}

// =============================================================================
// Tests
// =============================================================================
