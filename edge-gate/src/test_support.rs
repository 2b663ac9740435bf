// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Shared fixtures and fakes for unit tests.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::auth::jwt::decoding_key_from_pem;
use crate::auth::oidc::{DiscoveryDocument, IdentityProviderApi, Jwks, OidcError, TokenResponse};
use crate::auth::session::SessionKeys;
use crate::edge::{EdgeRequest, HeaderMultiMap};
use crate::params::InMemoryParameterStore;
use crate::providers::{DnsError, DnsResolver, TokenVerifiers};
use crate::upstream::{
    AuthValidQuery, AuthValidResponse, KeySource, UpstreamError, WhitelistApi, WhitelistResult,
};

pub const PLATFORM_PRIVATE_PEM: &str = include_str!("../tests/fixtures/platform_private.pem");
pub const PLATFORM_PUBLIC_PEM: &str = include_str!("../tests/fixtures/platform_public.pem");
pub const SESSION_PRIVATE_PEM: &str = include_str!("../tests/fixtures/session_private.pem");
pub const SESSION_PUBLIC_PEM: &str = include_str!("../tests/fixtures/session_public.pem");
pub const IDP_PRIVATE_PEM: &str = include_str!("../tests/fixtures/idp_private.pem");
pub const IDP_JWKS_JSON: &str = include_str!("../tests/fixtures/idp_jwks.json");

pub const TEST_HOST: &str = "www.example.org";
pub const CALLBACK_PATH: &str = "/auth/callback";
pub const BYPASS_SECRET: &str = "bypass-secret";

// =============================================================================
// Tokens and keys
// =============================================================================

fn sign(claims: &Value, private_pem: &str, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

/// Platform token without `exp`.
pub fn platform_token(claims: Value) -> String {
    sign(&claims, PLATFORM_PRIVATE_PEM, None)
}

/// Platform token expiring `offset_secs` from now.
pub fn platform_token_with_exp(mut claims: Value, offset_secs: i64) -> String {
    claims["exp"] = json!(chrono::Utc::now().timestamp() + offset_secs);
    platform_token(claims)
}

pub fn platform_decoding_key() -> DecodingKey {
    decoding_key_from_pem(PLATFORM_PUBLIC_PEM).unwrap()
}

pub fn session_decoding_key() -> DecodingKey {
    decoding_key_from_pem(SESSION_PUBLIC_PEM).unwrap()
}

pub fn session_keys() -> SessionKeys {
    SessionKeys::from_pem(SESSION_PRIVATE_PEM, SESSION_PUBLIC_PEM).unwrap()
}

/// ID token signed by the fake directory.
pub fn idp_token(claims: Value, kid: &str) -> String {
    sign(&claims, IDP_PRIVATE_PEM, Some(kid))
}

// =============================================================================
// Requests
// =============================================================================

pub struct RequestBuilder {
    uri: String,
    querystring: String,
    headers: HeaderMultiMap,
}

impl RequestBuilder {
    pub fn new(uri: &str) -> Self {
        let mut headers = HeaderMultiMap::new();
        headers.append("Host", TEST_HOST);
        Self {
            uri: uri.to_string(),
            querystring: String::new(),
            headers,
        }
    }

    pub fn cookie(mut self, value: &str) -> Self {
        self.headers.append("Cookie", value);
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn without_host(mut self) -> Self {
        self.headers.remove("host");
        self
    }

    pub fn query(mut self, querystring: &str) -> Self {
        self.querystring = querystring.to_string();
        self
    }

    pub fn build(self) -> EdgeRequest {
        EdgeRequest::new(self.uri, self.querystring, self.headers)
    }
}

// =============================================================================
// Platform
// =============================================================================

/// In-memory platform API: signs with the fixture key, answers `auth/valid`
/// with canned results and records the last query.
#[derive(Clone, Default)]
pub struct FakePlatform {
    results: Vec<WhitelistResult>,
    key_missing: bool,
    whitelist_fails: bool,
    last_query: Arc<Mutex<Option<AuthValidQuery>>>,
}

impl FakePlatform {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn token(&self, claims: Value) -> String {
        platform_token(claims)
    }

    pub fn with_results(mut self, results: Vec<WhitelistResult>) -> Self {
        self.results = results;
        self
    }

    pub fn without_key(mut self) -> Self {
        self.key_missing = true;
        self
    }

    pub fn with_whitelist_failure(mut self) -> Self {
        self.whitelist_fails = true;
        self
    }

    pub fn last_query(&self) -> Option<AuthValidQuery> {
        self.last_query.lock().unwrap().clone()
    }
}

#[async_trait]
impl KeySource for FakePlatform {
    async fn public_key(&self, host: &str) -> Result<Arc<DecodingKey>, UpstreamError> {
        if self.key_missing {
            return Err(UpstreamError::InvalidKey {
                host: host.to_string(),
                reason: "HTTP 503".to_string(),
            });
        }
        Ok(Arc::new(platform_decoding_key()))
    }
}

#[async_trait]
impl WhitelistApi for FakePlatform {
    async fn auth_valid(&self, query: &AuthValidQuery) -> Result<AuthValidResponse, UpstreamError> {
        *self.last_query.lock().unwrap() = Some(query.clone());
        if self.whitelist_fails {
            return Err(UpstreamError::Api {
                status: 500,
                message: "auth/valid unavailable".to_string(),
            });
        }
        Ok(AuthValidResponse {
            results: self.results.clone(),
        })
    }
}

/// Verifiers deployed in `dev` on the `eu` stack.
pub fn verifiers(platform: &FakePlatform) -> TokenVerifiers {
    TokenVerifiers::new(
        "dev",
        "eu",
        Arc::new(platform.clone()),
        Arc::new(platform.clone()),
    )
}

// =============================================================================
// DNS
// =============================================================================

#[derive(Default)]
pub struct FakeDns {
    ptr: HashMap<IpAddr, Vec<String>>,
    a: HashMap<String, Vec<IpAddr>>,
    lookups: AtomicUsize,
}

impl FakeDns {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ptr(mut self, ip: &str, name: &str) -> Self {
        self.ptr
            .entry(ip.parse().unwrap())
            .or_default()
            .push(name.to_string());
        self
    }

    pub fn with_a(mut self, name: &str, ip: &str) -> Self {
        self.a
            .entry(name.to_string())
            .or_default()
            .push(ip.parse().unwrap());
        self
    }

    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DnsResolver for FakeDns {
    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, DnsError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.ptr
            .get(&ip)
            .cloned()
            .ok_or_else(|| DnsError::Lookup(format!("no PTR for {}", ip)))
    }

    async fn forward(&self, name: &str) -> Result<Vec<IpAddr>, DnsError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        self.a
            .get(name)
            .cloned()
            .ok_or_else(|| DnsError::Lookup(format!("no A record for {}", name)))
    }
}

// =============================================================================
// Enterprise directory
// =============================================================================

/// Parameters of a `jmc` tenant deployed in `dev`.
pub fn login_params() -> InMemoryParameterStore {
    let registration = json!({
        "DISCOVERY_DOCUMENT": "https://login.example.com/.well-known/openid-configuration",
        "CALLBACK_PATH": CALLBACK_PATH,
        "SESSION_DURATION": 3600,
        "AUTH_REQUEST": {
            "client_id": "edge-gate-client",
            "response_type": "code",
            "scope": "openid"
        },
        "TOKEN_REQUEST": {
            "client_id": "edge-gate-client",
            "client_secret": "s3cret",
            "grant_type": "authorization_code"
        }
    });

    InMemoryParameterStore::new()
        .with("/jmc/aad/config/dev", registration.to_string())
        .with(
            "/jmc/aad/key/private",
            json!({ "PRIVATE_KEY": SESSION_PRIVATE_PEM }).to_string(),
        )
        .with(
            "/jmc/aad/key/public",
            json!({ "PUBLIC_KEY": SESSION_PUBLIC_PEM }).to_string(),
        )
        .with("/jmc/aad/bypass/secret", BYPASS_SECRET)
}

/// Directory whose token endpoint hands out one fixed ID token.
pub struct FakeIdentityProvider {
    id_token: String,
    jwks_uri: Option<String>,
    discovery_calls: AtomicUsize,
    discovery_down: AtomicBool,
    last_form: Mutex<Option<Vec<(String, String)>>>,
}

impl FakeIdentityProvider {
    pub fn new() -> Self {
        let id_token = idp_token(
            json!({
                "sub": "opaque-subject",
                "upn": "jane@corp.example",
                "exp": chrono::Utc::now().timestamp() + 600
            }),
            "idp-key-1",
        );
        Self {
            id_token,
            jwks_uri: Some("https://login.example.com/keys".to_string()),
            discovery_calls: AtomicUsize::new(0),
            discovery_down: AtomicBool::new(false),
            last_form: Mutex::new(None),
        }
    }

    pub fn with_id_token(mut self, id_token: String) -> Self {
        self.id_token = id_token;
        self
    }

    pub fn without_jwks_uri(mut self) -> Self {
        self.jwks_uri = None;
        self
    }

    /// Make the discovery endpoint fail until `restore_discovery`.
    pub fn with_discovery_down(self) -> Self {
        self.discovery_down.store(true, Ordering::SeqCst);
        self
    }

    pub fn restore_discovery(&self) {
        self.discovery_down.store(false, Ordering::SeqCst);
    }

    pub fn discovery_calls(&self) -> usize {
        self.discovery_calls.load(Ordering::SeqCst)
    }

    pub fn last_form(&self) -> Option<Vec<(String, String)>> {
        self.last_form.lock().unwrap().clone()
    }
}

#[async_trait]
impl IdentityProviderApi for FakeIdentityProvider {
    async fn discovery_document(&self, _url: &str) -> Result<DiscoveryDocument, OidcError> {
        self.discovery_calls.fetch_add(1, Ordering::SeqCst);
        if self.discovery_down.load(Ordering::SeqCst) {
            return Err(OidcError::DiscoveryFetchError("503 Service Unavailable".to_string()));
        }
        Ok(DiscoveryDocument {
            issuer: Some("https://login.example.com".to_string()),
            authorization_endpoint: Some("https://login.example.com/authorize".to_string()),
            token_endpoint: Some("https://login.example.com/token".to_string()),
            jwks_uri: self.jwks_uri.clone(),
        })
    }

    async fn jwks(&self, _jwks_uri: &str) -> Result<Jwks, OidcError> {
        serde_json::from_str(IDP_JWKS_JSON).map_err(|e| OidcError::JwksFetchError(e.to_string()))
    }

    async fn exchange_code(
        &self,
        _token_endpoint: &str,
        form: &[(String, String)],
    ) -> Result<TokenResponse, OidcError> {
        *self.last_form.lock().unwrap() = Some(form.to_vec());
        Ok(TokenResponse {
            id_token: self.id_token.clone(),
            token_type: Some("Bearer".to_string()),
            expires_in: Some(3600),
        })
    }
}
