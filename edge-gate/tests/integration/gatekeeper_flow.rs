// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! End-to-end decisions through the public gatekeeper API.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, DecodingKey, EncodingKey, Header};
use serde_json::{json, Value};
use std::net::IpAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, StatusCode, Uri},
    routing::any,
    Router,
};
use tower::ServiceExt;

use edge_gate::auth::oidc::{DiscoveryDocument, IdentityProviderApi, Jwks, OidcError, TokenResponse};
use edge_gate::auth::{EnterpriseLogin, LoginConfigCache, SessionKeys};
use edge_gate::config::{BuildInfo, Deployment, GateConfig};
use edge_gate::gate::{Dispatcher, Gatekeeper, Tenant};
use edge_gate::handlers::{edge_handler, EdgeState};
use edge_gate::metrics::Metrics;
use edge_gate::params::InMemoryParameterStore;
use edge_gate::providers::{BotVerifier, DnsError, DnsResolver, TokenVerifiers};
use edge_gate::proxy::OriginProxy;
use edge_gate::upstream::{
    AuthValidQuery, AuthValidResponse, KeySource, UpstreamError, WhitelistApi, WhitelistResult,
};
use edge_gate::{EdgeRequest, HeaderMultiMap, Outcome};

const PLATFORM_PRIVATE_PEM: &str = include_str!("../fixtures/platform_private.pem");
const PLATFORM_PUBLIC_PEM: &str = include_str!("../fixtures/platform_public.pem");
const SESSION_PRIVATE_PEM: &str = include_str!("../fixtures/session_private.pem");
const SESSION_PUBLIC_PEM: &str = include_str!("../fixtures/session_public.pem");
const IDP_PRIVATE_PEM: &str = include_str!("../fixtures/idp_private.pem");
const IDP_JWKS_JSON: &str = include_str!("../fixtures/idp_jwks.json");

const HOST: &str = "www.example.org";

// =============================================================================
// Fakes
// =============================================================================

struct Platform {
    results: Vec<WhitelistResult>,
}

#[async_trait]
impl KeySource for Platform {
    async fn public_key(&self, _host: &str) -> Result<Arc<DecodingKey>, UpstreamError> {
        Ok(Arc::new(
            DecodingKey::from_rsa_pem(PLATFORM_PUBLIC_PEM.as_bytes()).unwrap(),
        ))
    }
}

#[async_trait]
impl WhitelistApi for Platform {
    async fn auth_valid(&self, _query: &AuthValidQuery) -> Result<AuthValidResponse, UpstreamError> {
        Ok(AuthValidResponse {
            results: self.results.clone(),
        })
    }
}

struct NoDns;

#[async_trait]
impl DnsResolver for NoDns {
    async fn reverse(&self, ip: IpAddr) -> Result<Vec<String>, DnsError> {
        Err(DnsError::Lookup(ip.to_string()))
    }

    async fn forward(&self, name: &str) -> Result<Vec<IpAddr>, DnsError> {
        Err(DnsError::Lookup(name.to_string()))
    }
}

struct Directory;

#[async_trait]
impl IdentityProviderApi for Directory {
    async fn discovery_document(&self, _url: &str) -> Result<DiscoveryDocument, OidcError> {
        Ok(DiscoveryDocument {
            issuer: Some("https://login.example.com".to_string()),
            authorization_endpoint: Some("https://login.example.com/authorize".to_string()),
            token_endpoint: Some("https://login.example.com/token".to_string()),
            jwks_uri: Some("https://login.example.com/keys".to_string()),
        })
    }

    async fn jwks(&self, _jwks_uri: &str) -> Result<Jwks, OidcError> {
        serde_json::from_str(IDP_JWKS_JSON).map_err(|e| OidcError::JwksFetchError(e.to_string()))
    }

    async fn exchange_code(
        &self,
        _token_endpoint: &str,
        _form: &[(String, String)],
    ) -> Result<TokenResponse, OidcError> {
        let id_token = sign(
            &json!({
                "sub": "opaque-subject",
                "upn": "jane@corp.example",
                "exp": chrono::Utc::now().timestamp() + 600
            }),
            IDP_PRIVATE_PEM,
            Some("idp-key-1"),
        );
        Ok(TokenResponse {
            id_token,
            token_type: Some("Bearer".to_string()),
            expires_in: Some(3600),
        })
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn sign(claims: &Value, private_pem: &str, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(private_pem.as_bytes()).unwrap();
    encode(&header, claims, &key).unwrap()
}

fn platform_token(claims: Value) -> String {
    sign(&claims, PLATFORM_PRIVATE_PEM, None)
}

fn request(uri: &str, querystring: &str, cookie: Option<&str>) -> EdgeRequest {
    let mut headers = HeaderMultiMap::new();
    headers.append("Host", HOST);
    if let Some(cookie) = cookie {
        headers.append("Cookie", cookie);
    }
    EdgeRequest::new(uri, querystring, headers)
}

fn gate_config(deployment: Deployment) -> GateConfig {
    GateConfig {
        environment: "dev".to_string(),
        region: "eu".to_string(),
        tenant: Tenant::Professional,
        standardized_env: "dev".to_string(),
        googlebot_allow_level2: false,
        www_redirect: None,
        deployment,
        build: BuildInfo {
            version: "1.2.3".to_string(),
            commit: "deadbeef".to_string(),
        },
    }
}

fn dispatcher(results: Vec<WhitelistResult>) -> Dispatcher {
    let platform = Arc::new(Platform { results });
    Dispatcher::new(
        Tenant::Professional,
        TokenVerifiers::new("dev", "eu", platform.clone(), platform),
        BotVerifier::new(Arc::new(NoDns)),
        false,
    )
}

fn production_gate(results: Vec<WhitelistResult>) -> Gatekeeper {
    Gatekeeper::new(
        gate_config(Deployment::Production),
        dispatcher(results),
        None,
        Metrics::new(),
    )
}

fn non_production_gate() -> Gatekeeper {
    let registration = json!({
        "DISCOVERY_DOCUMENT": "https://login.example.com/.well-known/openid-configuration",
        "CALLBACK_PATH": "/auth/callback",
        "SESSION_DURATION": 3600,
        "AUTH_REQUEST": { "client_id": "edge-gate-client", "response_type": "code", "scope": "openid" },
        "TOKEN_REQUEST": { "client_id": "edge-gate-client", "grant_type": "authorization_code" }
    });
    let params = InMemoryParameterStore::new()
        .with("/jmc/aad/config/dev", registration.to_string())
        .with(
            "/jmc/aad/key/private",
            json!({ "PRIVATE_KEY": SESSION_PRIVATE_PEM }).to_string(),
        )
        .with(
            "/jmc/aad/key/public",
            json!({ "PUBLIC_KEY": SESSION_PUBLIC_PEM }).to_string(),
        )
        .with("/jmc/aad/bypass/secret", "bypass-secret");

    let login = EnterpriseLogin::new(
        "jmc",
        "dev",
        Arc::new(params),
        Arc::new(Directory),
        LoginConfigCache::new(),
    );

    Gatekeeper::new(
        gate_config(Deployment::NonProduction),
        dispatcher(Vec::new()),
        Some(login),
        Metrics::new(),
    )
}

fn status(outcome: &Outcome) -> Option<u16> {
    outcome.response().map(|r| r.status)
}

// =============================================================================
// Production
// =============================================================================

#[tokio::test]
async fn ungated_path_passes_with_cookies_cleared() {
    let gate = production_gate(Vec::new());
    let outcome = gate
        .handle(request("/en-us/home", "", Some("accessToken=whatever")))
        .await;

    let forwarded = outcome.request().expect("pass through");
    assert!(forwarded.cookie_headers().is_empty());
}

#[tokio::test]
async fn gated_path_without_cookies_is_401() {
    let gate = production_gate(Vec::new());
    let outcome = gate.handle(request("/level-3/", "", None)).await;

    let response = outcome.response().expect("denied");
    assert_eq!(response.status, 401);
    assert_eq!(response.status_description, "Unauthorized");
    assert!(response.body.is_none());
}

#[tokio::test]
async fn level3_token_passes_with_cookies_cleared() {
    let gate = production_gate(Vec::new());
    let token = platform_token(json!({"provider": "JANRAIN_HCP", "level": 3}));
    let cookie = format!("accessToken={}", token);

    let outcome = gate
        .handle(request("/level-3/en-us/page", "", Some(&cookie)))
        .await;

    assert!(outcome.is_pass_through());
    assert!(outcome.request().unwrap().cookie_headers().is_empty());
}

#[tokio::test]
async fn low_level_token_denied_without_marketing() {
    let gate = production_gate(Vec::new());
    let token = platform_token(json!({"provider": "JANRAIN_HCP", "level": 2}));
    let cookie = format!("accessToken={}", token);

    let outcome = gate
        .handle(request("/level-3/en-us/page", "", Some(&cookie)))
        .await;
    assert_eq!(status(&outcome), Some(401));
}

#[tokio::test]
async fn low_level_token_allowed_by_marketing_whitelist() {
    let gate = production_gate(vec![WhitelistResult {
        login_type: Some("ea-token".to_string()),
        provider: Some("PROVIDED_MARKETING".to_string()),
        urls: vec!["/campaign".to_string()],
        ..Default::default()
    }]);
    let session = platform_token(json!({"provider": "JANRAIN_HCP", "level": 2}));
    let marketing = platform_token(
        json!({"provider": "PROVIDED_MARKETING", "level": 1, "stackId": "eu", "env": "dev"}),
    );
    let cookie = format!("accessToken={}; marketingToken={}", session, marketing);

    let outcome = gate
        .handle(request("/level-3/en-us/campaign.json", "", Some(&cookie)))
        .await;
    assert!(outcome.is_pass_through());
}

#[tokio::test]
async fn info_reports_build() {
    let gate = production_gate(Vec::new());
    let outcome = gate.handle(request("/info", "", None)).await;

    let response = outcome.response().unwrap();
    assert_eq!(response.status, 200);
    let body: Value = serde_json::from_str(response.body.as_deref().unwrap()).unwrap();
    assert_eq!(body["version"], "1.2.3");
    assert_eq!(body["commit"], "deadbeef");
}

// =============================================================================
// Non-production login
// =============================================================================

#[tokio::test]
async fn callback_issues_session_that_then_validates() {
    let gate = non_production_gate();

    let outcome = gate
        .handle(request("/auth/callback", "code=abc&state=%2Fen-us", None))
        .await;
    let response = outcome.response().expect("callback answered at the edge");
    assert_eq!(response.status, 302);
    assert_eq!(response.location(), Some("/en-us"));

    let set_cookie = response.headers.first("set-cookie").unwrap();
    let session = set_cookie
        .split(';')
        .next()
        .and_then(|c| c.strip_prefix("TOKEN="))
        .unwrap()
        .to_string();

    let keys = SessionKeys::from_pem(SESSION_PRIVATE_PEM, SESSION_PUBLIC_PEM).unwrap();
    let claims = keys.verify(&session).unwrap();
    assert_eq!(claims.sub, "jane@corp.example");

    let cookie = format!("TOKEN={}", session);
    let outcome = gate.handle(request("/en-us/page", "", Some(&cookie))).await;
    assert!(outcome.is_pass_through());
}

#[tokio::test]
async fn callback_with_remote_error_is_401() {
    let gate = non_production_gate();
    let outcome = gate
        .handle(request("/auth/callback", "error=access_denied", None))
        .await;
    assert_eq!(status(&outcome), Some(401));
}

#[tokio::test]
async fn unauthenticated_html_redirects_and_assets_are_denied() {
    let gate = non_production_gate();

    let page = gate.handle(request("/en-us/page", "", None)).await;
    let response = page.response().unwrap();
    assert_eq!(response.status, 302);
    assert!(response
        .location()
        .unwrap()
        .starts_with("https://login.example.com/authorize?"));

    let asset = gate.handle(request("/static/app.js", "", None)).await;
    assert_eq!(status(&asset), Some(401));
}

#[tokio::test]
async fn blank_page_needs_no_login() {
    let gate = non_production_gate();
    let outcome = gate.handle(request("/blank", "", None)).await;

    let response = outcome.response().unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(
        response.body.as_deref(),
        Some("Welcome to the QA safe haven! Enjoy your stay!")
    );
}

#[tokio::test]
async fn bypass_cookie_skips_login() {
    let gate = non_production_gate();
    let outcome = gate
        .handle(request("/en-us/page", "", Some("testingToken=bypass-secret")))
        .await;
    assert!(outcome.is_pass_through());
}

// =============================================================================
// Edge server in front of origin
// =============================================================================

/// Requests origin received: path and cookie header.
type Seen = Arc<Mutex<Vec<(String, Option<String>)>>>;

async fn echo(State(seen): State<Seen>, uri: Uri, headers: HeaderMap) -> &'static str {
    let cookie = headers
        .get("cookie")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    seen.lock().unwrap().push((uri.path().to_string(), cookie));
    "origin"
}

async fn spawn_origin() -> (String, Seen) {
    let seen: Seen = Arc::new(Mutex::new(Vec::new()));
    let router = Router::new().fallback(any(echo)).with_state(seen.clone());
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (format!("http://{}", addr), seen)
}

fn edge_app(origin_url: String) -> Router {
    let state = EdgeState {
        gatekeeper: Arc::new(production_gate(Vec::new())),
        origin: OriginProxy::new(origin_url, Duration::from_secs(5)),
    };
    Router::new().fallback(any(edge_handler)).with_state(state)
}

async fn send(app: Router, uri: &str, cookie: Option<&str>) -> StatusCode {
    let mut builder = Request::builder().uri(uri).header("Host", HOST);
    if let Some(cookie) = cookie {
        builder = builder.header("Cookie", cookie);
    }
    app.oneshot(builder.body(Body::empty()).unwrap())
        .await
        .unwrap()
        .status()
}

#[tokio::test]
async fn edge_forwards_authorized_request_without_cookies() {
    let (origin_url, seen) = spawn_origin().await;
    let token = platform_token(json!({"provider": "JANRAIN_HCP", "level": 3}));
    let cookie = format!("accessToken={}", token);

    let status = send(edge_app(origin_url), "/level-3/secret.json", Some(&cookie)).await;

    assert_eq!(status, StatusCode::OK);
    let seen = seen.lock().unwrap();
    assert_eq!(seen.as_slice(), [("/level-3/secret.json".to_string(), None)]);
}

#[tokio::test]
async fn edge_never_forwards_non_canonical_paths() {
    let (origin_url, seen) = spawn_origin().await;
    let app = edge_app(origin_url);

    for uri in [
        "/en-us/../level-3/secret.json",
        "/en-us/%2e%2e/level-3/secret.json",
        "//level-3/secret.json",
        "/%6Cevel-3/secret.json",
        "/en-us%2F..%2Flevel-3/secret.json",
    ] {
        let status = send(app.clone(), uri, Some("accessToken=anything")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED, "{uri}");
    }

    assert!(seen.lock().unwrap().is_empty());
}

#[tokio::test]
async fn edge_forwards_canonical_ungated_path() {
    let (origin_url, seen) = spawn_origin().await;

    let status = send(edge_app(origin_url), "/en-us/home", Some("accessToken=whatever")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        seen.lock().unwrap().as_slice(),
        [("/en-us/home".to_string(), None)]
    );
}
