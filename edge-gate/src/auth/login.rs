// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Enterprise Directory Login
//!
//! Interactive authorization-code login in front of non-production
//! deployments. Per request, first match wins:
//!
//! 1. bypass cookie equals the bypass secret: pass through
//! 2. path is the callback path: exchange the code, issue a local session
//! 3. a local session cookie exists: pass through if valid, re-login if expired
//! 4. otherwise: redirect to the directory's authorization endpoint
//!
//! Discovery document, JWKS, app registration, session keys and bypass secret
//! are loaded once into [`LoginConfigCache`] and never mutated afterwards.

use moka::future::Cache;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::claims::IdTokenClaims;
use super::cookies::CookieJar;
use super::jwt::{key_id, verify_rs256, JwtError};
use super::oidc::{DiscoveryDocument, IdentityProviderApi, Jwks};
use super::session::{clearing_cookie, session_cookie, SessionKeys, SESSION_COOKIE};
use crate::edge::{EdgeRequest, EdgeResponse, Outcome};
use crate::error::GateError;
use crate::params::{get_json, ParameterStore};

/// Cookie automated tests use to skip the login.
pub const BYPASS_COOKIE: &str = "testingToken";

// =============================================================================
// Configuration
// =============================================================================

/// App registration stored at `/<prefix>/aad/config/<env>`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppRegistration {
    /// URL of the directory's discovery document
    pub discovery_document: String,

    /// Path the directory redirects back to
    pub callback_path: String,

    /// Local session lifetime in seconds
    pub session_duration: u64,

    /// Extra query parameters of the authorization redirect (client_id, scope...)
    #[serde(default)]
    pub auth_request: BTreeMap<String, String>,

    /// Extra form fields of the token exchange (client_id, client_secret, grant_type...)
    #[serde(default)]
    pub token_request: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct PrivateKeyParam {
    #[serde(rename = "PRIVATE_KEY")]
    private_key: String,
}

#[derive(Deserialize)]
struct PublicKeyParam {
    #[serde(rename = "PUBLIC_KEY")]
    public_key: String,
}

/// Everything the login flow needs, loaded as one unit.
pub struct EnterpriseLoginConfig {
    pub registration: AppRegistration,
    pub authorization_endpoint: String,
    pub token_endpoint: String,
    pub jwks: Jwks,
    pub session_keys: SessionKeys,
    pub bypass_secret: String,
}

/// Parameter names for a tenant prefix.
pub fn parameter_names(prefix: &str, standardized_env: &str) -> [String; 4] {
    [
        format!("/{}/aad/config/{}", prefix, standardized_env),
        format!("/{}/aad/key/private", prefix),
        format!("/{}/aad/key/public", prefix),
        format!("/{}/aad/bypass/secret", prefix),
    ]
}

// =============================================================================
// Config Cache
// =============================================================================

/// Process-wide holder of the loaded login configuration.
///
/// Concurrent first loads may both fetch; the last insert wins and both
/// values are equivalent.
#[derive(Clone)]
pub struct LoginConfigCache {
    entries: Cache<String, Arc<EnterpriseLoginConfig>>,
}

impl Default for LoginConfigCache {
    fn default() -> Self {
        Self {
            entries: Cache::builder().max_capacity(4).build(),
        }
    }
}

impl LoginConfigCache {
    pub fn new() -> Self {
        Self::default()
    }

    async fn get(&self, key: &str) -> Option<Arc<EnterpriseLoginConfig>> {
        self.entries.get(key).await
    }

    async fn insert(&self, key: String, config: Arc<EnterpriseLoginConfig>) {
        self.entries.insert(key, config).await;
    }

    /// Forget the loaded configuration.
    #[cfg(test)]
    pub fn reset(&self) {
        self.entries.invalidate_all();
    }
}

// =============================================================================
// State machine
// =============================================================================

/// Where a request stands in the login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Unauthenticated,
    /// Callback handled, local session issued
    SessionIssued,
    Authenticated,
    Expired,
    Bypassed,
}

#[derive(Debug)]
pub struct LoginDecision {
    pub state: LoginState,
    pub outcome: Outcome,
}

impl LoginDecision {
    /// Whether the caller must answer with the produced response.
    pub fn requires_action(&self) -> bool {
        !self.outcome.is_pass_through()
    }
}

pub struct EnterpriseLogin {
    prefix: String,
    standardized_env: String,
    params: Arc<dyn ParameterStore>,
    idp: Arc<dyn IdentityProviderApi>,
    cache: LoginConfigCache,
}

impl EnterpriseLogin {
    pub fn new(
        prefix: impl Into<String>,
        standardized_env: impl Into<String>,
        params: Arc<dyn ParameterStore>,
        idp: Arc<dyn IdentityProviderApi>,
        cache: LoginConfigCache,
    ) -> Self {
        Self {
            prefix: prefix.into(),
            standardized_env: standardized_env.into(),
            params,
            idp,
            cache,
        }
    }

    pub fn cache(&self) -> &LoginConfigCache {
        &self.cache
    }

    fn cache_key(&self) -> String {
        format!("{}/{}", self.prefix, self.standardized_env)
    }

    /// Whether the login configuration is cached.
    pub async fn is_loaded(&self) -> bool {
        self.cache.get(&self.cache_key()).await.is_some()
    }

    /// Load the login configuration, once.
    pub async fn preload(&self) -> Result<Arc<EnterpriseLoginConfig>, GateError> {
        let key = self.cache_key();
        if let Some(config) = self.cache.get(&key).await {
            return Ok(config);
        }

        info!(prefix = %self.prefix, env = %self.standardized_env, "Loading enterprise login configuration");

        let [config_name, private_name, public_name, bypass_name] =
            parameter_names(&self.prefix, &self.standardized_env);
        let params = self.params.as_ref();

        let registration: AppRegistration = get_json(params, &config_name).await?;
        let private: PrivateKeyParam = get_json(params, &private_name).await?;
        let public: PublicKeyParam = get_json(params, &public_name).await?;
        let bypass_secret = params.get_parameter(&bypass_name).await?;

        let discovery = self.idp.discovery_document(&registration.discovery_document).await?;
        let DiscoveryDocument {
            authorization_endpoint,
            token_endpoint,
            jwks_uri,
            ..
        } = discovery;
        let jwks_uri = jwks_uri.ok_or(GateError::DiscoveryDocumentMissing("jwks_uri"))?;
        let authorization_endpoint = authorization_endpoint
            .ok_or(GateError::DiscoveryDocumentMissing("authorization_endpoint"))?;
        let token_endpoint =
            token_endpoint.ok_or(GateError::DiscoveryDocumentMissing("token_endpoint"))?;

        let jwks = self.idp.jwks(&jwks_uri).await?;

        let session_keys = SessionKeys::from_pem(&private.private_key, &public.public_key)
            .map_err(|e| GateError::Session(e.to_string()))?;

        let config = Arc::new(EnterpriseLoginConfig {
            registration,
            authorization_endpoint,
            token_endpoint,
            jwks,
            session_keys,
            bypass_secret: bypass_secret.trim().to_string(),
        });
        self.cache.insert(key, config.clone()).await;

        info!(keys = config.jwks.keys.len(), "Enterprise login configuration cached");
        Ok(config)
    }

    /// Run the login state machine for one request.
    pub async fn authenticate(&self, request: &EdgeRequest) -> Result<LoginDecision, GateError> {
        let config = self.preload().await?;
        let jar = CookieJar::from_request(request);

        if is_bypass(&jar, &config.bypass_secret) {
            info!(uri = %request.uri, "Got a bypass for request");
            return Ok(pass(LoginState::Bypassed, request));
        }

        if request.uri == config.registration.callback_path {
            debug!("Handling auth callback");
            return self.handle_callback(&config, request).await;
        }

        if let Some(token) = jar.first(SESSION_COOKIE) {
            debug!("Validating local session");
            return match config.session_keys.verify(token) {
                Ok(_) => Ok(pass(LoginState::Authenticated, request)),
                Err(JwtError::Expired) => {
                    debug!("Session expired, redirecting to OIDC provider");
                    login_redirect(&config, request, LoginState::Expired)
                }
                Err(e) => Err(e.into()),
            };
        }

        debug!("Redirecting the user to login");
        login_redirect(&config, request, LoginState::Unauthenticated)
    }

    async fn handle_callback(
        &self,
        config: &EnterpriseLoginConfig,
        request: &EdgeRequest,
    ) -> Result<LoginDecision, GateError> {
        let query = QueryParams::parse(&request.querystring);

        if let Some(error) = query.get("error") {
            warn!(error = %error, "Identity provider returned an error");
            return Err(GateError::RemoteAuthError(error.to_string()));
        }
        let code = query.get("code").ok_or(GateError::MissingCode)?;
        let host = request.host().ok_or(GateError::InvalidHost)?;

        let mut form: Vec<(String, String)> = config
            .registration
            .token_request
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        form.push(("redirect_uri".to_string(), redirect_uri(config, host)));
        form.push(("code".to_string(), code.to_string()));

        let exchanged = self.idp.exchange_code(&config.token_endpoint, &form).await?;
        let id_token = exchanged.id_token;

        let kid = key_id(&id_token)?;
        let jwk = config.jwks.find(&kid).ok_or(JwtError::KeyNotFound(kid))?;
        let key = jwk
            .to_decoding_key()
            .map_err(|e| GateError::SignatureInvalid(e.to_string()))?;

        let claims: IdTokenClaims = match verify_rs256(&id_token, &key) {
            Ok(claims) => claims,
            Err(JwtError::Expired) => {
                debug!("ID token expired, redirecting to OIDC provider");
                return login_redirect(config, request, LoginState::Expired);
            }
            Err(e) => return Err(e.into()),
        };

        let subject = claims
            .subject()
            .ok_or_else(|| GateError::Session("ID token carries neither upn nor sub".to_string()))?;

        let duration = config.registration.session_duration;
        let session = config
            .session_keys
            .issue(host, subject, duration)
            .map_err(|e| GateError::Session(e.to_string()))?;

        let location = query
            .get("state")
            .filter(|state| !state.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("https://{}", host));

        info!("ID token retrieved, local session issued");

        let response = EdgeResponse::redirect(302, location, "Found")
            .with_header("Set-Cookie", session_cookie(&session, duration))
            .with_body("ID token retrieved.");

        Ok(LoginDecision {
            state: LoginState::SessionIssued,
            outcome: Outcome::Respond(response),
        })
    }
}

fn is_bypass(jar: &CookieJar, secret: &str) -> bool {
    match jar.first(BYPASS_COOKIE) {
        Some(value) if !secret.is_empty() && value == secret => true,
        Some(_) => {
            info!("Bypass failed, invalid secret");
            false
        }
        None => false,
    }
}

fn pass(state: LoginState, request: &EdgeRequest) -> LoginDecision {
    LoginDecision {
        state,
        outcome: Outcome::PassThrough(request.clone()),
    }
}

fn redirect_uri(config: &EnterpriseLoginConfig, host: &str) -> String {
    format!("https://{}{}", host, config.registration.callback_path)
}

/// Send the user to the authorization endpoint, dropping any stale session.
fn login_redirect(
    config: &EnterpriseLoginConfig,
    request: &EdgeRequest,
    state: LoginState,
) -> Result<LoginDecision, GateError> {
    let host = request.host().ok_or(GateError::InvalidHost)?;

    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(&config.registration.auth_request)
        .append_pair("redirect_uri", &redirect_uri(config, host))
        .append_pair("state", &request.uri)
        .finish();

    let response = EdgeResponse::redirect(
        302,
        format!("{}?{}", config.authorization_endpoint, query),
        "Found",
    )
    .with_header("Set-Cookie", clearing_cookie())
    .with_body("Redirecting to OIDC provider");

    Ok(LoginDecision {
        state,
        outcome: Outcome::Respond(response),
    })
}

/// Decoded query string; the first occurrence of a key wins.
struct QueryParams(Vec<(String, String)>);

impl QueryParams {
    fn parse(querystring: &str) -> Self {
        Self(
            url::form_urlencoded::parse(querystring.as_bytes())
                .map(|(k, v)| (k.into_owned(), v.into_owned()))
                .collect(),
        )
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.0.iter().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }
}

// =============================================================================
// Tests
// =============================================================================
