// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Cookie Token Extraction
//!
//! Several deployments share a cookie domain, so one cookie name can arrive
//! several times, each value optionally scoped as `<env>---<token>`.
//!
//! Resolution for a cookie name:
//! 1. map the runtime environment through [`ENVIRONMENT_ALIASES`]
//! 2. take the first value scoped to that environment, prefix stripped
//! 3. otherwise take the first unscoped value
//! 4. otherwise `TokenNotFound`

use cookie::Cookie;
use tracing::debug;

use crate::edge::EdgeRequest;
use crate::error::GateError;

pub const ACCESS_TOKEN_COOKIE: &str = "accessToken";
pub const MARKETING_TOKEN_COOKIE: &str = "marketingToken";
pub const ACCESS_CODE_COOKIE: &str = "accessCode";

/// Separator between an environment scope and the token.
pub const SCOPE_SEPARATOR: &str = "---";

/// Runtime environments whose cookies are scoped under another name.
///
/// Any environment missing from this table scopes its cookies under its own name.
pub const ENVIRONMENT_ALIASES: &[(&str, &str)] = &[
    ("live", "prod"),
    ("review", "prod"),
    ("local-uat", "uat"),
    ("preview", "uat"),
];

/// Cookie scope used by a runtime environment.
pub fn cookie_scope(environment: &str) -> &str {
    ENVIRONMENT_ALIASES
        .iter()
        .find(|(from, _)| *from == environment)
        .map(|(_, to)| *to)
        .unwrap_or(environment)
}

// =============================================================================
// Cookie Jar
// =============================================================================

/// Cookies of one request, grouped by lower-cased name in encounter order.
#[derive(Debug, Clone, Default)]
pub struct CookieJar {
    entries: Vec<(String, Vec<String>)>,
}

impl CookieJar {
    /// Parse raw `Cookie` header values. Fragments that are not `name=value` are skipped.
    pub fn parse<'a>(headers: impl IntoIterator<Item = &'a str>) -> Self {
        let mut jar = Self::default();

        for header in headers {
            for fragment in header.split(';') {
                let Ok(cookie) = Cookie::parse_encoded(fragment.trim()) else {
                    continue;
                };
                jar.push(cookie.name(), cookie.value());
            }
        }

        jar
    }

    pub fn from_request(request: &EdgeRequest) -> Self {
        Self::parse(request.cookie_headers().iter().map(String::as_str))
    }

    fn push(&mut self, name: &str, value: &str) {
        let key = name.to_ascii_lowercase();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some((_, values)) => values.push(value.to_string()),
            None => self.entries.push((key, vec![value.to_string()])),
        }
    }

    /// Every value for `name` (case-insensitive), in encounter order.
    pub fn values(&self, name: &str) -> &[String] {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn first(&self, name: &str) -> Option<&str> {
        self.values(name).first().map(String::as_str)
    }

    /// Resolve the value of `name` relevant to `environment`.
    pub fn resolve(&self, name: &str, environment: &str) -> Option<&str> {
        resolve_scoped(self.values(name), cookie_scope(environment))
    }
}

/// Split `<env>---<token>` into its scope and token.
///
/// A scope never contains `.`, which keeps a bare JWT from being read as scoped.
fn split_scope(value: &str) -> Option<(&str, &str)> {
    let (scope, token) = value.split_once(SCOPE_SEPARATOR)?;
    if scope.is_empty() || scope.contains('.') {
        return None;
    }
    Some((scope, token))
}

/// Pick the value for an already-aliased cookie scope.
pub fn resolve_scoped<'a>(values: &'a [String], scope: &str) -> Option<&'a str> {
    let scoped = values.iter().find_map(|v| match split_scope(v) {
        Some((s, token)) if s == scope => Some(token),
        _ => None,
    });

    scoped
        .or_else(|| {
            values
                .iter()
                .map(String::as_str)
                .find(|v| split_scope(v).is_none())
        })
        .filter(|v| !v.is_empty())
}

/// Token carried by cookie `name` for this environment.
pub fn token_from_request(
    request: &EdgeRequest,
    environment: &str,
    name: &str,
) -> Result<String, GateError> {
    let jar = CookieJar::from_request(request);

    match jar.resolve(name, environment) {
        Some(token) => Ok(token.to_string()),
        None => {
            debug!(cookie = %name, "No usable token in cookie");
            Err(GateError::token_not_found(name))
        }
    }
}
