// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Marketing-token verifier (`PROVIDED_MARKETING`).
//!
//! Marketing tokens are always `level` 1 so they can never pass as an
//! enterprise session; what they unlock is listed by `auth/valid`.

use tracing::{debug, warn};

use super::whitelist::WhitelistMatcher;
use super::{comparable_path, TokenVerifiers};
use crate::auth::claims::Provider;
use crate::auth::cookies::MARKETING_TOKEN_COOKIE;
use crate::edge::EdgeRequest;
use crate::error::GateError;
use crate::upstream::{AuthValidQuery, WhitelistResult, DEFAULT_API_VERSION};

pub const MARKETING_LOGIN_TYPE: &str = "ea-token";
pub const API_VERSION_HEADER: &str = "x-apiversion";

impl TokenVerifiers {
    /// Verify a marketing token against its whitelist. Leaves the request untouched.
    pub async fn marketing_token(&self, request: &EdgeRequest) -> Result<(), GateError> {
        let verified = self.verify_cookie(request, MARKETING_TOKEN_COOKIE).await?;
        let claims = &verified.claims;

        if claims.provider() != Some(Provider::ProvidedMarketing) {
            warn!(provider = ?claims.provider, "Provider is not a trusted provider");
            return Err(GateError::UntrustedProvider {
                provider: claims.provider.clone().unwrap_or_default(),
            });
        }
        if claims.level != Some(1) {
            return Err(GateError::InvalidLevel("marketing tokens must be level 1".to_string()));
        }
        self.check_deployment(claims)?;

        let path = comparable_path(&request.uri, self.marketing_paths.style())?;

        let api_version = request
            .headers
            .first(API_VERSION_HEADER)
            .filter(|v| !v.is_empty())
            .unwrap_or(DEFAULT_API_VERSION)
            .to_string();

        let query = AuthValidQuery {
            host: verified.host,
            cookie_name: MARKETING_TOKEN_COOKIE,
            token: verified.token,
            access_token: self.companion_access_token(request),
            api_version,
        };
        let valid = self.whitelist.auth_valid(&query).await?;

        if valid.results.iter().any(|r| self.marketing_grant_covers(r, &path)) {
            debug!(path = %path, "Marketing token grants this path");
            return Ok(());
        }

        Err(GateError::NotAllowedForPath { path })
    }

    fn marketing_grant_covers(&self, result: &WhitelistResult, path: &str) -> bool {
        if result.provider.as_deref() != Some(Provider::ProvidedMarketing.as_str())
            || result.login_type.as_deref() != Some(MARKETING_LOGIN_TYPE)
        {
            return false;
        }

        let matcher = &self.marketing_paths;
        matcher.page_allowed(&result.urls, path)
            || matcher.service_allowed(&result.services, path)
            || WhitelistMatcher::event_allowed(&result.events, path)
            || WhitelistMatcher::material_allowed(&result.materials, path)
    }
}
