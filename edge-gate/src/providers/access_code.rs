// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Access-code verifier (`PROVIDED_ACCESS_CODE`).
//!
//! The token must be minted for this stack and environment, and the
//! `auth/valid` grants for it must cover the requested page or service.

use tracing::{debug, warn};

use super::{comparable_path, TokenVerifiers};
use crate::auth::claims::Provider;
use crate::auth::cookies::ACCESS_CODE_COOKIE;
use crate::edge::EdgeRequest;
use crate::error::GateError;
use crate::upstream::{AuthValidQuery, WhitelistResult, DEFAULT_API_VERSION};

pub const ACCESS_CODE_LOGIN_TYPE: &str = "accessCode";

impl TokenVerifiers {
    /// Verify an access code against its whitelist. Leaves the request untouched.
    pub async fn access_code(&self, request: &EdgeRequest) -> Result<(), GateError> {
        let verified = self.verify_cookie(request, ACCESS_CODE_COOKIE).await?;

        if verified.claims.provider() != Some(Provider::ProvidedAccessCode) {
            warn!(provider = ?verified.claims.provider, "Provider is not a trusted provider");
            return Err(GateError::UntrustedProvider {
                provider: verified.claims.provider.clone().unwrap_or_default(),
            });
        }
        self.check_deployment(&verified.claims)?;

        let path = comparable_path(&request.uri, self.access_code_paths.style())?;

        let query = AuthValidQuery {
            host: verified.host,
            cookie_name: ACCESS_CODE_COOKIE,
            token: verified.token,
            access_token: self.companion_access_token(request),
            api_version: DEFAULT_API_VERSION.to_string(),
        };
        let valid = self.whitelist.auth_valid(&query).await?;

        if valid.results.iter().any(|r| self.access_code_grant_covers(r, &path)) {
            debug!(path = %path, "Access code grants this path");
            return Ok(());
        }

        Err(GateError::NotAllowedForPath { path })
    }

    fn access_code_grant_covers(&self, result: &WhitelistResult, path: &str) -> bool {
        if result.login_type.as_deref() != Some(ACCESS_CODE_LOGIN_TYPE) {
            return false;
        }

        let matcher = &self.access_code_paths;
        matcher.page_allowed(&result.urls, path) || matcher.service_allowed(&result.services, path)
    }
}
