// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Enterprise-session verifier (`JANRAIN_HCP` / `PROVIDED_ANONYMOUS`).

use tracing::{debug, warn};

use super::TokenVerifiers;
use crate::auth::claims::{PlatformClaims, Provider};
use crate::auth::cookies::ACCESS_TOKEN_COOKIE;
use crate::edge::EdgeRequest;
use crate::error::GateError;

/// Providers whose sessions unlock tiered content.
pub const TRUSTED_PROVIDERS: [Provider; 2] = [Provider::JanrainHcp, Provider::ProvidedAnonymous];

/// Claim checks for an enterprise session. A token without a `provider`
/// claim predates it and is accepted.
pub fn check_enterprise_claims(claims: &PlatformClaims, required_level: i64) -> Result<(), GateError> {
    if let Some(raw) = claims.provider.as_deref() {
        let trusted = Provider::from_claim(raw).is_some_and(|p| TRUSTED_PROVIDERS.contains(&p));
        if !trusted {
            warn!(provider = %raw, "Provider is not a trusted provider");
            return Err(GateError::UntrustedProvider {
                provider: raw.to_string(),
            });
        }
    }

    let level = match claims.level {
        Some(level) if level != 0 => level,
        _ => {
            warn!("Level not set, token not trusted");
            return Err(GateError::InvalidLevel("no level set".to_string()));
        }
    };

    if level < required_level {
        warn!(level, required_level, "User level isn't valid for the requested path");
        return Err(GateError::InvalidLevel(format!(
            "level {} below required {}",
            level, required_level
        )));
    }

    Ok(())
}

impl TokenVerifiers {
    /// Verify the `accessToken` session for a tier. Clears cookies on success.
    pub async fn enterprise_session(
        &self,
        request: &mut EdgeRequest,
        required_level: i64,
    ) -> Result<(), GateError> {
        let verified = self.verify_cookie(request, ACCESS_TOKEN_COOKIE).await?;
        check_enterprise_claims(&verified.claims, required_level)?;

        debug!(required_level, "Enterprise session accepted");
        request.clear_cookies();
        Ok(())
    }
}
