// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Patient-session verifier (`JANRAIN_PATIENT` / `PROVIDED_ACCESS_CODE`).

use tracing::{debug, warn};

use super::TokenVerifiers;
use crate::auth::claims::Provider;
use crate::auth::cookies::{ACCESS_CODE_COOKIE, ACCESS_TOKEN_COOKIE};
use crate::edge::EdgeRequest;
use crate::error::GateError;

/// Cookie a patient credential is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatientCookie {
    /// Patient login session
    AccessToken,
    /// Access code already confirmed by the access-code verifier
    AccessCode,
}

impl PatientCookie {
    pub fn name(&self) -> &'static str {
        match self {
            PatientCookie::AccessToken => ACCESS_TOKEN_COOKIE,
            PatientCookie::AccessCode => ACCESS_CODE_COOKIE,
        }
    }

    /// Providers a token in this cookie may come from.
    pub fn expected_providers(&self) -> &'static [Provider] {
        match self {
            PatientCookie::AccessToken => &[Provider::JanrainPatient, Provider::ProvidedAccessCode],
            PatientCookie::AccessCode => &[Provider::ProvidedAccessCode],
        }
    }
}

impl TokenVerifiers {
    /// Verify a patient credential for restricted content. Clears cookies on success.
    pub async fn patient_session(
        &self,
        request: &mut EdgeRequest,
        cookie: PatientCookie,
    ) -> Result<(), GateError> {
        let verified = self.verify_cookie(request, cookie.name()).await?;

        let provider = verified.claims.provider();
        if !provider.is_some_and(|p| cookie.expected_providers().contains(&p)) {
            warn!(provider = ?verified.claims.provider, cookie = %cookie.name(), "Invalid provider");
            return Err(GateError::UntrustedProvider {
                provider: verified.claims.provider.unwrap_or_default(),
            });
        }

        debug!(cookie = %cookie.name(), "Patient session accepted");
        request.clear_cookies();
        Ok(())
    }
}
