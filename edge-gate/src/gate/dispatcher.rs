// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Provider Dispatcher
//!
//! classify path -> sniff provider -> run the tenant's chain -> pass through.
//!
//! A chain stops at the first `Allowed`. `Denied` moves on to the next step
//! but the first denial is what surfaces if nothing allows. A gated path on
//! which no step applies passes through.

use tracing::{debug, warn};

use super::tenant::{Step, Tenant};
use crate::auth::claims::Provider;
use crate::auth::cookies::{
    token_from_request, ACCESS_CODE_COOKIE, ACCESS_TOKEN_COOKIE, MARKETING_TOKEN_COOKIE,
};
use crate::auth::jwt::sniff_provider;
use crate::edge::{EdgeRequest, Outcome};
use crate::error::GateError;
use crate::providers::{BotVerifier, PatientCookie, TokenVerifiers, Verdict};
use crate::rules::AccessTier;

/// Cookies consulted for a provider hint, in priority order.
pub const SNIFF_ORDER: [&str; 3] = [ACCESS_TOKEN_COOKIE, MARKETING_TOKEN_COOKIE, ACCESS_CODE_COOKIE];

pub struct Dispatcher {
    tenant: Tenant,
    verifiers: TokenVerifiers,
    bot: BotVerifier,
    bot_allow_level2: bool,
}

impl Dispatcher {
    pub fn new(tenant: Tenant, verifiers: TokenVerifiers, bot: BotVerifier, bot_allow_level2: bool) -> Self {
        Self {
            tenant,
            verifiers,
            bot,
            bot_allow_level2,
        }
    }

    pub fn tenant(&self) -> Tenant {
        self.tenant
    }

    /// Gate one request. On success the request comes back with cookies cleared.
    pub async fn dispatch(&self, mut request: EdgeRequest) -> Result<Outcome, GateError> {
        let tier = AccessTier::classify(&request.uri);

        if tier.is_gated() {
            let provider = self.select_provider(&request);
            let chain = self.tenant.chain(provider).unwrap_or_default();

            debug!(tier = %tier, provider = %provider, tenant = %self.tenant, "Running provider chain");
            self.run_chain(chain, tier, &mut request).await?;
        }

        request.clear_cookies();
        Ok(Outcome::PassThrough(request))
    }

    /// Provider named by the first readable cookie the tenant serves, else the
    /// tenant's primary provider. The hint only chooses a chain.
    pub fn select_provider(&self, request: &EdgeRequest) -> Provider {
        SNIFF_ORDER
            .iter()
            .filter_map(|cookie| token_from_request(request, self.verifiers.environment(), cookie).ok())
            .filter_map(|token| sniff_provider(&token).and_then(|hint| hint.provider()))
            .find(|provider| self.tenant.serves(*provider))
            .unwrap_or_else(|| self.tenant.primary_provider())
    }

    async fn run_chain(
        &self,
        chain: &[Step],
        tier: AccessTier,
        request: &mut EdgeRequest,
    ) -> Result<(), GateError> {
        let mut first_denial: Option<GateError> = None;

        for step in chain {
            match self.run_step(*step, tier, request).await {
                Verdict::Allowed => {
                    debug!(step = step.as_str(), "Step allowed request");
                    return Ok(());
                }
                Verdict::Denied(e) => {
                    debug!(step = step.as_str(), reason = e.reason(), "Step denied request");
                    first_denial.get_or_insert(e);
                }
                Verdict::TryNext => {}
            }
        }

        match first_denial {
            Some(e) => {
                warn!(tier = %tier, reason = e.reason(), error = %e, "No step allowed request");
                Err(e)
            }
            None => {
                debug!(tier = %tier, "No step applies to this path");
                Ok(())
            }
        }
    }

    async fn run_step(&self, step: Step, tier: AccessTier, request: &mut EdgeRequest) -> Verdict {
        if !step.applies_to(tier) {
            return Verdict::TryNext;
        }

        match step {
            Step::EnterpriseLevel3 => self.verifiers.enterprise_session(request, 3).await.into(),
            Step::EnterpriseLevel2 => {
                if self.bot_allow_level2 && self.bot.is_verified(request).await {
                    return Verdict::Allowed;
                }
                self.verifiers.enterprise_session(request, 2).await.into()
            }
            Step::MarketingToken => self.verifiers.marketing_token(request).await.into(),
            Step::PatientRestricted => self
                .verifiers
                .patient_session(request, PatientCookie::AccessToken)
                .await
                .into(),
            Step::AccessCodeRestricted => {
                if let Err(e) = self.verifiers.access_code(request).await {
                    return Verdict::Denied(e);
                }
                self.verifiers
                    .patient_session(request, PatientCookie::AccessCode)
                    .await
                    .into()
            }
        }
    }
}
