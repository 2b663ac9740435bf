// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Tenant policies.
//!
//! A tenant is the set of providers it serves plus the ordered list of steps
//! run for any of them. The dispatcher stops at the first step that allows.

use std::fmt;
use std::str::FromStr;

use crate::auth::claims::Provider;
use crate::rules::AccessTier;

/// One verification attempt in a tenant's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Enterprise session at level 3 on `LEVEL_3` paths
    EnterpriseLevel3,
    /// Bot allowance (when enabled), then enterprise session at level 2 on `LEVEL_2` paths
    EnterpriseLevel2,
    /// Marketing token on `LEVEL_2` and `LEVEL_3` paths
    MarketingToken,
    /// Patient session from `accessToken` on `RESTRICTED` paths
    PatientRestricted,
    /// Access code whitelist, then patient session from `accessCode`, on `RESTRICTED` paths
    AccessCodeRestricted,
}

impl Step {
    /// Whether the step has anything to say about a path of this tier.
    pub fn applies_to(&self, tier: AccessTier) -> bool {
        match self {
            Step::EnterpriseLevel3 => tier == AccessTier::Level3,
            Step::EnterpriseLevel2 => tier == AccessTier::Level2,
            Step::MarketingToken => matches!(tier, AccessTier::Level2 | AccessTier::Level3),
            Step::PatientRestricted | Step::AccessCodeRestricted => tier == AccessTier::Restricted,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Step::EnterpriseLevel3 => "enterprise_level_3",
            Step::EnterpriseLevel2 => "enterprise_level_2",
            Step::MarketingToken => "marketing_token",
            Step::PatientRestricted => "patient_restricted",
            Step::AccessCodeRestricted => "access_code_restricted",
        }
    }
}

const PROFESSIONAL_CHAIN: &[Step] = &[
    Step::EnterpriseLevel3,
    Step::EnterpriseLevel2,
    Step::MarketingToken,
];

const PATIENT_CHAIN: &[Step] = &[Step::PatientRestricted, Step::AccessCodeRestricted];

/// Tenant policy, selected by the configured prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tenant {
    /// Enterprise-session tenant (`jmc`)
    Professional,
    /// Patient-session tenant (`jwm`)
    Patient,
}

impl Tenant {
    pub fn prefix(&self) -> &'static str {
        match self {
            Tenant::Professional => "jmc",
            Tenant::Patient => "jwm",
        }
    }

    /// Providers whose tokens this tenant verifies.
    pub fn providers(&self) -> &'static [Provider] {
        match self {
            Tenant::Professional => &[
                Provider::JanrainHcp,
                Provider::ProvidedMarketing,
                Provider::ProvidedAnonymous,
            ],
            Tenant::Patient => &[Provider::JanrainPatient, Provider::ProvidedAccessCode],
        }
    }

    /// Provider assumed when no cookie names one this tenant serves.
    pub fn primary_provider(&self) -> Provider {
        match self {
            Tenant::Professional => Provider::JanrainHcp,
            Tenant::Patient => Provider::JanrainPatient,
        }
    }

    pub fn serves(&self, provider: Provider) -> bool {
        self.providers().contains(&provider)
    }

    /// Steps registered for `provider`. Every provider of a tenant shares the
    /// tenant's chain; providers of the other tenant have none.
    pub fn chain(&self, provider: Provider) -> Option<&'static [Step]> {
        if !self.serves(provider) {
            return None;
        }
        Some(match self {
            Tenant::Professional => PROFESSIONAL_CHAIN,
            Tenant::Patient => PATIENT_CHAIN,
        })
    }
}

impl fmt::Display for Tenant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix())
    }
}

impl FromStr for Tenant {
    type Err = String;

    fn from_str(prefix: &str) -> Result<Self, Self::Err> {
        match prefix.to_ascii_lowercase().as_str() {
            "jmc" => Ok(Tenant::Professional),
            "jwm" => Ok(Tenant::Patient),
            other => Err(format!("unknown tenant prefix: {}", other)),
        }
    }
}
