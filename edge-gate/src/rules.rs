// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Access Rules
//!
//! Maps a request path to the access tier it requires.
//!
//! Tiers, tested in this order:
//! - LEVEL_3: `/level-3/`, `/tcp/`, `/iframes/private/`
//! - LEVEL_2: `/level-2/`, `/iframes/anonymous/`
//! - RESTRICTED: `/restricted/`

use std::fmt;

pub const LEVEL_3_PREFIXES: &[&str] = &["/level-3/", "/tcp/", "/iframes/private/"];
pub const LEVEL_2_PREFIXES: &[&str] = &["/level-2/", "/iframes/anonymous/"];
pub const RESTRICTED_PREFIXES: &[&str] = &["/restricted/"];

// =============================================================================
// Access Tier
// =============================================================================

/// Access level a path requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessTier {
    Level2,
    Level3,
    Restricted,
    /// No gate applies.
    None,
}

impl AccessTier {
    /// Classify a request path. Pure and total.
    pub fn classify(path: &str) -> Self {
        if matches_any(LEVEL_3_PREFIXES, path) {
            AccessTier::Level3
        } else if matches_any(LEVEL_2_PREFIXES, path) {
            AccessTier::Level2
        } else if matches_any(RESTRICTED_PREFIXES, path) {
            AccessTier::Restricted
        } else {
            AccessTier::None
        }
    }

    pub fn is_gated(&self) -> bool {
        !matches!(self, AccessTier::None)
    }

    /// Minimum enterprise-session `level` claim for this tier.
    pub fn required_level(&self) -> Option<i64> {
        match self {
            AccessTier::Level3 => Some(3),
            AccessTier::Level2 => Some(2),
            AccessTier::Restricted | AccessTier::None => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AccessTier::Level2 => "LEVEL_2",
            AccessTier::Level3 => "LEVEL_3",
            AccessTier::Restricted => "RESTRICTED",
            AccessTier::None => "NONE",
        }
    }
}

impl fmt::Display for AccessTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn matches_any(prefixes: &[&str], path: &str) -> bool {
    prefixes.iter().any(|prefix| path.starts_with(prefix))
}
