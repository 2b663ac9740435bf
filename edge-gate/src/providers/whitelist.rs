// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Resource Whitelist Matcher
//!
//! Decides whether a request path is covered by what `auth/valid` returned.
//! Request paths are first reduced to a comparable form: tier and locale
//! segments dropped, `.json` required.

use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::{debug, warn};

use crate::error::GateError;

/// Placeholder slug baked into statically generated landing pages.
pub const LANDING_PAGE_PLACEHOLDER: &str = "slug-for-landing-page-generated-at-build-time";

/// How comparable paths are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PathStyle {
    /// `/path/to/page.json`, as marketing grants list them
    Rooted,
    /// `path/to/page.json`, as access-code grants list them
    Relative,
}

/// Reduce a request uri to the form whitelist entries are written in.
pub fn comparable_path(uri: &str, style: PathStyle) -> Result<String, GateError> {
    let parts: Vec<&str> = uri.split('/').collect();
    if parts.len() <= 2 {
        return Err(GateError::InvalidUri(uri.to_string()));
    }

    let parts = match parts.first() {
        Some(&"") => &parts[1..],
        _ => &parts[..],
    };

    // [tier, locale, rest...]
    let rest = parts.get(2..).unwrap_or_default().join("/");
    let path = match style {
        PathStyle::Rooted => format!("/{}", rest),
        PathStyle::Relative => rest,
    };

    if !path.ends_with(".json") {
        return Err(GateError::UnsupportedExtension {
            uri: uri.to_string(),
        });
    }

    Ok(path)
}

fn strip_slashes(input: &str) -> &str {
    let s = input.strip_suffix('/').unwrap_or(input);
    s.strip_prefix('/').unwrap_or(s)
}

// =============================================================================
// Matcher
// =============================================================================

/// Whitelist matcher with memoized service patterns.
pub struct WhitelistMatcher {
    style: PathStyle,
    patterns: RwLock<HashMap<String, Arc<[Regex; 2]>>>,
}

impl WhitelistMatcher {
    pub fn new(style: PathStyle) -> Self {
        Self {
            style,
            patterns: RwLock::new(HashMap::new()),
        }
    }

    pub fn style(&self) -> PathStyle {
        self.style
    }

    /// A page entry equals the comparable path without its extension.
    pub fn page_allowed(&self, urls: &[String], path: &str) -> bool {
        let mut page = path.replacen(".json", "", 1);
        if self.style == PathStyle::Relative {
            page = page.replacen(LANDING_PAGE_PLACEHOLDER, "", 1);
        }
        debug!(page = %page, "Checking page whitelist");
        urls.iter().any(|u| *u == page)
    }

    /// A service entry covers `<svc>.json` and anything under `<svc>/`.
    pub fn service_allowed(&self, services: &[String], path: &str) -> bool {
        services.iter().any(|service| match self.patterns_for(service) {
            Some(patterns) => patterns.iter().any(|re| re.is_match(path)),
            None => false,
        })
    }

    pub fn event_allowed(events: &[String], path: &str) -> bool {
        events
            .iter()
            .any(|id| path.ends_with(&format!("/services/events/{}.json", id)))
    }

    pub fn material_allowed(materials: &[String], path: &str) -> bool {
        materials
            .iter()
            .any(|id| path.ends_with(&format!("/services/request_materials/{}.json", id)))
    }

    fn patterns_for(&self, service: &str) -> Option<Arc<[Regex; 2]>> {
        {
            let cache = self.patterns.read().unwrap_or_else(|e| e.into_inner());
            if let Some(patterns) = cache.get(service) {
                return Some(patterns.clone());
            }
        }

        let root = match self.style {
            PathStyle::Rooted => "/",
            PathStyle::Relative => "",
        };
        let escaped = regex::escape(strip_slashes(service));

        let compiled = Regex::new(&format!(r"^{root}{escaped}\.json$")).and_then(|exact| {
            Regex::new(&format!(r"^{root}{escaped}/.*\.json$")).map(|nested| [exact, nested])
        });

        match compiled {
            Ok(patterns) => {
                let patterns = Arc::new(patterns);
                self.patterns
                    .write()
                    .unwrap_or_else(|e| e.into_inner())
                    .insert(service.to_string(), patterns.clone());
                Some(patterns)
            }
            Err(e) => {
                warn!(service = %service, error = %e, "Unusable service pattern");
                None
            }
        }
    }

    #[cfg(test)]
    fn cached_patterns(&self) -> usize {
        self.patterns.read().map(|c| c.len()).unwrap_or(0)
    }
}
