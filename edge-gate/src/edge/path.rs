// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Canonical request paths.
//!
//! The gate classifies the path string it receives, while origin serves the
//! path its URL parser resolves. Only paths for which both are the same
//! string are let through: no dot segments, no empty segments, no
//! backslashes, and no percent-encoded separators or unreserved characters
//! (`/%6Cevel-3/` decodes to a tier prefix).

use url::Url;

use crate::error::GateError;

const PARSE_BASE: &str = "http://edge.invalid/";

/// Fails with `InvalidUri` unless `path` reaches origin unchanged.
pub fn ensure_canonical(path: &str) -> Result<(), GateError> {
    let invalid = || GateError::InvalidUri(path.to_string());

    if !path.starts_with('/') || path.contains("//") || path.contains('\\') {
        return Err(invalid());
    }
    if has_masked_character(path)? {
        return Err(invalid());
    }

    let resolved = Url::parse(PARSE_BASE)
        .and_then(|base| base.join(path))
        .map_err(|_| invalid())?;

    if resolved.path() != path || resolved.query().is_some() || resolved.fragment().is_some() {
        return Err(invalid());
    }
    Ok(())
}

/// Whether a percent-escape in `path` hides a character that changes how
/// the path is classified or resolved. Malformed escapes are rejected.
fn has_masked_character(path: &str) -> Result<bool, GateError> {
    let bytes = path.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] != b'%' {
            i += 1;
            continue;
        }
        let decoded = match (bytes.get(i + 1), bytes.get(i + 2)) {
            (Some(&hi), Some(&lo)) => hex_value(hi).zip(hex_value(lo)).map(|(h, l)| (h << 4) | l),
            _ => None,
        };
        let Some(decoded) = decoded else {
            return Err(GateError::InvalidUri(path.to_string()));
        };
        if decoded.is_ascii_alphanumeric() || b"-._~/\\".contains(&decoded) {
            return Ok(true);
        }
        i += 3;
    }
    Ok(false)
}

fn hex_value(b: u8) -> Option<u8> {
    (b as char).to_digit(16).map(|d| d as u8)
}
