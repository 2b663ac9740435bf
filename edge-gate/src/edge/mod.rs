// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Edge Request Model
//!
//! The interception contract between the edge and the gatekeeper:
//! - `EdgeRequest`: path, raw query string and headers of an inbound request
//! - `EdgeResponse`: a response produced instead of reaching origin
//! - `Outcome`: either pass the (possibly cookie-stripped) request through or respond

pub mod headers;
pub mod path;

pub use headers::HeaderMultiMap;
pub use path::ensure_canonical;

use axum::{
    body::Body,
    http::{header::HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};

pub const COOKIE_HEADER: &str = "cookie";
pub const HOST_HEADER: &str = "host";
pub const SOURCE_HEADER: &str = "x-source";

// =============================================================================
// Request
// =============================================================================

/// Inbound request descriptor.
///
/// Immutable apart from one side effect: clearing the cookie header once the
/// request has been authorized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeRequest {
    pub uri: String,
    pub querystring: String,
    pub headers: HeaderMultiMap,
}

impl EdgeRequest {
    pub fn new(uri: impl Into<String>, querystring: impl Into<String>, headers: HeaderMultiMap) -> Self {
        Self {
            uri: uri.into(),
            querystring: querystring.into(),
            headers,
        }
    }

    /// Value of the `Host` header.
    pub fn host(&self) -> Option<&str> {
        self.headers.first(HOST_HEADER)
    }

    /// Raw cookie header values, in order.
    pub fn cookie_headers(&self) -> &[String] {
        self.headers.values(COOKIE_HEADER)
    }

    /// Remove session material before the request travels to origin.
    pub fn clear_cookies(&mut self) {
        self.headers.clear_values(COOKIE_HEADER);
    }
}

// =============================================================================
// Response
// =============================================================================

/// Response generated at the edge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdgeResponse {
    pub status: u16,
    pub status_description: String,
    pub headers: HeaderMultiMap,
    pub body: Option<String>,
}

impl EdgeResponse {
    pub fn new(status: u16, status_description: impl Into<String>) -> Self {
        Self {
            status,
            status_description: status_description.into(),
            headers: HeaderMultiMap::new(),
            body: None,
        }
    }

    /// The flat deny response. Carries no detail about why.
    pub fn unauthorized() -> Self {
        Self::new(401, "Unauthorized")
    }

    pub fn redirect(status: u16, location: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(status, description).with_header("Location", location)
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.append(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn location(&self) -> Option<&str> {
        self.headers.first("location")
    }
}

impl IntoResponse for EdgeResponse {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.status).unwrap_or(StatusCode::UNAUTHORIZED);
        let mut response = Response::new(Body::from(self.body.unwrap_or_default()));
        *response.status_mut() = status;

        for (name, value) in self.headers.iter() {
            match (
                HeaderName::from_bytes(name.as_bytes()),
                HeaderValue::from_str(value),
            ) {
                (Ok(name), Ok(value)) => {
                    response.headers_mut().append(name, value);
                }
                _ => tracing::warn!(header = %name, "dropping unrepresentable response header"),
            }
        }

        response
    }
}

// =============================================================================
// Outcome
// =============================================================================

/// What the edge should do with a request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Forward the request to origin.
    PassThrough(EdgeRequest),
    /// Answer directly with this response.
    Respond(EdgeResponse),
}

impl Outcome {
    pub fn is_pass_through(&self) -> bool {
        matches!(self, Outcome::PassThrough(_))
    }

    pub fn response(&self) -> Option<&EdgeResponse> {
        match self {
            Outcome::Respond(response) => Some(response),
            Outcome::PassThrough(_) => None,
        }
    }

    pub fn request(&self) -> Option<&EdgeRequest> {
        match self {
            Outcome::PassThrough(request) => Some(request),
            Outcome::Respond(_) => None,
        }
    }
}
