// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use axum::{
    body::Body,
    extract::{Request, State},
    http::request::Parts,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::edge::{EdgeRequest, HeaderMultiMap, Outcome};
use crate::gate::Gatekeeper;
use crate::proxy::OriginProxy;

/// State of the catch-all edge route.
#[derive(Clone)]
pub struct EdgeState {
    pub gatekeeper: Arc<Gatekeeper>,
    pub origin: OriginProxy,
}

/// Gate every request that is not a probe or `/metrics`.
///
/// Authorized requests travel to origin with the gatekeeper's headers;
/// everything else is answered here.
pub async fn edge_handler(State(state): State<EdgeState>, request: Request<Body>) -> Response {
    let (parts, body) = request.into_parts();
    let edge_request = edge_request_from_parts(&parts);

    match state.gatekeeper.handle(edge_request).await {
        Outcome::Respond(response) => response.into_response(),
        Outcome::PassThrough(request) => state.origin.forward(parts.method, request, body).await,
    }
}

/// Build the edge view of an inbound request. Header values that are not
/// visible ASCII are dropped.
pub fn edge_request_from_parts(parts: &Parts) -> EdgeRequest {
    let mut headers = HeaderMultiMap::new();
    for (name, value) in parts.headers.iter() {
        match value.to_str() {
            Ok(value) => headers.append(name.as_str(), value),
            Err(_) => tracing::debug!(header = %name, "dropping non-ASCII header value"),
        }
    }

    EdgeRequest::new(
        parts.uri.path(),
        parts.uri.query().unwrap_or_default(),
        headers,
    )
}
