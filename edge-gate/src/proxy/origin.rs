// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use axum::{
    body::Body,
    http::{header, Method, StatusCode},
    response::{IntoResponse, Response},
};
use std::time::Duration;

use crate::edge::{EdgeRequest, HeaderMultiMap, HOST_HEADER};

/// Headers that should not be forwarded (hop-by-hop headers).
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
    "host", // We'll use the target host
];

const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Proxy forwarding authorized requests to origin.
///
/// Forwards the gatekeeper's copy of the request, so cookies cleared by a
/// verifier never reach origin.
#[derive(Clone)]
pub struct OriginProxy {
    /// Base URL of origin (e.g., "http://127.0.0.1:3000")
    base_url: String,
    /// HTTP client for making requests
    client: reqwest::Client,
}

impl OriginProxy {
    pub fn new(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }

    /// The gate only passes canonical paths, so origin resolves the same
    /// path the gate classified.
    pub fn target_url(&self, request: &EdgeRequest) -> String {
        if request.querystring.is_empty() {
            format!("{}{}", self.base_url, request.uri)
        } else {
            format!("{}{}?{}", self.base_url, request.uri, request.querystring)
        }
    }

    /// Forward a request that passed the gate.
    pub async fn forward(&self, method: Method, request: EdgeRequest, body: Body) -> Response {
        let target_url = self.target_url(&request);

        tracing::debug!(
            method = %method,
            target_url = %target_url,
            "forwarding request to origin"
        );

        let mut req_builder = self.client.request(method.clone(), &target_url);
        req_builder = Self::copy_headers(req_builder, &request.headers);

        // Forward body for methods that support it
        if matches!(method, Method::POST | Method::PUT | Method::PATCH) {
            let body_bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    tracing::error!(error = %e, "failed to read request body");
                    return (StatusCode::BAD_REQUEST, "Failed to read request body").into_response();
                }
            };
            req_builder = req_builder.body(body_bytes);
        }

        match req_builder.send().await {
            Ok(resp) => Self::convert_response(resp).await,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    target_url = %target_url,
                    "failed to forward request to origin"
                );

                if e.is_timeout() {
                    (StatusCode::GATEWAY_TIMEOUT, "Gateway timeout").into_response()
                } else if e.is_connect() {
                    (StatusCode::BAD_GATEWAY, "Failed to connect to upstream").into_response()
                } else {
                    (StatusCode::BAD_GATEWAY, "Bad gateway").into_response()
                }
            }
        }
    }

    /// Copy the gated request's headers, minus hop-by-hop ones. The original
    /// host travels as `X-Forwarded-Host`.
    fn copy_headers(
        mut builder: reqwest::RequestBuilder,
        headers: &HeaderMultiMap,
    ) -> reqwest::RequestBuilder {
        for (name, value) in headers.iter() {
            if HOP_BY_HOP.contains(&name) {
                continue;
            }
            if let (Ok(header_name), Ok(header_value)) = (
                reqwest::header::HeaderName::from_bytes(name.as_bytes()),
                reqwest::header::HeaderValue::from_str(value),
            ) {
                builder = builder.header(header_name, header_value);
            }
        }

        if let Some(host) = headers.first(HOST_HEADER) {
            builder = builder.header("x-forwarded-host", host);
        }

        builder
    }

    /// Convert a reqwest response to an axum response.
    async fn convert_response(resp: reqwest::Response) -> Response {
        let status = resp.status();
        let headers = resp.headers().clone();

        let body = match resp.bytes().await {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::error!(error = %e, "failed to read response body from origin");
                return (StatusCode::BAD_GATEWAY, "Failed to read upstream response").into_response();
            }
        };

        let mut response = Response::builder()
            .status(StatusCode::from_u16(status.as_u16()).unwrap_or(StatusCode::OK));

        for (name, value) in headers.iter() {
            let name_str = name.as_str().to_lowercase();
            // Skip hop-by-hop headers
            if !["connection", "keep-alive", "transfer-encoding"].contains(&name_str.as_str()) {
                if let Ok(header_name) = header::HeaderName::from_bytes(name.as_ref()) {
                    if let Ok(header_value) = header::HeaderValue::from_bytes(value.as_bytes()) {
                        response = response.header(header_name, header_value);
                    }
                }
            }
        }

        response.body(Body::from(body)).unwrap_or_else(|_| {
            (StatusCode::INTERNAL_SERVER_ERROR, "Internal error").into_response()
        })
    }
}
