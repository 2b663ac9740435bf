// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Gatekeeper
//!
//! Outer handler run for every edge request:
//!
//! 0. the path must be canonical, see [`crate::edge::path`]
//! 1. `/info`: build metadata
//! 2. `www.` redirect, when enabled
//! 3. non-production only: `/blank`, then the enterprise directory login
//! 4. provider dispatch
//!
//! Any error raised on the way becomes a bare 401. The reason is logged and
//! counted, never returned to the caller.

pub mod dispatcher;
pub mod tenant;

pub use dispatcher::Dispatcher;
pub use tenant::{Step, Tenant};

use std::time::Instant;
use tracing::{debug, info, warn};

use crate::auth::login::EnterpriseLogin;
use crate::config::{BuildInfo, Deployment, GateConfig};
use crate::edge::{ensure_canonical, EdgeRequest, EdgeResponse, Outcome};
use crate::error::GateError;
use crate::metrics::Metrics;

pub const INFO_PATH: &str = "/info";
pub const BLANK_PATH: &str = "/blank";
pub const BLANK_BODY: &str = "Welcome to the QA safe haven! Enjoy your stay!";
pub const RESPONSE_TYPE_HEADER: &str = "X-Response-Type";
pub const INFO_RESPONSE_TYPE: &str = "edge-info";

pub struct Gatekeeper {
    config: GateConfig,
    dispatcher: Dispatcher,
    login: Option<EnterpriseLogin>,
    metrics: Metrics,
}

impl Gatekeeper {
    /// `login` is only consulted in non-production deployments.
    pub fn new(
        config: GateConfig,
        dispatcher: Dispatcher,
        login: Option<EnterpriseLogin>,
        metrics: Metrics,
    ) -> Self {
        Self {
            config,
            dispatcher,
            login,
            metrics,
        }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    /// Whether the gate can serve without loading anything first. Always
    /// true in production.
    pub async fn login_loaded(&self) -> bool {
        match (self.config.deployment, &self.login) {
            (Deployment::NonProduction, Some(login)) => login.is_loaded().await,
            _ => true,
        }
    }

    /// Load the enterprise login configuration ahead of the first request.
    pub async fn preload(&self) -> Result<(), GateError> {
        if let (Deployment::NonProduction, Some(login)) = (self.config.deployment, &self.login) {
            login.preload().await?;
        }
        Ok(())
    }

    /// Decide what the edge does with `request`.
    pub async fn handle(&self, request: EdgeRequest) -> Outcome {
        let started = Instant::now();

        if let Err(e) = ensure_canonical(&request.uri) {
            return self.deny(e, started);
        }

        if request.uri == INFO_PATH {
            info!(version = %self.config.build.version, "Returning info data");
            return self.finish(Outcome::Respond(info_response(&self.config.build)), started);
        }

        if let Some(redirect) = self.www_redirect(&request) {
            return self.finish(Outcome::Respond(redirect), started);
        }

        let result = match self.config.deployment {
            Deployment::Production => self.dispatcher.dispatch(request).await,
            Deployment::NonProduction => self.process_non_production(request).await,
        };

        match result {
            Ok(outcome) => self.finish(outcome, started),
            Err(e) => self.deny(e, started),
        }
    }

    fn deny(&self, e: GateError, started: Instant) -> Outcome {
        warn!(reason = e.reason(), error = %e, "Error handling request");
        self.metrics.record_denial(e.reason());
        self.metrics.record_decision("denied", started.elapsed());
        Outcome::Respond(EdgeResponse::unauthorized())
    }

    fn finish(&self, outcome: Outcome, started: Instant) -> Outcome {
        let label = match &outcome {
            Outcome::PassThrough(_) => "pass_through",
            Outcome::Respond(r) if (300..400).contains(&r.status) => "redirect",
            Outcome::Respond(_) => "respond",
        };
        self.metrics.record_decision(label, started.elapsed());
        outcome
    }

    async fn process_non_production(&self, request: EdgeRequest) -> Result<Outcome, GateError> {
        if request.uri == BLANK_PATH {
            return Ok(Outcome::Respond(
                EdgeResponse::new(200, "OK").with_body(BLANK_BODY),
            ));
        }

        if let Some(login) = &self.login {
            debug!(uri = %request.uri, "Validating access to environment");
            let decision = login.authenticate(&request).await?;

            if decision.requires_action() {
                if !is_html(&request.uri) {
                    debug!(uri = %request.uri, "Login required but not an HTML page");
                    return Err(GateError::NotHtml(request.uri));
                }
                return Ok(decision.outcome);
            }
        }

        self.dispatcher.dispatch(request).await
    }

    fn www_redirect(&self, request: &EdgeRequest) -> Option<EdgeResponse> {
        let status = self.config.www_redirect?;
        let host = request.host()?;

        if host.starts_with("www.") {
            return None;
        }

        debug!(host = %host, status, "Redirecting to www. host");

        let mut location = format!("https://www.{}{}", host, request.uri);
        if !request.querystring.is_empty() {
            location.push('?');
            location.push_str(&request.querystring);
        }
        Some(EdgeResponse::redirect(status, location, "www. redirect"))
    }
}

/// An HTML page is a path whose last segment has no extension or `.html`.
pub fn is_html(uri: &str) -> bool {
    let last = uri.rsplit('/').next().unwrap_or_default();
    match last.rfind('.') {
        None | Some(0) => true,
        Some(i) => &last[i + 1..] == "html",
    }
}

fn info_response(build: &BuildInfo) -> EdgeResponse {
    let body = serde_json::to_string(build).unwrap_or_else(|_| "{}".to_string());
    EdgeResponse::new(200, "OK")
        .with_header("Content-Type", "application/json")
        .with_header(RESPONSE_TYPE_HEADER, INFO_RESPONSE_TYPE)
        .with_body(body)
}
