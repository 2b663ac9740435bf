// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
//! Edge request gatekeeper.
//!
//! Decides, for every request reaching the edge, whether the caller may see
//! the requested content: tier classification, platform token verification
//! per trust source, whitelist checks, crawler verification and, in
//! non-production deployments, an enterprise directory login.

pub mod auth;
pub mod config;
pub mod edge;
pub mod error;
pub mod gate;
pub mod handlers;
pub mod metrics;
pub mod params;
pub mod providers;
pub mod proxy;
pub mod rules;
pub mod upstream;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{Config, Deployment, GateConfig};
pub use edge::{EdgeRequest, EdgeResponse, HeaderMultiMap, Outcome};
pub use error::GateError;
pub use gate::{Dispatcher, Gatekeeper, Tenant};
