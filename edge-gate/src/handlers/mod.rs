// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
mod gate;
mod health;
mod metrics;

pub use gate::{edge_handler, edge_request_from_parts, EdgeState};
pub use health::{health_live, health_ready, health_startup, AppState};
pub use metrics::metrics_handler;
