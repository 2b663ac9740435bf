// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use prometheus::{CounterVec, Encoder, HistogramOpts, HistogramVec, Opts, Registry, TextEncoder};
use std::sync::Arc;
use std::time::Duration;

/// Prometheus metrics for gate decisions.
///
/// Thread-safe registry tracking how requests were decided and why they
/// were denied.
#[derive(Clone)]
pub struct Metrics {
    registry: Arc<Registry>,

    /// Decision counter: edge_gate_decisions_total{outcome}
    decisions_total: CounterVec,

    /// Denial counter: edge_gate_denials_total{reason}
    denials_total: CounterVec,

    /// Decision duration histogram: edge_gate_decision_duration_seconds{outcome}
    decision_duration: HistogramVec,
}

impl Metrics {
    /// Create a new metrics registry.
    pub fn new() -> Self {
        let registry = Registry::new();

        let decisions_total = CounterVec::new(
            Opts::new("edge_gate_decisions_total", "Total number of gate decisions"),
            &["outcome"],
        )
        .expect("failed to create decisions_total counter");

        let denials_total = CounterVec::new(
            Opts::new("edge_gate_denials_total", "Total number of denied requests"),
            &["reason"],
        )
        .expect("failed to create denials_total counter");

        // Buckets from 1ms to 10s: DNS and identity provider calls sit on the slow end
        let decision_duration = HistogramVec::new(
            HistogramOpts::new(
                "edge_gate_decision_duration_seconds",
                "Gate decision duration in seconds",
            )
            .buckets(vec![
                0.001, 0.002, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ]),
            &["outcome"],
        )
        .expect("failed to create decision_duration histogram");

        registry
            .register(Box::new(decisions_total.clone()))
            .expect("failed to register decisions_total");
        registry
            .register(Box::new(denials_total.clone()))
            .expect("failed to register denials_total");
        registry
            .register(Box::new(decision_duration.clone()))
            .expect("failed to register decision_duration");

        Self {
            registry: Arc::new(registry),
            decisions_total,
            denials_total,
            decision_duration,
        }
    }

    /// Record one decision (`pass_through`, `redirect`, `respond` or `denied`).
    pub fn record_decision(&self, outcome: &str, duration: Duration) {
        self.decisions_total.with_label_values(&[outcome]).inc();
        self.decision_duration
            .with_label_values(&[outcome])
            .observe(duration.as_secs_f64());
    }

    /// Record why a request was denied.
    pub fn record_denial(&self, reason: &str) {
        self.denials_total.with_label_values(&[reason]).inc();
    }

    /// Encode metrics in Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
            tracing::error!(error = %e, "failed to encode metrics");
            return String::new();
        }
        String::from_utf8(buffer).unwrap_or_default()
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}
