// SPDX-License-Identifier: Apache-2.0
// Copyright 2024-2026 CAB Ingénierie / Christophe ABOULICAM
use anyhow::Result;
use axum::{
    routing::{any, get},
    Router,
};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::signal;
use tokio::sync::broadcast;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use edge_gate::auth::{EnterpriseLogin, HttpIdentityProvider, LoginConfigCache};
use edge_gate::config::{Config, Deployment, GateConfig};
use edge_gate::gate::{Dispatcher, Gatekeeper};
use edge_gate::handlers::{
    edge_handler, health_live, health_ready, health_startup, metrics_handler, AppState, EdgeState,
};
use edge_gate::metrics::Metrics;
use edge_gate::params::{InMemoryParameterStore, JsonFileParameterStore, ParameterStore};
use edge_gate::providers::{BotVerifier, SystemDnsResolver, TokenVerifiers};
use edge_gate::proxy::OriginProxy;
use edge_gate::upstream::{PlatformClient, PlatformClientConfig};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config);

    let gate_config = GateConfig::from_config(&config)?;

    tracing::info!(
        host = %config.host,
        port = config.port,
        tenant = %gate_config.tenant,
        environment = %gate_config.environment,
        region = %gate_config.region,
        deployment = ?gate_config.deployment,
        domain = %config.domain,
        origin_url = %config.origin_url,
        "starting edge-gate"
    );

    let upstream_timeout = Duration::from_secs(config.upstream_timeout_secs);

    // Create shutdown broadcast channel
    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let shutting_down = Arc::new(AtomicBool::new(false));

    // Create metrics registry
    let metrics = Metrics::new();

    // Platform API: public keys and auth/valid
    let platform = Arc::new(PlatformClient::new(PlatformClientConfig {
        timeout_seconds: config.upstream_timeout_secs,
        ..Default::default()
    })?);

    let verifiers = TokenVerifiers::new(
        gate_config.environment.clone(),
        gate_config.region.clone(),
        platform.clone(),
        platform,
    );
    let bot = BotVerifier::new(Arc::new(SystemDnsResolver::from_system_conf()?));
    let dispatcher = Dispatcher::new(
        gate_config.tenant,
        verifiers,
        bot,
        gate_config.googlebot_allow_level2,
    );

    // Enterprise directory login, non-production only
    let login = match gate_config.deployment {
        Deployment::Production => None,
        Deployment::NonProduction => {
            let params = load_parameters(config.parameters_file.as_deref()).await?;
            Some(EnterpriseLogin::new(
                gate_config.tenant.prefix(),
                gate_config.standardized_env.clone(),
                params,
                Arc::new(HttpIdentityProvider::new(upstream_timeout)),
                LoginConfigCache::new(),
            ))
        }
    };

    let gatekeeper = Arc::new(Gatekeeper::new(gate_config, dispatcher, login, metrics.clone()));

    // Warm the login configuration; a failure is retried on the first request
    if let Err(e) = gatekeeper.preload().await {
        tracing::warn!(error = %e, "enterprise login configuration not loaded yet");
    }

    // Create app state for health endpoints
    let app_state = AppState {
        gatekeeper: Arc::clone(&gatekeeper),
        shutting_down: Arc::clone(&shutting_down),
    };

    let edge_state = EdgeState {
        gatekeeper,
        origin: OriginProxy::new(config.origin_url.clone(), Duration::from_secs(30)),
    };

    // Build application router
    let app = Router::new()
        // Health endpoints (no state needed for live/startup)
        .route("/health/live", get(health_live))
        .route("/health/startup", get(health_startup))
        .route(
            "/health/ready",
            get(health_ready).with_state(app_state.clone()),
        )
        // Metrics endpoint
        .route("/metrics", get(metrics_handler).with_state(metrics.clone()))
        // Everything else goes through the gate
        .fallback(any(edge_handler).with_state(edge_state))
        // Add tracing layer
        .layer(TraceLayer::new_for_http());

    // Create TCP listener
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(address = %addr, "listening for connections");

    // Spawn graceful shutdown handler
    let shutdown_tx_clone = shutdown_tx.clone();
    let shutting_down_clone = Arc::clone(&shutting_down);
    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("shutdown signal received, initiating graceful shutdown");

        // Mark as shutting down (health check will return not ready)
        shutting_down_clone.store(true, Ordering::SeqCst);

        // Signal all tasks to stop
        let _ = shutdown_tx_clone.send(());

        // Give some time for in-flight requests to complete
        tokio::time::sleep(Duration::from_secs(5)).await;
    });

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let mut rx = shutdown_tx.subscribe();
            let _ = rx.recv().await;
        })
        .await?;

    tracing::info!("edge-gate stopped");
    Ok(())
}

/// Parameter store backing the enterprise login.
async fn load_parameters(path: Option<&str>) -> Result<Arc<dyn ParameterStore>> {
    match path {
        Some(path) => {
            tracing::info!(path = %path, "loading parameters");
            Ok(Arc::new(JsonFileParameterStore::load(path).await?))
        }
        None => {
            tracing::warn!("PARAMETERS_FILE not set, enterprise login cannot load its configuration");
            Ok(Arc::new(InMemoryParameterStore::new()))
        }
    }
}

/// Initialize tracing based on configuration.
fn init_tracing(config: &Config) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().pretty())
            .init();
    }
}

/// Wait for shutdown signal (SIGTERM or SIGINT).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
