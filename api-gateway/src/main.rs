// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes a small HTTP API on top of the `fedchain` crate:
//!
//! - `GET /health`
//! - `GET /model`, `GET /model/history`
//! - `POST /contributions/digest`, `POST /contributions`
//! - `GET /rounds/current`, `GET /rounds/{round}/participants`,
//!   `GET /rounds/{round}/rewards/{participant}`, `POST /rounds/finalize`
//! - `GET /balances/{account}`
//!
//! At startup it performs the deployment wiring: the token ledger and the
//! collectible registry are created under the administrator's authority,
//! the engine is built, and both collaborators are handed off to the
//! engine. A Prometheus exporter serves `/metrics`.
//!
//! This is a single-process deployment. Slots, rounds, the model lineage
//! and balances are all held in memory, so a restart begins a fresh
//! federation rather than resuming a partial one.

mod config;
mod routes;
mod state;

use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tokio::signal;
use tracing_subscriber::EnvFilter;

use fedchain::{
    CoordinationEngine, FedChainConfig, InMemoryCollectibleRegistry, InMemoryContributionLedger,
    InMemoryTokenLedger, MetricsRegistry, run_prometheus_http_server,
};
use config::ApiConfig;
use routes::{balances, contributions, health, models, rounds};
use state::{AppState, SharedState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("api_gateway=info,fedchain=info")),
        )
        .init();

    if let Err(e) = run().await {
        tracing::error!("fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), String> {
    let api_cfg = ApiConfig::from_env();
    let cfg = match &api_cfg.config_path {
        Some(path) => FedChainConfig::from_json_file(path).map_err(|e| e.to_string())?,
        None => FedChainConfig::default(),
    };

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new()
            .map_err(|e| format!("failed to initialise metrics registry: {e}"))?,
    );

    if cfg.metrics.enabled {
        let metrics_clone = metrics.clone();
        let addr = cfg.metrics.listen_addr;
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!("metrics HTTP server error: {e}");
            }
        });
        tracing::info!("metrics exporter listening on http://{}/metrics", addr);
    }

    // ---------------------------
    // Collaborators (administrator authority)
    // ---------------------------

    let administrator = cfg.engine.administrator_id();
    let token = Arc::new(InMemoryTokenLedger::new(administrator));
    let collectibles = Arc::new(InMemoryCollectibleRegistry::new(administrator));

    // ---------------------------
    // Contribution ledger + engine
    // ---------------------------

    let verifier = cfg.verifier.build_verifier().map_err(|e| e.to_string())?;

    let engine = CoordinationEngine::builder()
        .ledger(InMemoryContributionLedger::new())
        .reward_policy(cfg.reward.build_policy())
        .verifier(verifier)
        .token_ledger(token)
        .collectibles(collectibles)
        .config(&cfg.engine)
        .metrics(metrics.coordinator.clone())
        .build()
        .map_err(|e| e.to_string())?;

    // ---------------------------
    // Authority handoff
    // ---------------------------

    engine
        .governor()
        .hand_off_all(&administrator)
        .map_err(|e| format!("authority handoff failed: {e}"))?;
    tracing::info!(engine = %engine.engine_id(), "engine controls token ledger and collectibles");

    let app_state: SharedState = Arc::new(AppState { engine });

    // ---------------------------
    // HTTP router
    // ---------------------------

    let app = Router::new()
        .route("/health", get(health::health))
        .route("/model", get(models::current_model))
        .route("/model/history", get(models::model_history))
        .route(
            "/contributions/digest",
            post(contributions::contribution_digest),
        )
        .route("/contributions", post(contributions::submit_contribution))
        .route("/rounds/current", get(rounds::current_round))
        .route("/rounds/finalize", post(rounds::finalize_round))
        .route(
            "/rounds/{round}/participants",
            get(rounds::round_participants),
        )
        .route(
            "/rounds/{round}/rewards/{participant}",
            get(rounds::participant_reward),
        )
        .route("/balances/{account}", get(balances::balance))
        .with_state(app_state);

    // ---------------------------
    // axum 0.8 server (hyper 1 / tokio 1.48 style)
    // ---------------------------

    tracing::info!("API gateway listening on http://{}", api_cfg.listen_addr);

    let listener = tokio::net::TcpListener::bind(api_cfg.listen_addr)
        .await
        .map_err(|e| format!("failed to bind {}: {e}", api_cfg.listen_addr))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| format!("API server error: {e}"))?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
