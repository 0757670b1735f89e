// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use anyhow::Context;
use ledger_node::config::NodeConfig;
use ledger_node::reader::LedgerReader;
use ledger_node::sealing::SealingPipeline;
use ledger_node::server::{build_router, AppState};
use ledger_node::{store, telemetry};
use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cfg = NodeConfig::from_env().context("invalid configuration")?;
    telemetry::init_telemetry()?;

    tracing::info!("Initializing Ledger Node with config: {:?}", cfg);

    let store = store::connect(&cfg.store);
    let pipeline = Arc::new(SealingPipeline::new(Arc::clone(&store), &cfg));
    let reader = Arc::new(LedgerReader::new(store, Arc::clone(pipeline.governor()), &cfg));

    let health = reader.health_status().await;
    if health.healthy {
        tracing::info!(
            "Store reachable, last sequence number {:?}",
            health.last_sequence_number
        );
    } else {
        tracing::warn!("Store not reachable at startup: {}", health.status);
    }

    // Sweep expired idempotency slots
    let cache = Arc::clone(pipeline.cache());
    let sweep_every = cfg.idempotency_sweep_interval;
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            let purged = cache.purge_expired();
            if purged > 0 {
                tracing::debug!("Purged {} idempotency slots", purged);
            }
            metrics::gauge!("ledger_idempotency_entries", cache.len() as f64);
        }
    });

    let app = build_router(AppState::new(Arc::clone(&pipeline), reader), cfg.auth_token.clone());

    let addr = cfg.bind_addr;
    tracing::info!("Listening on {}", addr);
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;

    let governor = Arc::clone(pipeline.governor());
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
            governor.shutdown();
        })
        .await
        .context("server error")?;

    metrics::gauge!("ledger_node_up", 0.0);
    tracing::info!("Shut down cleanly");
    Ok(())
}
