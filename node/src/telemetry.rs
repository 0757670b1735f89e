// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::OnceLock;

use anyhow::Context;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Initialize telemetry (logs + metrics)
pub fn init_telemetry() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "ledger_node=debug,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .try_init()
        .context("failed to install tracing subscriber")?;

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .context("failed to install Prometheus recorder")?;

    if PROM_HANDLE.set(handle).is_err() {
        tracing::warn!("Prometheus handle already set. Telemetry re-initialized?");
    }

    metrics::describe_counter!("ledger_events_sealed_total", "Events committed to the ledger");
    metrics::describe_counter!(
        "ledger_idempotent_replays_total",
        "Submissions answered with an already sealed event"
    );
    metrics::describe_counter!("ledger_seal_rejections_total", "Failed seals, by error kind");
    metrics::describe_histogram!("ledger_seal_duration_seconds", "Wall time of a seal call");
    metrics::describe_counter!(
        "ledger_allocator_conflicts_total",
        "Conditional counter writes lost to a concurrent writer"
    );
    metrics::describe_gauge!("ledger_idempotency_entries", "Event ids held in the idempotency cache");

    metrics::gauge!("ledger_node_up", 1.0);
    Ok(())
}

/// Get the Prometheus handle to render metrics
pub fn get_metrics() -> String {
    if let Some(handle) = PROM_HANDLE.get() {
        handle.render()
    } else {
        "# metrics not initialized".to_string()
    }
}
