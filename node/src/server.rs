// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{DefaultBodyLimit, Path, Request as AxumRequest, State};
use axum::http::header::AUTHORIZATION;
use axum::http::StatusCode;
use axum::middleware::{from_fn_with_state, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use ledger_kernel::{CertifiedEvent, SealedEvent};
use tower_http::trace::TraceLayer;

use crate::api::HealthStatus;
use crate::errors::SealingError;
use crate::reader::LedgerReader;
use crate::sealing::SealingPipeline;

/// Shared by every handler. Seals for different event ids never contend on
/// anything in here.
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<SealingPipeline>,
    pub reader: Arc<LedgerReader>,
}

impl AppState {
    pub fn new(pipeline: Arc<SealingPipeline>, reader: Arc<LedgerReader>) -> Self {
        Self { pipeline, reader }
    }
}

async fn auth_guard(
    State(token): State<Arc<String>>,
    req: AxumRequest,
    next: Next,
) -> Result<Response, StatusCode> {
    let provided = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|val| val.to_str().ok())
        .and_then(|val| val.strip_prefix("Bearer "));

    match provided {
        Some(provided) if provided == token.as_str() => Ok(next.run(req).await),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

/// JSON bodies carry the payload base64 encoded, next to the id, signature
/// and metadata.
const ENVELOPE_HEADROOM: usize = 64 * 1024;

/// Largest request body that can still hold a payload of `max_payload_bytes`.
pub fn request_body_limit(max_payload_bytes: usize) -> usize {
    max_payload_bytes
        .div_ceil(3)
        .saturating_mul(4)
        .saturating_add(ENVELOPE_HEADROOM)
}

pub fn build_router(state: AppState, auth_token: Option<String>) -> Router {
    let body_limit = request_body_limit(state.pipeline.limits().max_payload_bytes);
    let mut events = Router::new()
        .route("/v1/events", post(submit_event))
        .route("/v1/events/:sequence_number", get(get_event))
        .layer(DefaultBodyLimit::max(body_limit));

    if let Some(token) = auth_token {
        tracing::info!("Auth Enabled: Bearer token required");
        events = events.layer(from_fn_with_state(Arc::new(token), auth_guard));
    } else {
        tracing::warn!("Auth Disabled: No token configured");
    }

    Router::new()
        .merge(events)
        .route("/v1/health", get(health))
        .route("/metrics", get(metrics_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn submit_event(
    State(state): State<AppState>,
    body: Result<Json<CertifiedEvent>, JsonRejection>,
) -> Result<Json<SealedEvent>, SealingError> {
    let Json(event) = body.map_err(|rejection| SealingError::InvalidInput(rejection.body_text()))?;
    let sealed = state.pipeline.seal(event).await?;
    Ok(Json(sealed))
}

async fn get_event(
    State(state): State<AppState>,
    path: Result<Path<u64>, PathRejection>,
) -> Result<Json<SealedEvent>, SealingError> {
    let Path(sequence_number) = path.map_err(|rejection| SealingError::InvalidInput(rejection.body_text()))?;
    let entry = state.reader.get_by_sequence(sequence_number).await?;
    Ok(Json(entry))
}

async fn health(State(state): State<AppState>) -> (StatusCode, Json<HealthStatus>) {
    let status = state.reader.health_status().await;
    let code = if status.healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (code, Json(status))
}

async fn metrics_handler() -> impl IntoResponse {
    crate::telemetry::get_metrics()
}
