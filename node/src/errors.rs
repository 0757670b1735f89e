// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use ledger_kernel::KernelError;
use thiserror::Error;

use crate::api::ErrorBody;
use crate::sealing::governor::Stage;
use crate::store::StoreError;

/// Every way a Seal or read can fail. Nothing else escapes the node.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SealingError {
    /// Malformed event. Never consumes a sequence number; do not retry.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Budget ran out at `stage`. The outcome is unknown: resubmit with the
    /// same `event_id`.
    #[error("Deadline exceeded during {stage} after {elapsed_ms} ms (budget {budget_ms} ms)")]
    DeadlineExceeded {
        stage: Stage,
        elapsed_ms: u64,
        budget_ms: u64,
    },

    /// Lost the counter race on every allowed attempt. Retryable.
    #[error("Sequence counter contended after {attempts} attempts")]
    Contention { attempts: u32 },

    #[error("Consensus store unavailable: {0}")]
    StoreUnavailable(String),

    #[error("No ledger entry at sequence {0}")]
    NotFound(u64),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SealingError {
    pub const DEADLINE_EXCEEDED: &'static str = "deadline_exceeded";

    /// Stable machine-readable code, used in response bodies and metric labels.
    pub fn kind(&self) -> &'static str {
        match self {
            SealingError::InvalidInput(_) => "invalid_input",
            SealingError::DeadlineExceeded { .. } => Self::DEADLINE_EXCEEDED,
            SealingError::Contention { .. } => "contention",
            SealingError::StoreUnavailable(_) => "store_unavailable",
            SealingError::NotFound(_) => "not_found",
            SealingError::Internal(_) => "internal",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            SealingError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            SealingError::DeadlineExceeded { .. } => StatusCode::GATEWAY_TIMEOUT,
            SealingError::Contention { .. } => StatusCode::CONFLICT,
            SealingError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            SealingError::NotFound(_) => StatusCode::NOT_FOUND,
            SealingError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SealingError {
    fn into_response(self) -> Response {
        let body = Json(ErrorBody {
            error: self.kind().to_string(),
            message: self.to_string(),
        });

        (self.status(), body).into_response()
    }
}

impl From<KernelError> for SealingError {
    fn from(e: KernelError) -> Self {
        SealingError::InvalidInput(e.to_string())
    }
}

impl From<StoreError> for SealingError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Corrupt { .. } => SealingError::Internal(e.to_string()),
            StoreError::Unavailable(_) | StoreError::Timeout(_) => SealingError::StoreUnavailable(e.to_string()),
        }
    }
}
