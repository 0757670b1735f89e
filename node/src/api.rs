// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

use crate::sealing::LatencySummary;

// Submissions are `ledger_kernel::CertifiedEvent` and successes are
// `ledger_kernel::SealedEvent`, both used directly as JSON bodies.

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthStatus {
    pub healthy: bool,
    /// `"ok"`, or why the probe failed.
    pub status: String,
    /// `None` when the counter could not be read.
    pub last_sequence_number: Option<u64>,
    pub store: String,
    pub probe_latency_ms: f64,
    pub latency: LatencySummary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
}
