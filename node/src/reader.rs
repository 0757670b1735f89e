// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Ledger Reader
//!
//! Point lookups and health, straight from the consensus store. The
//! idempotency cache is never consulted here.

use std::sync::Arc;
use std::time::Duration;

use ledger_kernel::SealedEvent;
use tokio::time::Instant;

use crate::api::HealthStatus;
use crate::config::NodeConfig;
use crate::errors::SealingError;
use crate::sealing::LatencyGovernor;
use crate::store::layout::{decode_entry, decode_sequence};
use crate::store::{LedgerKeys, SharedStore};

pub struct LedgerReader {
    store: SharedStore,
    keys: LedgerKeys,
    governor: Arc<LatencyGovernor>,
    store_timeout: Duration,
    probe_timeout: Duration,
}

impl LedgerReader {
    pub fn new(store: SharedStore, governor: Arc<LatencyGovernor>, config: &NodeConfig) -> Self {
        Self {
            store,
            keys: LedgerKeys::new(config.key_prefix.clone()),
            governor,
            store_timeout: config.store_op_timeout,
            probe_timeout: config.health_probe_timeout,
        }
    }

    pub async fn get_by_sequence(&self, sequence_number: u64) -> Result<SealedEvent, SealingError> {
        if sequence_number == 0 {
            return Err(SealingError::NotFound(0));
        }
        let key = self.keys.entry(sequence_number);
        match self.store.get(&key, self.store_timeout).await? {
            Some(v) => Ok(decode_entry(&key, &v.value)?),
            None => Err(SealingError::NotFound(sequence_number)),
        }
    }

    /// Healthy only if the counter answers within the probe timeout.
    pub async fn health_status(&self) -> HealthStatus {
        let key = self.keys.counter();
        let started = Instant::now();
        let probe = tokio::time::timeout(self.probe_timeout, self.store.get(&key, self.probe_timeout)).await;
        let probe_latency_ms = started.elapsed().as_micros() as f64 / 1000.0;

        let (healthy, status, last_sequence_number) = match probe {
            Ok(Ok(None)) => (true, "ok".to_string(), Some(0)),
            Ok(Ok(Some(v))) => match decode_sequence(&key, &v.value) {
                Ok(n) => (true, "ok".to_string(), Some(n)),
                Err(e) => (false, e.to_string(), None),
            },
            Ok(Err(e)) => (false, e.to_string(), None),
            Err(_) => (false, format!("store probe exceeded {:?}", self.probe_timeout), None),
        };

        if !healthy {
            tracing::warn!("Health probe failed: {}", status);
        }

        HealthStatus {
            healthy,
            status,
            last_sequence_number,
            store: self.store.name().to_string(),
            probe_latency_ms,
            latency: self.governor.summary(),
        }
    }
}
