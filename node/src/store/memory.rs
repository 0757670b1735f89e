// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! In-process ConsensusStore.
//!
//! Linearizable by construction (one mutex over the whole keyspace) and
//! versioned like etcd: every committed transaction bumps a global revision
//! and each key it writes takes that revision as its version.
//!
//! Fault injection knobs make deadline and outage paths testable without a
//! real cluster.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use tokio::sync::Mutex;

use super::{bounded, ConsensusStore, StoreError, StoreResult, TxnOutcome, Versioned, WriteOp, ABSENT};

#[derive(Debug, Default)]
struct Keyspace {
    revision: u64,
    data: BTreeMap<String, Versioned>,
}

#[derive(Debug, Default)]
struct Faults {
    read_latency_us: AtomicU64,
    write_latency_us: AtomicU64,
    /// Apply writes immediately but hold the acknowledgement for the write latency.
    late_ack: AtomicBool,
    unavailable: AtomicBool,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    keyspace: Mutex<Keyspace>,
    faults: Faults,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_read_latency(&self, latency: Duration) {
        self.faults
            .read_latency_us
            .store(latency.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn set_write_latency(&self, latency: Duration) {
        self.faults
            .write_latency_us
            .store(latency.as_micros() as u64, Ordering::SeqCst);
    }

    /// When set, a write lands before its reply is delayed, so a caller that
    /// gives up waiting still leaves the write behind.
    pub fn set_late_ack(&self, enabled: bool) {
        self.faults.late_ack.store(enabled, Ordering::SeqCst);
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.faults.unavailable.store(unavailable, Ordering::SeqCst);
    }

    pub async fn revision(&self) -> u64 {
        self.keyspace.lock().await.revision
    }

    /// All keys under `prefix`, in key order.
    pub async fn scan_prefix(&self, prefix: &str) -> Vec<(String, Versioned)> {
        let keyspace = self.keyspace.lock().await;
        keyspace
            .data
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Overwrites a value without touching its version. Simulates tampering.
    pub async fn corrupt(&self, key: &str, value: Vec<u8>) -> bool {
        let mut keyspace = self.keyspace.lock().await;
        match keyspace.data.get_mut(key) {
            Some(slot) => {
                slot.value = value;
                true
            }
            None => false,
        }
    }

    fn check_available(&self) -> StoreResult<()> {
        if self.faults.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store marked unavailable".into()));
        }
        Ok(())
    }

    fn latency(cell: &AtomicU64) -> Duration {
        Duration::from_micros(cell.load(Ordering::SeqCst))
    }

    async fn apply(&self, ops: Vec<WriteOp>) -> TxnOutcome {
        let mut keyspace = self.keyspace.lock().await;

        let conflicted = ops.iter().any(|op| {
            let current = keyspace.data.get(&op.key).map(|v| v.version).unwrap_or(ABSENT);
            current != op.expected_version
        });
        if conflicted {
            return TxnOutcome::Conflict;
        }

        keyspace.revision += 1;
        let revision = keyspace.revision;
        for op in ops {
            keyspace.data.insert(
                op.key,
                Versioned {
                    value: op.value,
                    version: revision,
                },
            );
        }
        TxnOutcome::Committed
    }
}

async fn pause(latency: Duration) {
    if !latency.is_zero() {
        tokio::time::sleep(latency).await;
    }
}

impl ConsensusStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn get<'a>(&'a self, key: &'a str, timeout: Duration) -> BoxFuture<'a, StoreResult<Option<Versioned>>> {
        async move {
            self.check_available()?;
            let latency = Self::latency(&self.faults.read_latency_us);
            bounded(timeout, async {
                pause(latency).await;
                let keyspace = self.keyspace.lock().await;
                Ok(keyspace.data.get(key).cloned())
            })
            .await
        }
        .boxed()
    }

    fn transactional_write(&self, ops: Vec<WriteOp>, timeout: Duration) -> BoxFuture<'_, StoreResult<TxnOutcome>> {
        async move {
            self.check_available()?;
            let latency = Self::latency(&self.faults.write_latency_us);
            if self.faults.late_ack.load(Ordering::SeqCst) {
                let outcome = self.apply(ops).await;
                bounded(timeout, async {
                    pause(latency).await;
                    Ok(outcome)
                })
                .await
            } else {
                bounded(timeout, async {
                    pause(latency).await;
                    Ok(self.apply(ops).await)
                })
                .await
            }
        }
        .boxed()
    }
}
