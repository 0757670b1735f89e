// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! ConsensusStore Adapter Interface
//!
//! The ledger never replicates anything itself. All durable state lives in
//! an external linearizable key-value store reached through this trait:
//!
//! - `get` returns the value and its version (`0` = absent)
//! - `compare_and_swap` writes one key if its version is unchanged
//! - `transactional_write` writes many keys if all versions are unchanged
//!
//! Every call carries a caller-supplied timeout which the adapter enforces
//! itself. A call abandoned by the caller may still land server-side.

pub mod etcd;
pub mod layout;
pub mod memory;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use futures::future::BoxFuture;
use thiserror::Error;

use crate::config::StoreBackend;

pub use etcd::EtcdStore;
pub use layout::LedgerKeys;
pub use memory::MemoryStore;

/// Revision at which a key was last written. `ABSENT` for missing keys.
pub type Version = u64;

pub const ABSENT: Version = 0;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store unreachable: {0}")]
    Unavailable(String),

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("corrupt value at {key}: {reason}")]
    Corrupt { key: String, reason: String },
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Versioned {
    pub value: Vec<u8>,
    pub version: Version,
}

/// One conditional write inside a transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteOp {
    pub key: String,
    pub expected_version: Version,
    pub value: Vec<u8>,
}

impl WriteOp {
    /// Write that only succeeds if `key` does not exist yet.
    pub fn create(key: impl Into<String>, value: Vec<u8>) -> Self {
        Self {
            key: key.into(),
            expected_version: ABSENT,
            value,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxnOutcome {
    Committed,
    /// At least one key was not at its expected version; nothing was written.
    Conflict,
}

pub trait ConsensusStore: Send + Sync {
    fn name(&self) -> &'static str;

    fn get<'a>(&'a self, key: &'a str, timeout: Duration) -> BoxFuture<'a, StoreResult<Option<Versioned>>>;

    /// All-or-nothing write of `ops`, each conditioned on its expected version.
    fn transactional_write(&self, ops: Vec<WriteOp>, timeout: Duration) -> BoxFuture<'_, StoreResult<TxnOutcome>>;

    fn compare_and_swap<'a>(
        &'a self,
        key: &'a str,
        expected_version: Version,
        value: Vec<u8>,
        timeout: Duration,
    ) -> BoxFuture<'a, StoreResult<TxnOutcome>> {
        self.transactional_write(
            vec![WriteOp {
                key: key.to_string(),
                expected_version,
                value,
            }],
            timeout,
        )
    }
}

pub type SharedStore = Arc<dyn ConsensusStore>;

/// Builds the adapter selected by configuration.
pub fn connect(backend: &StoreBackend) -> SharedStore {
    match backend {
        StoreBackend::Memory => {
            tracing::warn!("Using in-process memory store: ledger is NOT durable");
            Arc::new(MemoryStore::new())
        }
        StoreBackend::Etcd { endpoints } => {
            tracing::info!("Using etcd gateway store at {:?}", endpoints);
            Arc::new(EtcdStore::new(endpoints.clone()))
        }
    }
}

/// Enforces an adapter-side timeout on a single store call.
pub(crate) async fn bounded<T, F>(timeout: Duration, fut: F) -> StoreResult<T>
where
    F: Future<Output = StoreResult<T>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(res) => res,
        Err(_) => Err(StoreError::Timeout(timeout)),
    }
}
