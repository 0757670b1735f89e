#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use futures::future::{BoxFuture, FutureExt};
use ledger_node::config::NodeConfig;
use ledger_node::reader::LedgerReader;
use ledger_node::sealing::SealingPipeline;
use ledger_node::server::AppState;
use ledger_node::store::{ConsensusStore, MemoryStore, SharedStore, StoreResult, TxnOutcome, Versioned, WriteOp};

pub const T: Duration = Duration::from_millis(100);

/// Generous budgets so scheduling noise never trips a deadline.
pub fn relaxed_config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.commit_deadline = Duration::from_secs(5);
    config.store_op_timeout = Duration::from_secs(1);
    config.max_allocator_attempts = 10_000;
    config
}

pub fn app_state(store: SharedStore, config: &NodeConfig) -> AppState {
    let pipeline = Arc::new(SealingPipeline::new(Arc::clone(&store), config));
    let reader = Arc::new(LedgerReader::new(store, Arc::clone(pipeline.governor()), config));
    AppState::new(pipeline, reader)
}

pub async fn counter(store: &MemoryStore) -> Option<Vec<u8>> {
    store
        .get("ledger/sequence_counter", T)
        .await
        .unwrap()
        .map(|v| v.value)
}

pub async fn entry_count(store: &MemoryStore) -> usize {
    store.scan_prefix("ledger/events/").await.len()
}

/// Reads through to memory but loses every conditional write.
pub struct AlwaysConflict(pub MemoryStore);

impl ConsensusStore for AlwaysConflict {
    fn name(&self) -> &'static str {
        "always-conflict"
    }

    fn get<'a>(&'a self, key: &'a str, timeout: Duration) -> BoxFuture<'a, StoreResult<Option<Versioned>>> {
        self.0.get(key, timeout)
    }

    fn transactional_write(&self, _ops: Vec<WriteOp>, _timeout: Duration) -> BoxFuture<'_, StoreResult<TxnOutcome>> {
        futures::future::ready(Ok(TxnOutcome::Conflict)).boxed()
    }
}
