// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Key layout and value encoding inside the consensus store.
//!
//! ```text
//! {prefix}/sequence_counter      -> "42"            (last assigned number)
//! {prefix}/events/{n:020}        -> LedgerEntry JSON
//! {prefix}/event-ids/{event_id}  -> "42"            (durable idempotency index)
//! ```

use ledger_kernel::LedgerEntry;

use super::{StoreError, StoreResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerKeys {
    prefix: String,
}

impl LedgerKeys {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self { prefix: prefix.into() }
    }

    pub fn counter(&self) -> String {
        format!("{}/sequence_counter", self.prefix)
    }

    /// Zero-padded so lexical key order equals sequence order.
    pub fn entry(&self, sequence_number: u64) -> String {
        format!("{}/events/{:020}", self.prefix, sequence_number)
    }

    pub fn event_id(&self, event_id: &str) -> String {
        format!("{}/event-ids/{}", self.prefix, event_id)
    }
}

impl Default for LedgerKeys {
    fn default() -> Self {
        Self::new("ledger")
    }
}

pub fn encode_sequence(n: u64) -> Vec<u8> {
    n.to_string().into_bytes()
}

pub fn decode_sequence(key: &str, raw: &[u8]) -> StoreResult<u64> {
    std::str::from_utf8(raw)
        .ok()
        .and_then(|s| s.trim().parse::<u64>().ok())
        .ok_or_else(|| StoreError::Corrupt {
            key: key.to_string(),
            reason: format!("expected decimal sequence number, got {} bytes", raw.len()),
        })
}

pub fn encode_entry(key: &str, entry: &LedgerEntry) -> StoreResult<Vec<u8>> {
    serde_json::to_vec(entry).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

pub fn decode_entry(key: &str, raw: &[u8]) -> StoreResult<LedgerEntry> {
    serde_json::from_slice(raw).map_err(|e| StoreError::Corrupt {
        key: key.to_string(),
        reason: e.to_string(),
    })
}
