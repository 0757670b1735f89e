#[cfg(test)]
// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod link_tests;

use std::string::ToString;
use std::vec::Vec;

use crate::link::link;
use crate::types::digest::{Digest, GENESIS_DIGEST};
use crate::types::event::SealedEvent;

/// Seals `payload` at `sequence_number` on top of `previous_hash`.
pub(crate) fn sealed(sequence_number: u64, event_id: &str, payload: &[u8], previous_hash: Digest) -> SealedEvent {
    SealedEvent {
        sequence_number,
        event_id: event_id.to_string(),
        payload: payload.to_vec(),
        event_hash: link(sequence_number, event_id, payload, &previous_hash),
        previous_hash,
        sealed_timestamp: 1_700_000_000_000 + sequence_number as i64,
        commit_latency_ms: 3,
    }
}

/// A valid chain `1..=len` with distinct ids and payloads.
pub(crate) fn build_chain(len: u64) -> Vec<SealedEvent> {
    let mut chain = Vec::new();
    let mut previous = GENESIS_DIGEST;
    for seq in 1..=len {
        let entry = sealed(seq, &format!("evt-{}", seq), format!("payload-{}", seq).as_bytes(), previous);
        previous = entry.event_hash;
        chain.push(entry);
    }
    chain
}
