// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Certified input events and sealed ledger entries.

use alloc::collections::BTreeMap;
use alloc::string::String;
use alloc::vec::Vec;

use serde::{Deserialize, Serialize};

use crate::link::link;
use crate::types::digest::Digest;
use crate::types::encoding::base64_bytes;

/// An event produced and signed by the upstream certifier.
///
/// The core never inspects `payload` or verifies `certifier_signature`; they
/// are opaque provenance carried through to the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CertifiedEvent {
    /// Producer-assigned identifier, unique per logical event.
    pub event_id: String,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    #[serde(with = "base64_bytes", default)]
    pub certifier_signature: Vec<u8>,
    /// Milliseconds since the Unix epoch, as stamped by the certifier.
    #[serde(default)]
    pub certifier_timestamp: i64,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl CertifiedEvent {
    pub fn new(event_id: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            event_id: event_id.into(),
            payload: payload.into(),
            certifier_signature: Vec::new(),
            certifier_timestamp: 0,
            metadata: BTreeMap::new(),
        }
    }
}

/// A certified event that has been assigned a position in the chain.
///
/// Created exactly once per committed event and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SealedEvent {
    pub sequence_number: u64,
    pub event_id: String,
    #[serde(with = "base64_bytes")]
    pub payload: Vec<u8>,
    pub event_hash: Digest,
    /// `event_hash` of entry `sequence_number - 1`, or the genesis digest.
    pub previous_hash: Digest,
    /// Milliseconds since the Unix epoch, assigned when the commit was issued.
    pub sealed_timestamp: i64,
    /// Milliseconds from intake until the commit was issued. Excludes the
    /// store's acknowledgement of that commit.
    pub commit_latency_ms: u64,
}

/// The durable record stored under each sequence number.
pub type LedgerEntry = SealedEvent;

impl SealedEvent {
    /// Re-derives `event_hash` from this entry's own fields.
    pub fn recompute_hash(&self) -> Digest {
        link(
            self.sequence_number,
            &self.event_id,
            &self.payload,
            &self.previous_hash,
        )
    }

    /// True if the stored `event_hash` matches the entry's contents.
    pub fn is_intact(&self) -> bool {
        self.recompute_hash() == self.event_hash
    }

    /// True if `self` directly follows `previous` in the chain.
    pub fn follows(&self, previous: &SealedEvent) -> bool {
        previous.sequence_number.checked_add(1) == Some(self.sequence_number)
            && self.previous_hash == previous.event_hash
    }
}
