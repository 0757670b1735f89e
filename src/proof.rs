//! Chain Proof Structures.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use serde::{Deserialize, Serialize};

use crate::types::digest::Digest;

/// Receipt produced by walking a contiguous range of the chain.
///
/// Two verifiers that walked the same range of the same ledger produce equal
/// proofs. `anchor_hash` is the `previous_hash` of the first entry walked
/// (the genesis digest when the walk starts at sequence 1), so a partial
/// range can be stitched to an earlier proof whose `head_hash` matches it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChainProof {
    /// The version of the sealing protocol.
    pub kernel_version: u32,
    pub first_sequence: u64,
    pub last_sequence: u64,
    pub entry_count: u64,
    pub anchor_hash: Digest,
    /// `event_hash` of the last entry walked.
    pub head_hash: Digest,
}

impl ChainProof {
    /// True if `next` continues the range covered by `self`.
    pub fn extends_to(&self, next: &ChainProof) -> bool {
        self.last_sequence.checked_add(1) == Some(next.first_sequence)
            && self.head_hash == next.anchor_hash
    }
}
