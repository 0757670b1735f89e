// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Hash Chain Linker
//!
//! Computes the digest that binds an event to its immediate predecessor.
//! BLAKE3 is the only hash used by the ledger.
//!
//! # Hash Input Structure
//! ```text
//! "ledger-seal/v1"            (domain tag)
//! sequence_number (u64 LE)
//! len(event_id)   (u64 LE)
//! event_id bytes
//! len(payload)    (u64 LE)
//! payload bytes
//! previous_hash   (32 bytes)
//! ```
//!
//! Length prefixes keep the encoding injective: `("ab", "c")` and
//! `("a", "bc")` hash differently.

use crate::config::LINK_DOMAIN;
use crate::types::digest::Digest;

/// Computes `event_hash` for the entry at `sequence_number`.
///
/// Pure and deterministic; identical inputs give identical digests on every
/// architecture.
pub fn link(sequence_number: u64, event_id: &str, payload: &[u8], previous_hash: &Digest) -> Digest {
    let mut hasher = blake3::Hasher::new();
    write_canonical(&mut hasher, sequence_number, event_id, payload, previous_hash);
    hasher.finalize().into()
}

fn write_canonical(
    hasher: &mut blake3::Hasher,
    sequence_number: u64,
    event_id: &str,
    payload: &[u8],
    previous_hash: &Digest,
) {
    hasher.update(LINK_DOMAIN);
    hasher.update(&sequence_number.to_le_bytes());

    hasher.update(&(event_id.len() as u64).to_le_bytes());
    hasher.update(event_id.as_bytes());

    hasher.update(&(payload.len() as u64).to_le_bytes());
    hasher.update(payload);

    hasher.update(previous_hash.as_bytes());
}
