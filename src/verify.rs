//! Offline Chain Verification.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use core::fmt;

use crate::config::KERNEL_VERSION;
use crate::proof::ChainProof;
use crate::types::digest::Digest;
use crate::types::event::SealedEvent;

/// The first problem found while walking a chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainViolation {
    /// Nothing to verify.
    Empty,
    /// Sequence numbers start at 1.
    ZeroSequence,
    /// The next entry is not `previous + 1`.
    Gap { expected: u64, found: u64 },
    /// Entry 1 does not point at the genesis digest.
    BadGenesis { found: Digest },
    /// The stored `event_hash` does not match the entry's contents.
    HashMismatch { sequence: u64, stored: Digest, computed: Digest },
    /// `previous_hash` does not match the predecessor's `event_hash`.
    BrokenLink { sequence: u64, expected: Digest, found: Digest },
}

impl fmt::Display for ChainViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChainViolation::Empty => write!(f, "no entries to verify"),
            ChainViolation::ZeroSequence => write!(f, "sequence number 0 is never assigned"),
            ChainViolation::Gap { expected, found } => {
                write!(f, "expected sequence {}, found {}", expected, found)
            }
            ChainViolation::BadGenesis { found } => {
                write!(f, "entry 1 links to {} instead of the genesis digest", found)
            }
            ChainViolation::HashMismatch { sequence, stored, computed } => write!(
                f,
                "entry {} stores hash {} but its contents hash to {}",
                sequence, stored, computed
            ),
            ChainViolation::BrokenLink { sequence, expected, found } => write!(
                f,
                "entry {} links to {}, predecessor hash is {}",
                sequence, found, expected
            ),
        }
    }
}

/// Incremental chain walker.
///
/// Feed entries in ascending order with [`ChainVerifier::push`]; the first
/// violation is returned immediately. Only the last entry's position and hash
/// are retained, so arbitrarily long chains verify in constant memory.
#[derive(Debug, Clone, Default)]
pub struct ChainVerifier {
    first: Option<(u64, Digest)>,
    last: Option<(u64, Digest)>,
    count: u64,
}

impl ChainVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, entry: &SealedEvent) -> Result<(), ChainViolation> {
        if entry.sequence_number == 0 {
            return Err(ChainViolation::ZeroSequence);
        }

        let computed = entry.recompute_hash();
        if computed != entry.event_hash {
            return Err(ChainViolation::HashMismatch {
                sequence: entry.sequence_number,
                stored: entry.event_hash,
                computed,
            });
        }

        match self.last {
            None => {
                if entry.sequence_number == 1 && !entry.previous_hash.is_genesis() {
                    return Err(ChainViolation::BadGenesis { found: entry.previous_hash });
                }
                self.first = Some((entry.sequence_number, entry.previous_hash));
            }
            Some((last_seq, last_hash)) => {
                // Nothing can follow u64::MAX; report the wrapped successor.
                let expected = last_seq.checked_add(1);
                if expected != Some(entry.sequence_number) {
                    return Err(ChainViolation::Gap {
                        expected: expected.unwrap_or(0),
                        found: entry.sequence_number,
                    });
                }
                if entry.previous_hash != last_hash {
                    return Err(ChainViolation::BrokenLink {
                        sequence: entry.sequence_number,
                        expected: last_hash,
                        found: entry.previous_hash,
                    });
                }
            }
        }

        self.last = Some((entry.sequence_number, entry.event_hash));
        self.count += 1;
        Ok(())
    }

    pub fn entries_verified(&self) -> u64 {
        self.count
    }

    pub fn finish(self) -> Result<ChainProof, ChainViolation> {
        match (self.first, self.last) {
            (Some((first_sequence, anchor_hash)), Some((last_sequence, head_hash))) => {
                Ok(ChainProof {
                    kernel_version: KERNEL_VERSION,
                    first_sequence,
                    last_sequence,
                    entry_count: self.count,
                    anchor_hash,
                    head_hash,
                })
            }
            _ => Err(ChainViolation::Empty),
        }
    }
}

/// Walks `entries` (ascending, contiguous) and returns a proof of the range.
pub fn verify_chain<'a, I>(entries: I) -> Result<ChainProof, ChainViolation>
where
    I: IntoIterator<Item = &'a SealedEvent>,
{
    let mut verifier = ChainVerifier::new();
    for entry in entries {
        verifier.push(entry)?;
    }
    verifier.finish()
}

/// Checks a single link between two adjacent entries.
pub fn verify_link(previous: &SealedEvent, next: &SealedEvent) -> Result<(), ChainViolation> {
    let mut verifier = ChainVerifier::new();
    verifier.push(previous)?;
    verifier.push(next)
}
