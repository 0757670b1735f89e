// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sequence Allocator
//!
//! Optimistic compare-and-swap over the counter key, written as an explicit
//! state machine:
//!
//! ```text
//! Read -> AttemptSwap -> Success
//!              |
//!              +-> Retry -> Read ...      (lost the race)
//!              +-> Exhausted              (attempt bound reached)
//! ```
//!
//! The sealing pipeline drives the same machine but carries the ledger entry
//! and index writes inside the swap, so a number only exists once its entry
//! does.

use std::time::Duration;

use crate::errors::SealingError;
use crate::sealing::governor::{Deadline, Stage};
use crate::store::layout::{decode_sequence, encode_sequence};
use crate::store::{LedgerKeys, SharedStore, TxnOutcome, Version, WriteOp, ABSENT};

/// A number observed as free, valid only while the counter stays at `counter_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Reservation {
    pub sequence_number: u64,
    pub counter_version: Version,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocState {
    Read,
    AttemptSwap(Reservation),
    Success(u64),
    Retry,
    Exhausted,
}

#[derive(Debug)]
pub struct CasLoop {
    state: AllocState,
    attempts: u32,
    max_attempts: u32,
}

impl CasLoop {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: AllocState::Read,
            attempts: 0,
            max_attempts: max_attempts.max(1),
        }
    }

    pub fn state(&self) -> AllocState {
        self.state
    }

    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Read or Retry -> AttemptSwap.
    pub fn observed(&mut self, reservation: Reservation) {
        self.attempts += 1;
        self.state = AllocState::AttemptSwap(reservation);
    }

    /// AttemptSwap -> Success.
    pub fn swapped(&mut self) {
        if let AllocState::AttemptSwap(r) = self.state {
            self.state = AllocState::Success(r.sequence_number);
        }
    }

    /// AttemptSwap -> Retry, or Exhausted once the bound is reached.
    pub fn lost_race(&mut self) {
        self.state = if self.attempts >= self.max_attempts {
            AllocState::Exhausted
        } else {
            AllocState::Retry
        };
    }
}

pub struct SequenceAllocator {
    store: SharedStore,
    keys: LedgerKeys,
    max_attempts: u32,
    store_timeout: Duration,
}

impl SequenceAllocator {
    pub fn new(store: SharedStore, keys: LedgerKeys, max_attempts: u32, store_timeout: Duration) -> Self {
        Self {
            store,
            keys,
            max_attempts,
            store_timeout,
        }
    }

    pub fn cas_loop(&self) -> CasLoop {
        CasLoop::new(self.max_attempts)
    }

    /// Reads the counter and proposes the number after it.
    pub async fn observe(&self, deadline: &Deadline) -> Result<Reservation, SealingError> {
        let key = self.keys.counter();
        let current = deadline
            .bound(Stage::Reserve, self.store_timeout, |t| self.store.get(&key, t))
            .await?;

        let (last, counter_version) = match current {
            None => (0, ABSENT),
            Some(v) => (decode_sequence(&key, &v.value)?, v.version),
        };
        let sequence_number = last
            .checked_add(1)
            .ok_or_else(|| SealingError::Internal("sequence counter exhausted".into()))?;

        Ok(Reservation {
            sequence_number,
            counter_version,
        })
    }

    /// Advances the counter to the reserved number, together with `extra`
    /// writes, in one conditional transaction.
    pub async fn swap(
        &self,
        deadline: &Deadline,
        reservation: Reservation,
        extra: Vec<WriteOp>,
    ) -> Result<TxnOutcome, SealingError> {
        let key = self.keys.counter();
        let value = encode_sequence(reservation.sequence_number);

        let outcome = if extra.is_empty() {
            deadline
                .bound(Stage::Commit, self.store_timeout, |t| {
                    self.store
                        .compare_and_swap(&key, reservation.counter_version, value, t)
                })
                .await?
        } else {
            let mut ops = Vec::with_capacity(extra.len() + 1);
            ops.push(WriteOp {
                key: key.clone(),
                expected_version: reservation.counter_version,
                value,
            });
            ops.extend(extra);
            deadline
                .bound(Stage::Commit, self.store_timeout, |t| self.store.transactional_write(ops, t))
                .await?
        };

        if outcome == TxnOutcome::Conflict {
            metrics::increment_counter!("ledger_allocator_conflicts_total");
            tracing::debug!(
                "Lost counter race for sequence {} (version {})",
                reservation.sequence_number,
                reservation.counter_version
            );
        }
        Ok(outcome)
    }

    /// Claims the next number on its own, without writing an entry.
    pub async fn next(&self, deadline: &Deadline) -> Result<u64, SealingError> {
        let mut cas = self.cas_loop();
        loop {
            match cas.state() {
                AllocState::Read | AllocState::Retry => {
                    let reservation = self.observe(deadline).await?;
                    cas.observed(reservation);
                }
                AllocState::AttemptSwap(reservation) => match self.swap(deadline, reservation, Vec::new()).await? {
                    TxnOutcome::Committed => cas.swapped(),
                    TxnOutcome::Conflict => cas.lost_race(),
                },
                AllocState::Success(n) => return Ok(n),
                AllocState::Exhausted => {
                    tracing::warn!("Allocator gave up after {} attempts", cas.attempts());
                    return Err(SealingError::Contention {
                        attempts: cas.attempts(),
                    });
                }
            }
        }
    }
}
