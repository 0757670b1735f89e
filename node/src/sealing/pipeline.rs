// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Sealing Pipeline
//!
//! `seal` takes a certified event to a committed, chained ledger entry:
//!
//! 1. validate the event structure
//! 2. claim the event's idempotency slot; a recorded result is replayed
//! 3. read the counter (and the durable event-id index) to reserve `n`
//! 4. fetch `event_hash` of entry `n - 1` (or genesis)
//! 5. link
//! 6. commit counter, entry and index in one transaction conditioned on the
//!    counter version read in 3; on conflict go back to 3
//! 7. record the result in the slot and return it
//!
//! The chain only ever grows through step 6, so a call abandoned anywhere
//! leaves either nothing or a complete, linked entry behind.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use ledger_kernel::{link, validate_event, CertifiedEvent, Digest, Limits, SealedEvent, GENESIS_DIGEST};

use crate::config::NodeConfig;
use crate::errors::SealingError;
use crate::sealing::allocator::{AllocState, SequenceAllocator};
use crate::sealing::governor::{Deadline, LatencyGovernor, Outcome, Stage};
use crate::sealing::idempotency::IdempotencyCache;
use crate::store::layout::{decode_entry, decode_sequence, encode_entry, encode_sequence};
use crate::store::{LedgerKeys, SharedStore, TxnOutcome, WriteOp};

pub struct SealingPipeline {
    store: SharedStore,
    keys: LedgerKeys,
    allocator: SequenceAllocator,
    cache: Arc<IdempotencyCache>,
    governor: Arc<LatencyGovernor>,
    limits: Limits,
    store_timeout: Duration,
}

impl SealingPipeline {
    pub fn new(store: SharedStore, config: &NodeConfig) -> Self {
        let keys = LedgerKeys::new(config.key_prefix.clone());
        let allocator = SequenceAllocator::new(
            Arc::clone(&store),
            keys.clone(),
            config.max_allocator_attempts,
            config.store_op_timeout,
        );

        Self {
            store,
            keys,
            allocator,
            cache: Arc::new(IdempotencyCache::new(config.idempotency_retention)),
            governor: Arc::new(LatencyGovernor::new(config.commit_deadline)),
            limits: config.limits(),
            store_timeout: config.store_op_timeout,
        }
    }

    pub fn cache(&self) -> &Arc<IdempotencyCache> {
        &self.cache
    }

    pub fn governor(&self) -> &Arc<LatencyGovernor> {
        &self.governor
    }

    pub fn limits(&self) -> Limits {
        self.limits
    }

    /// Seals `event` within the configured commit deadline.
    pub async fn seal(&self, event: CertifiedEvent) -> Result<SealedEvent, SealingError> {
        let deadline = self.governor.start();
        let result = self.seal_within(&event, &deadline).await;

        let outcome = match &result {
            Ok((_, true)) => Outcome::Replayed,
            Ok((_, false)) => Outcome::Sealed,
            Err(e) => {
                tracing::debug!("Seal of {} rejected: {}", event.event_id, e);
                Outcome::from(e)
            }
        };
        self.governor.observe(&deadline, outcome);

        result.map(|(sealed, _)| sealed)
    }

    /// Returns the sealed event and whether it was a replay.
    async fn seal_within(
        &self,
        event: &CertifiedEvent,
        deadline: &Deadline,
    ) -> Result<(SealedEvent, bool), SealingError> {
        deadline.checkpoint(Stage::Validate)?;
        validate_event(event, &self.limits)?;

        let mut slot = self.cache.claim(&event.event_id, deadline).await?;
        if let Some(cached) = slot.sealed() {
            warn_if_diverged(event, cached);
            tracing::debug!("Replaying {} from cache as #{}", event.event_id, cached.sequence_number);
            return Ok((cached.clone(), true));
        }

        let (sealed, replayed) = self.commit(event, deadline).await?;
        slot.record(sealed.clone());
        Ok((sealed, replayed))
    }

    async fn commit(&self, event: &CertifiedEvent, deadline: &Deadline) -> Result<(SealedEvent, bool), SealingError> {
        let index_key = self.keys.event_id(&event.event_id);
        let mut cas = self.allocator.cas_loop();

        loop {
            match cas.state() {
                AllocState::Read | AllocState::Retry => {
                    let (existing, reservation) = tokio::try_join!(
                        self.lookup_index(&index_key, deadline),
                        self.allocator.observe(deadline),
                    )?;

                    if let Some(sequence_number) = existing {
                        let landed = self.load_entry(sequence_number, deadline).await?;
                        warn_if_diverged(event, &landed);
                        tracing::info!("Event {} already sealed as #{}", event.event_id, sequence_number);
                        return Ok((landed, true));
                    }
                    cas.observed(reservation);
                }
                AllocState::AttemptSwap(reservation) => {
                    let n = reservation.sequence_number;
                    let previous_hash = self.previous_hash(n, deadline).await?;

                    deadline.checkpoint(Stage::Link)?;
                    let event_hash = link(n, &event.event_id, &event.payload, &previous_hash);

                    // Stamped before the commit is issued, so the stored entry
                    // and the returned one are byte-identical.
                    let sealed = SealedEvent {
                        sequence_number: n,
                        event_id: event.event_id.clone(),
                        payload: event.payload.clone(),
                        event_hash,
                        previous_hash,
                        sealed_timestamp: Utc::now().timestamp_millis(),
                        commit_latency_ms: deadline.elapsed_ms(),
                    };

                    let entry_key = self.keys.entry(n);
                    let extra = vec![
                        WriteOp::create(entry_key.clone(), encode_entry(&entry_key, &sealed)?),
                        WriteOp::create(index_key.clone(), encode_sequence(n)),
                    ];

                    match self.allocator.swap(deadline, reservation, extra).await? {
                        TxnOutcome::Committed => {
                            cas.swapped();
                            tracing::debug!("Sealed {} as #{} ({})", sealed.event_id, n, sealed.event_hash);
                            return Ok((sealed, false));
                        }
                        TxnOutcome::Conflict => cas.lost_race(),
                    }
                }
                AllocState::Success(_) | AllocState::Exhausted => break,
            }
        }

        tracing::warn!(
            "Giving up on {} after {} contended attempts",
            event.event_id,
            cas.attempts()
        );
        Err(SealingError::Contention {
            attempts: cas.attempts(),
        })
    }

    async fn lookup_index(&self, index_key: &str, deadline: &Deadline) -> Result<Option<u64>, SealingError> {
        let found = deadline
            .bound(Stage::Reserve, self.store_timeout, |t| self.store.get(index_key, t))
            .await?;
        match found {
            Some(v) => Ok(Some(decode_sequence(index_key, &v.value)?)),
            None => Ok(None),
        }
    }

    async fn load_entry(&self, sequence_number: u64, deadline: &Deadline) -> Result<SealedEvent, SealingError> {
        let key = self.keys.entry(sequence_number);
        let found = deadline
            .bound(Stage::Reserve, self.store_timeout, |t| self.store.get(&key, t))
            .await?;
        match found {
            Some(v) => Ok(decode_entry(&key, &v.value)?),
            None => Err(SealingError::Internal(format!(
                "entry #{} referenced by the counter or index is missing",
                sequence_number
            ))),
        }
    }

    async fn previous_hash(&self, sequence_number: u64, deadline: &Deadline) -> Result<Digest, SealingError> {
        if sequence_number == 1 {
            return Ok(GENESIS_DIGEST);
        }
        let previous = self.load_entry(sequence_number - 1, deadline).await?;
        Ok(previous.event_hash)
    }
}

fn warn_if_diverged(submitted: &CertifiedEvent, sealed: &SealedEvent) {
    if submitted.payload != sealed.payload {
        tracing::warn!(
            "Event {} resubmitted with a different payload; returning the sealed original #{}",
            submitted.event_id,
            sealed.sequence_number
        );
    }
}
