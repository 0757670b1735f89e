// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Idempotency Cache
//!
//! One async mutex per `event_id`, so check-then-record is serialized per
//! id while unrelated ids never touch the same lock. A second caller with
//! the same id parks on the slot until the first finishes, then reads its
//! result.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use ledger_kernel::SealedEvent;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::time::Instant;

use crate::errors::SealingError;
use crate::sealing::governor::{Deadline, Stage};

#[derive(Debug, Default)]
struct Slot {
    sealed: Option<(SealedEvent, Instant)>,
}

impl Slot {
    fn live(&self, retention: Duration) -> Option<&SealedEvent> {
        match &self.sealed {
            Some((sealed, at)) if at.elapsed() < retention => Some(sealed),
            _ => None,
        }
    }
}

/// Exclusive hold on one `event_id` for the duration of a Seal.
pub struct SlotGuard {
    guard: OwnedMutexGuard<Slot>,
    retention: Duration,
}

impl SlotGuard {
    /// The unexpired result recorded for this id, if any.
    pub fn sealed(&self) -> Option<&SealedEvent> {
        self.guard.live(self.retention)
    }

    pub fn record(&mut self, sealed: SealedEvent) {
        self.guard.sealed = Some((sealed, Instant::now()));
    }
}

pub struct IdempotencyCache {
    slots: DashMap<String, Arc<Mutex<Slot>>>,
    retention: Duration,
}

impl IdempotencyCache {
    pub fn new(retention: Duration) -> Self {
        Self {
            slots: DashMap::new(),
            retention,
        }
    }

    /// Takes the per-id lock, waiting at most until `deadline`.
    pub async fn claim(&self, event_id: &str, deadline: &Deadline) -> Result<SlotGuard, SealingError> {
        // The map shard lock is released at the end of this statement, before any await.
        let slot = Arc::clone(&*self.slots.entry(event_id.to_string()).or_default());
        let guard = deadline.wait(Stage::Idempotency, slot.lock_owned()).await?;
        Ok(SlotGuard {
            guard,
            retention: self.retention,
        })
    }

    /// Non-blocking read. A slot held by an in-flight Seal reads as a miss.
    pub fn lookup(&self, event_id: &str) -> Option<SealedEvent> {
        let slot = Arc::clone(self.slots.get(event_id)?.value());
        let guard = slot.try_lock().ok()?;
        guard.live(self.retention).cloned()
    }

    pub async fn record(&self, event_id: &str, sealed: SealedEvent) {
        let slot = Arc::clone(&*self.slots.entry(event_id.to_string()).or_default());
        slot.lock().await.sealed = Some((sealed, Instant::now()));
    }

    /// Drops slots that are expired or empty and not held by anyone.
    /// Returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| {
            if Arc::strong_count(slot) > 1 {
                return true;
            }
            match slot.try_lock() {
                Ok(guard) => guard.live(self.retention).is_some(),
                Err(_) => true,
            }
        });
        before.saturating_sub(self.slots.len())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ledger_kernel::{link, GENESIS_DIGEST};
    use tokio_util::sync::CancellationToken;

    fn sealed(id: &str) -> SealedEvent {
        SealedEvent {
            sequence_number: 1,
            event_id: id.to_string(),
            payload: b"abc".to_vec(),
            event_hash: link(1, id, b"abc", &GENESIS_DIGEST),
            previous_hash: GENESIS_DIGEST,
            sealed_timestamp: 0,
            commit_latency_ms: 1,
        }
    }

    fn deadline(ms: u64) -> Deadline {
        Deadline::new(Duration::from_millis(ms), CancellationToken::new())
    }

    #[tokio::test]
    async fn test_claim_record_lookup() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        assert_eq!(cache.lookup("evt-1"), None);

        let mut slot = cache.claim("evt-1", &deadline(1000)).await.unwrap();
        assert!(slot.sealed().is_none());
        // Held slots read as a miss.
        assert_eq!(cache.lookup("evt-1"), None);
        slot.record(sealed("evt-1"));
        drop(slot);

        assert_eq!(cache.lookup("evt-1"), Some(sealed("evt-1")));
        let again = cache.claim("evt-1", &deadline(1000)).await.unwrap();
        assert_eq!(again.sealed(), Some(&sealed("evt-1")));
    }

    #[tokio::test]
    async fn test_second_claim_waits_for_first() {
        let cache = Arc::new(IdempotencyCache::new(Duration::from_secs(60)));
        let mut first = cache.claim("evt-1", &deadline(1000)).await.unwrap();

        let waiter = {
            let cache = Arc::clone(&cache);
            tokio::spawn(async move {
                let slot = cache.claim("evt-1", &deadline(1000)).await.unwrap();
                slot.sealed().cloned()
            })
        };

        tokio::time::sleep(Duration::from_millis(20)).await;
        first.record(sealed("evt-1"));
        drop(first);

        assert_eq!(waiter.await.unwrap(), Some(sealed("evt-1")));
    }

    #[tokio::test]
    async fn test_waiter_respects_its_deadline() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let _held = cache.claim("evt-1", &deadline(1000)).await.unwrap();

        let res = cache.claim("evt-1", &deadline(10)).await;
        assert!(matches!(res, Err(SealingError::DeadlineExceeded { stage: Stage::Idempotency, .. })));
    }

    #[tokio::test]
    async fn test_unrelated_ids_do_not_block() {
        let cache = IdempotencyCache::new(Duration::from_secs(60));
        let _a = cache.claim("evt-a", &deadline(1000)).await.unwrap();
        assert!(cache.claim("evt-b", &deadline(10)).await.is_ok());
    }

    #[tokio::test]
    async fn test_retention_and_purge() {
        let cache = IdempotencyCache::new(Duration::from_millis(10));
        cache.record("evt-1", sealed("evt-1")).await;
        cache.record("evt-2", sealed("evt-2")).await;
        assert_eq!(cache.len(), 2);

        let held = cache.claim("evt-2", &deadline(1000)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        assert_eq!(cache.lookup("evt-1"), None);
        assert!(held.sealed().is_none());
        // evt-2 is still referenced by `held`.
        assert_eq!(cache.purge_expired(), 1);
        assert_eq!(cache.len(), 1);

        drop(held);
        assert_eq!(cache.purge_expired(), 1);
        assert!(cache.is_empty());
    }
}
