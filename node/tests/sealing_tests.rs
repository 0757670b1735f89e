mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{counter, entry_count, relaxed_config, AlwaysConflict, T};
use ledger_kernel::{verify_chain, CertifiedEvent, ChainViolation, SealedEvent, GENESIS_DIGEST};
use ledger_node::errors::SealingError;
use ledger_node::reader::LedgerReader;
use ledger_node::sealing::{SealingPipeline, Stage};
use ledger_node::store::{ConsensusStore, MemoryStore};

#[tokio::test]
async fn test_seal_chain_and_replay() {
    let store = Arc::new(MemoryStore::new());
    let config = relaxed_config();
    let pipeline = SealingPipeline::new(store.clone(), &config);

    let first = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap();
    assert_eq!(first.sequence_number, 1);
    assert_eq!(first.previous_hash, GENESIS_DIGEST);
    assert!(first.is_intact());

    let second = pipeline.seal(CertifiedEvent::new("evt-2", "def")).await.unwrap();
    assert_eq!(second.sequence_number, 2);
    assert_eq!(second.previous_hash, first.event_hash);
    assert!(second.follows(&first));

    let again = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap();
    assert_eq!(again, first);
    assert_eq!(counter(&store).await, Some(b"2".to_vec()));
    assert_eq!(entry_count(&store).await, 2);

    let summary = pipeline.governor().summary();
    assert_eq!(summary.sealed, 2);
    assert_eq!(summary.replayed, 1);
}

#[tokio::test]
async fn test_stored_entry_matches_returned() {
    let store = Arc::new(MemoryStore::new());
    let config = relaxed_config();
    let pipeline = Arc::new(SealingPipeline::new(store.clone(), &config));
    let reader = LedgerReader::new(store.clone(), Arc::clone(pipeline.governor()), &config);

    let sealed = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap();
    assert_eq!(reader.get_by_sequence(1).await.unwrap(), sealed);
    assert_eq!(reader.get_by_sequence(2).await, Err(SealingError::NotFound(2)));
}

#[tokio::test]
async fn test_replay_survives_cache_loss() {
    let store = Arc::new(MemoryStore::new());
    let config = relaxed_config();

    let sealed = SealingPipeline::new(store.clone(), &config)
        .seal(CertifiedEvent::new("evt-1", "abc"))
        .await
        .unwrap();

    // A fresh pipeline starts with an empty cache and must find the durable index.
    let restarted = SealingPipeline::new(store.clone(), &config);
    let replayed = restarted.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap();
    assert_eq!(replayed, sealed);
    assert_eq!(counter(&store).await, Some(b"1".to_vec()));
    assert_eq!(restarted.governor().summary().replayed, 1);
}

#[tokio::test]
async fn test_resubmission_with_other_payload_returns_original() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = SealingPipeline::new(store.clone(), &relaxed_config());

    let sealed = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap();
    let replayed = pipeline.seal(CertifiedEvent::new("evt-1", "xyz")).await.unwrap();
    assert_eq!(replayed, sealed);
    assert_eq!(replayed.payload, b"abc".to_vec());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_distinct_submissions() {
    let store = Arc::new(MemoryStore::new());
    let config = relaxed_config();
    let pipeline = Arc::new(SealingPipeline::new(store.clone(), &config));

    let mut tasks = Vec::new();
    for i in 0..100 {
        let pipeline = Arc::clone(&pipeline);
        tasks.push(tokio::spawn(async move {
            pipeline
                .seal(CertifiedEvent::new(format!("evt-{}", i), format!("payload-{}", i)))
                .await
        }));
    }

    let mut numbers = HashSet::new();
    for task in tasks {
        let sealed = task.await.unwrap().unwrap();
        assert!(numbers.insert(sealed.sequence_number));
    }
    assert_eq!(numbers, (1..=100).collect::<HashSet<u64>>());

    let reader = LedgerReader::new(store.clone(), Arc::clone(pipeline.governor()), &config);
    let mut entries = Vec::new();
    for n in 1..=100 {
        entries.push(reader.get_by_sequence(n).await.unwrap());
    }
    let proof = verify_chain(&entries).unwrap();
    assert_eq!(proof.entry_count, 100);
    assert_eq!(proof.anchor_hash, GENESIS_DIGEST);
    assert_eq!(counter(&store).await, Some(b"100".to_vec()));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_event_id() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = Arc::new(SealingPipeline::new(store.clone(), &relaxed_config()));

    let mut tasks = Vec::new();
    for _ in 0..20 {
        let pipeline = Arc::clone(&pipeline);
        tasks.push(tokio::spawn(async move {
            pipeline.seal(CertifiedEvent::new("evt-same", "abc")).await
        }));
    }

    let mut results: Vec<SealedEvent> = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap().unwrap());
    }
    assert!(results.iter().all(|r| *r == results[0]));
    assert_eq!(results[0].sequence_number, 1);
    assert_eq!(entry_count(&store).await, 1);
}

#[tokio::test]
async fn test_invalid_input_consumes_nothing() {
    let store = Arc::new(MemoryStore::new());
    let mut config = relaxed_config();
    config.max_payload_bytes = 4;
    let pipeline = SealingPipeline::new(store.clone(), &config);

    for event in [
        CertifiedEvent::new("", "abc"),
        CertifiedEvent::new("a/b", "abc"),
        CertifiedEvent::new("evt-1", "too large"),
    ] {
        let err = pipeline.seal(event).await.unwrap_err();
        assert_eq!(err.kind(), "invalid_input");
    }
    assert_eq!(counter(&store).await, None);

    let sealed = pipeline.seal(CertifiedEvent::new("evt-1", "ok")).await.unwrap();
    assert_eq!(sealed.sequence_number, 1);
}

#[tokio::test]
async fn test_slow_store_exceeds_deadline() {
    let store = Arc::new(MemoryStore::new());
    let mut config = relaxed_config();
    config.commit_deadline = Duration::from_millis(20);
    let pipeline = SealingPipeline::new(store.clone(), &config);

    store.set_read_latency(Duration::from_millis(100));
    let err = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap_err();
    assert!(matches!(err, SealingError::DeadlineExceeded { stage: Stage::Reserve, .. }));

    store.set_read_latency(Duration::ZERO);
    store.set_write_latency(Duration::from_millis(100));
    let err = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap_err();
    assert!(matches!(err, SealingError::DeadlineExceeded { stage: Stage::Commit, .. }));

    // Abandoned before it was applied: nothing landed.
    assert_eq!(counter(&store).await, None);
    assert_eq!(pipeline.governor().summary().deadline_exceeded, 2);
}

#[tokio::test]
async fn test_landed_write_after_deadline_is_replayed() {
    let store = Arc::new(MemoryStore::new());
    let mut config = relaxed_config();
    config.commit_deadline = Duration::from_millis(20);
    let pipeline = SealingPipeline::new(store.clone(), &config);

    store.set_write_latency(Duration::from_millis(100));
    store.set_late_ack(true);
    let err = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap_err();
    assert_eq!(err.kind(), "deadline_exceeded");
    assert_eq!(counter(&store).await, Some(b"1".to_vec()));

    store.set_write_latency(Duration::ZERO);
    store.set_late_ack(false);
    let replayed = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap();
    assert_eq!(replayed.sequence_number, 1);
    assert!(replayed.is_intact());
    assert_eq!(counter(&store).await, Some(b"1".to_vec()));
    assert_eq!(entry_count(&store).await, 1);

    let next = pipeline.seal(CertifiedEvent::new("evt-2", "def")).await.unwrap();
    assert_eq!(next.sequence_number, 2);
    assert_eq!(next.previous_hash, replayed.event_hash);
}

#[tokio::test]
async fn test_store_outage() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = SealingPipeline::new(store.clone(), &relaxed_config());

    store.set_unavailable(true);
    let err = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap_err();
    assert!(matches!(err, SealingError::StoreUnavailable(_)));

    store.set_unavailable(false);
    assert_eq!(pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap().sequence_number, 1);
}

#[tokio::test]
async fn test_contention_is_bounded() {
    let store = Arc::new(AlwaysConflict(MemoryStore::new()));
    let mut config = relaxed_config();
    config.max_allocator_attempts = 3;
    let pipeline = SealingPipeline::new(store, &config);

    let err = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap_err();
    assert_eq!(err, SealingError::Contention { attempts: 3 });
}

#[tokio::test]
async fn test_shutdown_abandons_new_seals() {
    let store = Arc::new(MemoryStore::new());
    let pipeline = SealingPipeline::new(store.clone(), &relaxed_config());
    pipeline.governor().shutdown();

    let err = pipeline.seal(CertifiedEvent::new("evt-1", "abc")).await.unwrap_err();
    assert!(matches!(err, SealingError::StoreUnavailable(_)));
    assert_eq!(counter(&store).await, None);
}

#[tokio::test]
async fn test_tampered_entry_is_detected() {
    let store = Arc::new(MemoryStore::new());
    let config = relaxed_config();
    let pipeline = Arc::new(SealingPipeline::new(store.clone(), &config));
    for i in 1..=3 {
        pipeline
            .seal(CertifiedEvent::new(format!("evt-{}", i), format!("payload-{}", i)))
            .await
            .unwrap();
    }

    let key = "ledger/events/00000000000000000002";
    let mut forged: SealedEvent =
        serde_json::from_slice(&store.get(key, T).await.unwrap().unwrap().value).unwrap();
    forged.payload = b"forged".to_vec();
    assert!(store.corrupt(key, serde_json::to_vec(&forged).unwrap()).await);

    let reader = LedgerReader::new(store.clone(), Arc::clone(pipeline.governor()), &config);
    let mut entries = Vec::new();
    for n in 1..=3 {
        entries.push(reader.get_by_sequence(n).await.unwrap());
    }
    assert!(matches!(
        verify_chain(&entries),
        Err(ChainViolation::HashMismatch { sequence: 2, .. })
    ));
}
