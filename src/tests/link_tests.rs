// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use crate::link::link;
use crate::types::digest::{DIGEST_LEN, GENESIS_DIGEST};

#[test]
fn test_link_determinism() {
    let h1 = link(1, "evt-1", b"abc", &GENESIS_DIGEST);
    let h2 = link(1, "evt-1", b"abc", &GENESIS_DIGEST);
    assert_eq!(h1, h2, "Identical inputs must link identically");
    assert_eq!(h1.as_bytes().len(), DIGEST_LEN);
}

#[test]
fn test_link_covers_every_field() {
    let base = link(1, "evt-1", b"abc", &GENESIS_DIGEST);

    assert_ne!(base, link(2, "evt-1", b"abc", &GENESIS_DIGEST), "sequence_number");
    assert_ne!(base, link(1, "evt-2", b"abc", &GENESIS_DIGEST), "event_id");
    assert_ne!(base, link(1, "evt-1", b"abd", &GENESIS_DIGEST), "payload");
    assert_ne!(base, link(1, "evt-1", b"abc", &base), "previous_hash");
}

#[test]
fn test_link_field_boundaries_are_unambiguous() {
    // Without length prefixes these two would hash the same byte stream.
    let a = link(7, "ab", b"c", &GENESIS_DIGEST);
    let b = link(7, "a", b"bc", &GENESIS_DIGEST);
    assert_ne!(a, b);
}

#[test]
fn test_empty_payload_links() {
    let h = link(1, "evt-empty", b"", &GENESIS_DIGEST);
    assert!(!h.is_genesis());
}

#[test]
fn test_genesis_is_all_zero() {
    assert_eq!(GENESIS_DIGEST.as_bytes(), &[0u8; DIGEST_LEN]);
    assert_eq!(
        std::format!("{}", GENESIS_DIGEST),
        "0000000000000000000000000000000000000000000000000000000000000000"
    );
}
