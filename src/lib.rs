// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
#![no_std]

//! ledger-kernel: the deterministic, no_std core of the sealing ledger.
//!
//! Everything here is pure: the data model, the hash-chain linker, structural
//! validation of certified events and offline chain verification. The async
//! service that talks to the consensus store lives in `ledger-node`.

extern crate alloc;

#[cfg(test)]
#[macro_use]
extern crate std;

pub mod config;
pub mod error;
pub mod types;
pub mod link;
pub mod validate;
pub mod verify;
pub mod proof;

pub use error::{KernelError, KernelResult};
pub use link::link;
pub use proof::ChainProof;
pub use types::digest::{Digest, DIGEST_LEN, GENESIS_DIGEST};
pub use types::event::{CertifiedEvent, LedgerEntry, SealedEvent};
pub use validate::{validate_event, Limits};
pub use verify::{verify_chain, verify_link, ChainVerifier, ChainViolation};

#[cfg(test)]
pub mod tests;
