// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Protocol constants.

/// Version of the sealing protocol (hash input layout + store layout).
pub const KERNEL_VERSION: u32 = 1;

/// Domain separation tag prepended to every link hash input.
pub const LINK_DOMAIN: &[u8] = b"ledger-seal/v1";

/// Maximum length in bytes of a producer-assigned event identifier.
pub const MAX_EVENT_ID_LEN: usize = 256;

/// Default upper bound for an event payload (1 MiB).
pub const DEFAULT_MAX_PAYLOAD_BYTES: usize = 1 << 20;
