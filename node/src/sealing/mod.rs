// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
pub mod allocator;
pub mod governor;
pub mod idempotency;
pub mod pipeline;

pub use allocator::{AllocState, CasLoop, Reservation, SequenceAllocator};
pub use governor::{Deadline, LatencyGovernor, LatencySummary, Outcome, Stage};
pub use idempotency::{IdempotencyCache, SlotGuard};
pub use pipeline::SealingPipeline;
