// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Structural validation of certified events.
//!
//! Runs before any sequence number is consumed. Business validation of the
//! payload belongs to the certifier.

use crate::config::{DEFAULT_MAX_PAYLOAD_BYTES, MAX_EVENT_ID_LEN};
use crate::error::{KernelError, KernelResult};
use crate::types::event::CertifiedEvent;

/// Size limits applied at intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    pub max_payload_bytes: usize,
    pub max_event_id_bytes: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_payload_bytes: DEFAULT_MAX_PAYLOAD_BYTES,
            max_event_id_bytes: MAX_EVENT_ID_LEN,
        }
    }
}

/// Rejects events that cannot be sealed.
///
/// `event_id` becomes a store key segment, so `/` and control characters
/// are refused along with empty or oversized ids.
pub fn validate_event(event: &CertifiedEvent, limits: &Limits) -> KernelResult<()> {
    let id = event.event_id.as_str();
    if id.is_empty() {
        return Err(KernelError::EmptyEventId);
    }
    if id.len() > limits.max_event_id_bytes {
        return Err(KernelError::EventIdTooLong {
            len: id.len(),
            max: limits.max_event_id_bytes,
        });
    }
    if let Some(c) = id.chars().find(|c| *c == '/' || c.is_control()) {
        return Err(KernelError::EventIdInvalidChar(c));
    }
    if event.payload.len() > limits.max_payload_bytes {
        return Err(KernelError::PayloadTooLarge {
            len: event.payload.len(),
            max: limits.max_payload_bytes,
        });
    }
    Ok(())
}
