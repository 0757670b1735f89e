//! Error types.

// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
use core::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KernelError {
    /// `event_id` was empty.
    EmptyEventId,
    /// `event_id` exceeds the protocol maximum.
    EventIdTooLong { len: usize, max: usize },
    /// `event_id` contains a character that cannot appear in a store key.
    EventIdInvalidChar(char),
    /// Payload exceeds the configured maximum.
    PayloadTooLarge { len: usize, max: usize },
    /// A digest string was not 64 hex characters.
    MalformedDigest,
}

impl fmt::Display for KernelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KernelError::EmptyEventId => write!(f, "event_id must not be empty"),
            KernelError::EventIdTooLong { len, max } => {
                write!(f, "event_id is {} bytes, limit is {}", len, max)
            }
            KernelError::EventIdInvalidChar(c) => {
                write!(f, "event_id contains invalid character {:?}", c)
            }
            KernelError::PayloadTooLarge { len, max } => {
                write!(f, "payload is {} bytes, limit is {}", len, max)
            }
            KernelError::MalformedDigest => write!(f, "digest must be 64 hex characters"),
        }
    }
}

pub type KernelResult<T> = core::result::Result<T, KernelError>;
