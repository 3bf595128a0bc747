//! Segment sequence numbers and transport message ids

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use serde::Serialize;

/// Position of a segment within its channel. Starts at 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct SequenceNumber(u32);

impl SequenceNumber {
    pub const FIRST: Self = Self(1);

    pub const fn value(&self) -> u32 {
        self.0
    }

    pub const fn next(&self) -> Self {
        Self(self.0 + 1)
    }
}

impl Default for SequenceNumber {
    fn default() -> Self {
        Self::FIRST
    }
}

impl fmt::Display for SequenceNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Identifier attached to each delivery handed to the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct MessageId(u32);

impl MessageId {
    pub const fn new(value: u32) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}", self.0)
    }
}

/// Hands out strictly increasing message ids, starting at 1.
///
/// Safe to share between tasks; two callers never observe the same id.
#[derive(Debug)]
pub struct MessageIdGenerator {
    next: AtomicU32,
}

impl MessageIdGenerator {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first: u32) -> Self {
        Self {
            next: AtomicU32::new(first),
        }
    }

    pub fn next_id(&self) -> MessageId {
        MessageId(self.next.fetch_add(1, Ordering::SeqCst))
    }
}

impl Default for MessageIdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
