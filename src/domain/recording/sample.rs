//! Timestamped media samples

use std::fmt;
use std::time::Duration as StdDuration;

use serde::Serialize;

/// Presentation timescale reported by the capture layer (nanoseconds)
pub const TIMESCALE: u64 = 1_000_000_000;

/// Monotonic presentation time of a captured sample, in nanoseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize)]
#[serde(transparent)]
pub struct MediaTimestamp(u64);

impl MediaTimestamp {
    pub const ZERO: Self = Self(0);

    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    pub fn from_std(elapsed: StdDuration) -> Self {
        Self(u64::try_from(elapsed.as_nanos()).unwrap_or(u64::MAX))
    }

    pub const fn as_nanos(&self) -> u64 {
        self.0
    }

    /// Time elapsed since `earlier`, zero if `earlier` is later
    pub fn saturating_since(&self, earlier: MediaTimestamp) -> StdDuration {
        StdDuration::from_nanos(self.0.saturating_sub(earlier.0))
    }
}

impl fmt::Display for MediaTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:03}s", self.0 / TIMESCALE, (self.0 % TIMESCALE) / 1_000_000)
    }
}

/// One unit of captured media handed to the recorder.
#[derive(Debug, Clone)]
pub struct MediaSample {
    pub timestamp: MediaTimestamp,
    pub data: Vec<u8>,
}

impl MediaSample {
    pub fn new(timestamp: MediaTimestamp, data: Vec<u8>) -> Self {
        Self { timestamp, data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
