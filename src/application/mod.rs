//! Application layer - Use cases and port interfaces
//!
//! Contains the recording and delivery operations and the trait definitions
//! for capture, writing, and transport.

pub mod delivery;
pub mod ports;
pub mod recorder;
pub mod streaming;

// Re-export use cases
pub use delivery::{DeliveryHandle, DeliveryQueue, DeliverySummary, PendingDelivery};
pub use recorder::{AppendOutcome, RecorderConfig, RecorderError, RecorderStatus, SegmentRecorder};
pub use streaming::{
    SampleCounts, StopReason, StreamingConfig, StreamingError, StreamingSession, StreamingSummary,
};
