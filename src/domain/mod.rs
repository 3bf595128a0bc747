//! Domain layer - Core business logic
//!
//! Contains value objects, entities, the recorder state machine and the
//! chunked wire format. This layer has no dependencies on external systems.

pub mod config;
pub mod error;
pub mod protocol;
pub mod recording;

// Re-export common types
pub use config::AppConfig;
pub use error::*;
pub use protocol::{FrameBudget, FrameHeader};
pub use recording::{
    ChannelId, Duration, MediaSample, MediaTimestamp, MessageId, RecorderState, Segment,
    SequenceNumber,
};
