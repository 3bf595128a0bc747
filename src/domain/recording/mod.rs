//! Recording domain: channels, segments, samples and the recorder lifecycle

pub mod channel;
pub mod duration;
pub mod sample;
pub mod segment;
pub mod sequence;
pub mod session;

pub use channel::ChannelId;
pub use duration::Duration;
pub use sample::{MediaSample, MediaTimestamp};
pub use segment::{segment_file_name, segment_path, OpenSegment, Segment};
pub use sequence::{MessageId, MessageIdGenerator, SequenceNumber};
pub use session::{InvalidStateTransition, RecorderState, RecordingSession, SampleDisposition};
