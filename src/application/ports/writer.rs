//! Segment writer port interfaces

use std::path::Path;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::recording::{MediaSample, MediaTimestamp};

/// Writer errors
#[derive(Debug, Clone, Error)]
pub enum WriterError {
    #[error("Failed to create segment writer: {0}")]
    CreateFailed(String),

    #[error("Failed to append sample: {0}")]
    AppendFailed(String),

    #[error("Failed to finish segment: {0}")]
    FinishFailed(String),

    #[error("Writer session has not been started")]
    SessionNotStarted,

    #[error("Writer input is marked as finished")]
    InputFinished,
}

/// Encoder/writer for one segment file.
///
/// Call order: `start_session`, any number of `append`, `end_session`,
/// `mark_as_finished`, then `finish_writing`. `finish_writing` consumes the
/// writer, so its completion is observed exactly once per segment and only
/// after every appended sample is durable.
#[async_trait]
pub trait SegmentWriter: Send {
    /// Begin the timeline of this segment at `at`
    fn start_session(&mut self, at: MediaTimestamp) -> Result<(), WriterError>;

    /// Append one sample
    async fn append(&mut self, sample: &MediaSample) -> Result<(), WriterError>;

    /// Close the timeline at `at`
    fn end_session(&mut self, at: MediaTimestamp);

    /// Refuse further samples
    fn mark_as_finished(&mut self);

    /// Flush to stable storage
    async fn finish_writing(self: Box<Self>) -> Result<(), WriterError>;
}

/// Creates a writer per segment file
#[async_trait]
pub trait WriterFactory: Send + Sync {
    /// Create a writer for the file at `path`.
    /// Fails if the output cannot be created or configured.
    async fn create(&self, path: &Path) -> Result<Box<dyn SegmentWriter>, WriterError>;
}
