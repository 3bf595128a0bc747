//! Capture source port interface

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::mpsc;

use crate::domain::recording::MediaSample;

/// Capture errors
#[derive(Debug, Clone, Error)]
pub enum CaptureError {
    #[error("Failed to start capture: {0}")]
    StartFailed(String),

    #[error("Capture failed: {0}")]
    CaptureFailed(String),

    #[error("FFmpeg not found. Please install FFmpeg.")]
    FfmpegNotFound,

    #[error("Capture already running")]
    AlreadyRunning,
}

/// Port for a live media source (webcam + microphone)
#[async_trait]
pub trait CaptureSource: Send + Sync {
    /// Start capturing.
    ///
    /// # Returns
    /// A receiver yielding samples on a single queue, in presentation-time
    /// order, until the capture is stopped or fails.
    async fn start(&self) -> Result<mpsc::Receiver<MediaSample>, CaptureError>;

    /// Stop capturing. The sample receiver closes once pending samples drain.
    async fn stop(&self) -> Result<(), CaptureError>;
}
