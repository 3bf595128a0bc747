//! Capture infrastructure module

mod ffmpeg;

pub use ffmpeg::{CaptureSettings, FfmpegCapture, SAMPLE_CHUNK_SIZE};
