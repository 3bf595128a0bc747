//! Infrastructure layer - Adapter implementations
//!
//! Contains concrete implementations of the port interfaces,
//! integrating with external systems like FFmpeg, the filesystem and UDP.

pub mod capture;
pub mod config;
pub mod transport;
pub mod writer;

// Re-export adapters
pub use capture::{CaptureSettings, FfmpegCapture};
pub use config::XdgConfigStore;
pub use transport::{BroadcastTransport, ChunkedSenderConfig, ChunkedUdpSender, CommandBroadcaster};
pub use writer::FileWriterFactory;
