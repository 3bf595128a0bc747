//! Port interfaces (traits) for external systems
//!
//! These traits define the boundaries between the application
//! and infrastructure layers.

pub mod broadcaster;
pub mod capture;
pub mod config;
pub mod transport;
pub mod writer;

// Re-export common types
pub use broadcaster::Broadcaster;
pub use capture::{CaptureError, CaptureSource};
pub use config::ConfigStore;
pub use transport::{DeliveryReport, SegmentTransport, TransportError};
pub use writer::{SegmentWriter, WriterError, WriterFactory};
