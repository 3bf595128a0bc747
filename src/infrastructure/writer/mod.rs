//! Segment writer infrastructure module

mod file;

pub use file::{FileSegmentWriter, FileWriterFactory};
