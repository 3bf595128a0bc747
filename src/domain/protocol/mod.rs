//! Chunked datagram protocol

pub mod chunker;
pub mod header;

pub use chunker::{encode_frame, Chunk, Chunks, FrameBudget, MAX_DATAGRAM_SIZE};
pub use header::{FrameHeader, DEFAULT_FLAG, DEFAULT_MESSAGE_TYPE, HEADER_SIZE, MAX_MESSAGE_TYPE};
