//! segcast - segmented recording with chunked UDP delivery
//!
//! This crate captures a live camera and microphone feed, cuts it into
//! fixed-length segment files, and ships each closed segment as a message
//! of header-prefixed UDP datagrams (or hands it to a broadcast helper).
//!
//! # Architecture
//!
//! The crate follows hexagonal (ports & adapters) architecture:
//!
//! - **Domain**: Value objects, the session state machine, the wire format, and errors
//! - **Application**: Recorder, delivery queue, streaming use case, and port interfaces (traits)
//! - **Infrastructure**: Adapter implementations (ffmpeg capture, file writer, UDP, broadcast, XDG config)
//! - **CLI**: Command-line interface, argument parsing, and signal handling

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
