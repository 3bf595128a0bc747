//! Segment transport infrastructure module
//!
//! Two delivery modes: header-prefixed UDP datagrams sent from this process,
//! or the whole file handed to an external broadcast helper.

mod broadcast;
mod udp_chunked;

pub use broadcast::{BroadcastTransport, CommandBroadcaster};
pub use udp_chunked::{ChunkedSenderConfig, ChunkedUdpSender, FrameProgress};
