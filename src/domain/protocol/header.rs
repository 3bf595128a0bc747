//! Fixed-width ASCII frame header
//!
//! Layout (9 bytes): `<4-digit message type><1-digit flag><4-digit channel>`,
//! e.g. `440200042` for type 4402, flag 0, channel 0042. The header carries no
//! checksum and no end-of-segment marker.

use crate::domain::recording::ChannelId;

/// Size of the frame header in bytes.
pub const HEADER_SIZE: usize = 9;

/// Message type used for segment payloads.
pub const DEFAULT_MESSAGE_TYPE: u16 = 4402;

/// Flag digit used for segment payloads.
pub const DEFAULT_FLAG: u8 = 0;

pub const MAX_MESSAGE_TYPE: u16 = 9999;
pub const MAX_FLAG: u8 = 9;

/// Parsed frame header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameHeader {
    message_type: u16,
    flag: u8,
    channel: ChannelId,
}

impl FrameHeader {
    /// Build a header. Returns None if a field does not fit its width.
    pub fn new(message_type: u16, flag: u8, channel: ChannelId) -> Option<Self> {
        if message_type > MAX_MESSAGE_TYPE || flag > MAX_FLAG {
            return None;
        }
        Some(Self {
            message_type,
            flag,
            channel,
        })
    }

    /// Header for segment payloads on `channel`
    pub fn segment(channel: ChannelId) -> Self {
        Self {
            message_type: DEFAULT_MESSAGE_TYPE,
            flag: DEFAULT_FLAG,
            channel,
        }
    }

    pub fn message_type(&self) -> u16 {
        self.message_type
    }

    pub fn flag(&self) -> u8 {
        self.flag
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    /// Encode to the 9-byte ASCII representation
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        let text = format!("{:04}{:01}{}", self.message_type, self.flag, self.channel);
        let mut out = [0u8; HEADER_SIZE];
        out.copy_from_slice(text.as_bytes());
        out
    }

    /// Parse a header from the first 9 bytes of a datagram.
    /// Returns None if the buffer is too short or a field is not numeric.
    pub fn parse(data: &[u8]) -> Option<Self> {
        let raw = data.get(..HEADER_SIZE)?;
        if !raw.iter().all(u8::is_ascii_digit) {
            return None;
        }
        let text = std::str::from_utf8(raw).ok()?;

        let message_type = text[0..4].parse().ok()?;
        let flag = text[4..5].parse().ok()?;
        let channel = text[5..9].parse().ok()?;

        Self::new(message_type, flag, channel)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(n: u16) -> ChannelId {
        ChannelId::new(n).unwrap()
    }

    #[test]
    fn encode_segment_header() {
        let header = FrameHeader::segment(channel(1));
        assert_eq!(&header.encode(), b"440200001");
    }

    #[test]
    fn encode_pads_every_field() {
        let header = FrameHeader::new(7, 3, channel(42)).unwrap();
        assert_eq!(&header.encode(), b"000730042");
    }

    #[test]
    fn new_rejects_wide_fields() {
        assert!(FrameHeader::new(10_000, 0, channel(1)).is_none());
        assert!(FrameHeader::new(4402, 10, channel(1)).is_none());
    }

    #[test]
    fn parse_valid_header() {
        let h = FrameHeader::parse(b"440210999payload").unwrap();
        assert_eq!(h.message_type(), 4402);
        assert_eq!(h.flag(), 1);
        assert_eq!(h.channel(), channel(999));
    }

    #[test]
    fn parse_too_short() {
        assert!(FrameHeader::parse(b"44020").is_none());
    }

    #[test]
    fn parse_rejects_non_digits() {
        assert!(FrameHeader::parse(b"44x200001").is_none());
    }

    #[test]
    fn parse_rejects_channel_zero() {
        assert!(FrameHeader::parse(b"440200000").is_none());
    }
}
