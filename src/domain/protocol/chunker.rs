//! Splitting payloads into bounded datagrams

use super::header::{FrameHeader, HEADER_SIZE};

/// Largest datagram the transport may emit, header included.
pub const MAX_DATAGRAM_SIZE: usize = 4000;

/// Per-datagram size limit and the payload capacity it leaves after the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameBudget {
    max_datagram: usize,
}

impl FrameBudget {
    /// Returns None unless the datagram has room for at least one payload
    /// byte and stays within [`MAX_DATAGRAM_SIZE`].
    pub fn new(max_datagram: usize) -> Option<Self> {
        if max_datagram <= HEADER_SIZE || max_datagram > MAX_DATAGRAM_SIZE {
            return None;
        }
        Some(Self { max_datagram })
    }

    pub fn max_datagram(&self) -> usize {
        self.max_datagram
    }

    /// Payload bytes per frame
    pub fn capacity(&self) -> usize {
        self.max_datagram - HEADER_SIZE
    }

    /// Number of frames needed for `payload_len` bytes
    pub fn frame_count(&self, payload_len: usize) -> usize {
        payload_len.div_ceil(self.capacity())
    }

    /// Split `payload` into chunks that fit this budget
    pub fn chunks<'a>(&self, payload: &'a [u8]) -> Chunks<'a> {
        Chunks {
            payload,
            offset: 0,
            capacity: self.capacity(),
        }
    }
}

impl Default for FrameBudget {
    fn default() -> Self {
        Self {
            max_datagram: MAX_DATAGRAM_SIZE,
        }
    }
}

/// One slice of a payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Chunk<'a> {
    pub index: usize,
    pub offset: usize,
    pub data: &'a [u8],
    pub is_last: bool,
}

/// Iterator over the chunks of a payload. Empty payloads yield nothing.
#[derive(Debug, Clone)]
pub struct Chunks<'a> {
    payload: &'a [u8],
    offset: usize,
    capacity: usize,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.payload.len() {
            return None;
        }
        let len = (self.payload.len() - self.offset).min(self.capacity);
        let end = self.offset + len;
        let chunk = Chunk {
            index: self.offset / self.capacity,
            offset: self.offset,
            data: &self.payload[self.offset..end],
            is_last: end == self.payload.len(),
        };
        self.offset = end;
        Some(chunk)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = (self.payload.len() - self.offset).div_ceil(self.capacity);
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for Chunks<'_> {}

/// Prepend the header to a chunk, producing the datagram bytes
pub fn encode_frame(header: &FrameHeader, data: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(HEADER_SIZE + data.len());
    frame.extend_from_slice(&header.encode());
    frame.extend_from_slice(data);
    frame
}
