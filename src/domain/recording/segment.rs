//! Segment entity

use std::path::{Path, PathBuf};
use std::time::Duration as StdDuration;

use serde::Serialize;

use super::channel::ChannelId;
use super::sample::MediaTimestamp;
use super::sequence::SequenceNumber;

/// Extension used for segment files
pub const SEGMENT_EXTENSION: &str = "mp4";

/// File name for a segment: `session_<channel>_<sequence>.mp4`
pub fn segment_file_name(channel: ChannelId, sequence: SequenceNumber) -> String {
    format!("session_{}_{}.{}", channel, sequence, SEGMENT_EXTENSION)
}

/// Full path of a segment inside the sessions directory
pub fn segment_path(dir: &Path, channel: ChannelId, sequence: SequenceNumber) -> PathBuf {
    dir.join(segment_file_name(channel, sequence))
}

/// A segment that is still receiving samples.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OpenSegment {
    channel: ChannelId,
    sequence: SequenceNumber,
    path: PathBuf,
    started_at: MediaTimestamp,
}

impl OpenSegment {
    pub fn new(
        channel: ChannelId,
        sequence: SequenceNumber,
        path: impl Into<PathBuf>,
        started_at: MediaTimestamp,
    ) -> Self {
        Self {
            channel,
            sequence,
            path: path.into(),
            started_at,
        }
    }

    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn started_at(&self) -> MediaTimestamp {
        self.started_at
    }

    /// Close the segment. The end is clamped so it never precedes the start.
    pub fn finalize(self, end: MediaTimestamp) -> Segment {
        Segment {
            channel: self.channel,
            sequence: self.sequence,
            path: self.path,
            started_at: self.started_at,
            ended_at: end.max(self.started_at),
        }
    }
}

/// A closed, immutable segment ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Segment {
    channel: ChannelId,
    sequence: SequenceNumber,
    path: PathBuf,
    started_at: MediaTimestamp,
    ended_at: MediaTimestamp,
}

impl Segment {
    pub fn channel(&self) -> ChannelId {
        self.channel
    }

    pub fn sequence(&self) -> SequenceNumber {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn started_at(&self) -> MediaTimestamp {
        self.started_at
    }

    pub fn ended_at(&self) -> MediaTimestamp {
        self.ended_at
    }

    pub fn duration(&self) -> StdDuration {
        self.ended_at.saturating_since(self.started_at)
    }

    /// File name component of the segment path
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channel(n: u16) -> ChannelId {
        ChannelId::new(n).unwrap()
    }

    #[test]
    fn file_name_pads_channel_and_sequence() {
        let name = segment_file_name(channel(42), SequenceNumber::FIRST);
        assert_eq!(name, "session_0042_0001.mp4");
    }

    #[test]
    fn segment_path_joins_directory() {
        let path = segment_path(Path::new("/tmp/sessions"), channel(7), SequenceNumber::FIRST.next());
        assert_eq!(path, PathBuf::from("/tmp/sessions/session_0007_0002.mp4"));
    }

    #[test]
    fn finalize_keeps_identity() {
        let open = OpenSegment::new(
            channel(5),
            SequenceNumber::FIRST,
            "/tmp/session_0005_0001.mp4",
            MediaTimestamp::from_nanos(1_000),
        );
        let segment = open.finalize(MediaTimestamp::from_nanos(4_000));

        assert_eq!(segment.channel(), channel(5));
        assert_eq!(segment.sequence(), SequenceNumber::FIRST);
        assert_eq!(segment.file_name(), "session_0005_0001.mp4");
        assert_eq!(segment.duration(), StdDuration::from_nanos(3_000));
    }

    #[test]
    fn finalize_clamps_end_before_start() {
        let open = OpenSegment::new(
            channel(5),
            SequenceNumber::FIRST,
            "/tmp/a.mp4",
            MediaTimestamp::from_nanos(9_000),
        );
        let segment = open.finalize(MediaTimestamp::from_nanos(1_000));
        assert_eq!(segment.ended_at(), segment.started_at());
        assert_eq!(segment.duration(), StdDuration::ZERO);
    }
}
