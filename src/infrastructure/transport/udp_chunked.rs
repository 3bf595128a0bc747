//! Header-prefixed UDP datagram transport
//!
//! Each segment file is read whole, cut into chunks that fit one datagram
//! together with the 9-byte header, and sent to a fixed destination with a
//! fixed pause between datagrams. Nothing is acknowledged or retried; a
//! failed send is logged and the loop moves on to the next chunk.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use async_trait::async_trait;
use tokio::fs;
use tokio::net::UdpSocket;
use tracing::{debug, trace, warn};

use crate::application::ports::{DeliveryReport, SegmentTransport, TransportError};
use crate::domain::config::AppConfig;
use crate::domain::protocol::{encode_frame, FrameBudget, FrameHeader, DEFAULT_FLAG};
use crate::domain::recording::{ChannelId, MessageId, Segment};

/// Progress callback: (frames handled, total frames)
pub type FrameProgress = Arc<dyn Fn(usize, usize) + Send + Sync>;

/// Sender settings
#[derive(Debug, Clone)]
pub struct ChunkedSenderConfig {
    pub destination: SocketAddr,
    pub message_type: u16,
    /// Pause after each datagram except the last
    pub frame_delay: StdDuration,
    pub budget: FrameBudget,
}

impl ChunkedSenderConfig {
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            destination: config.destination_or_default(),
            message_type: config.message_type_or_default(),
            frame_delay: StdDuration::from_micros(config.frame_delay_us_or_default()),
            budget: config.frame_budget_or_default(),
        }
    }
}

impl Default for ChunkedSenderConfig {
    fn default() -> Self {
        Self::from_app_config(&AppConfig::empty())
    }
}

/// UDP sender for the chunked segment protocol
pub struct ChunkedUdpSender {
    config: ChunkedSenderConfig,
    progress: Option<FrameProgress>,
}

impl ChunkedUdpSender {
    pub fn new(config: ChunkedSenderConfig) -> Self {
        Self {
            config,
            progress: None,
        }
    }

    /// Report progress after every datagram
    pub fn with_progress(mut self, progress: FrameProgress) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn config(&self) -> &ChunkedSenderConfig {
        &self.config
    }

    /// Read `path` fully and send it as one message
    pub async fn send_file(
        &self,
        path: &Path,
        channel: ChannelId,
        message_id: MessageId,
    ) -> Result<DeliveryReport, TransportError> {
        let payload = fs::read(path)
            .await
            .map_err(|e| TransportError::ReadFailed(format!("{}: {}", path.display(), e)))?;
        self.send_bytes(&payload, channel, message_id).await
    }

    /// Send `payload` as a run of header-prefixed datagrams.
    ///
    /// An empty payload sends nothing. `message_id` is only reported; the
    /// header has no field for it.
    pub async fn send_bytes(
        &self,
        payload: &[u8],
        channel: ChannelId,
        message_id: MessageId,
    ) -> Result<DeliveryReport, TransportError> {
        let header = FrameHeader::new(self.config.message_type, DEFAULT_FLAG, channel)
            .ok_or_else(|| {
                TransportError::Unavailable(format!(
                    "message type {} does not fit the header",
                    self.config.message_type
                ))
            })?;

        let socket = bind_for(self.config.destination).await?;
        let budget = self.config.budget;
        let chunks = budget.chunks(payload);
        let total = chunks.len();

        let mut report = DeliveryReport {
            message_id,
            channel,
            bytes: payload.len(),
            frames_sent: 0,
            frames_failed: 0,
        };

        debug!(
            %channel,
            %message_id,
            bytes = payload.len(),
            frames = total,
            destination = %self.config.destination,
            "sending segment"
        );

        for chunk in chunks {
            let frame = encode_frame(&header, chunk.data);
            match socket.send_to(&frame, self.config.destination).await {
                Ok(_) => {
                    report.frames_sent += 1;
                    trace!(index = chunk.index, offset = chunk.offset, len = frame.len(), "frame sent");
                }
                Err(e) => {
                    report.frames_failed += 1;
                    warn!(
                        %channel,
                        index = chunk.index,
                        offset = chunk.offset,
                        error = %e,
                        "frame send failed"
                    );
                }
            }

            if let Some(progress) = &self.progress {
                progress(chunk.index + 1, total);
            }

            if !chunk.is_last {
                pause(self.config.frame_delay).await;
            }
        }

        Ok(report)
    }
}

impl Default for ChunkedUdpSender {
    fn default() -> Self {
        Self::new(ChunkedSenderConfig::default())
    }
}

#[async_trait]
impl SegmentTransport for ChunkedUdpSender {
    async fn deliver(
        &self,
        segment: &Segment,
        message_id: MessageId,
    ) -> Result<DeliveryReport, TransportError> {
        self.send_file(segment.path(), segment.channel(), message_id)
            .await
    }
}

/// Ephemeral local socket in the destination's address family
async fn bind_for(destination: SocketAddr) -> Result<UdpSocket, TransportError> {
    let local: SocketAddr = match destination {
        SocketAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        SocketAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    UdpSocket::bind(local)
        .await
        .map_err(|e| TransportError::Unavailable(format!("cannot bind UDP socket: {}", e)))
}

async fn pause(delay: StdDuration) {
    if delay.is_zero() {
        tokio::task::yield_now().await;
    } else {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::config::DEFAULT_DESTINATION;
    use crate::domain::protocol::{DEFAULT_MESSAGE_TYPE, HEADER_SIZE};
    use std::sync::atomic::{AtomicUsize, Ordering};

    async fn receiver() -> (UdpSocket, SocketAddr) {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();
        (socket, addr)
    }

    fn sender_to(destination: SocketAddr) -> ChunkedUdpSender {
        ChunkedUdpSender::new(ChunkedSenderConfig {
            destination,
            message_type: DEFAULT_MESSAGE_TYPE,
            frame_delay: StdDuration::ZERO,
            budget: FrameBudget::default(),
        })
    }

    async fn recv_frames(socket: &UdpSocket, count: usize) -> Vec<Vec<u8>> {
        let mut frames = Vec::new();
        let mut buf = vec![0u8; 65536];
        for _ in 0..count {
            let (n, _) = tokio::time::timeout(StdDuration::from_secs(5), socket.recv_from(&mut buf))
                .await
                .unwrap()
                .unwrap();
            frames.push(buf[..n].to_vec());
        }
        frames
    }

    #[tokio::test]
    async fn splits_file_into_header_prefixed_datagrams() {
        let (rx, addr) = receiver().await;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session_0042_0001.mp4");
        let payload: Vec<u8> = (0..10_009u32).map(|i| (i % 251) as u8).collect();
        std::fs::write(&path, &payload).unwrap();
        let channel = ChannelId::new(42).unwrap();

        let report = sender_to(addr)
            .send_file(&path, channel, MessageId::new(1))
            .await
            .unwrap();

        assert_eq!(report.frames_sent, 3);
        assert_eq!(report.frames_failed, 0);
        assert_eq!(report.bytes, 10_009);

        let frames = recv_frames(&rx, 3).await;
        let sizes: Vec<usize> = frames.iter().map(Vec::len).collect();
        assert_eq!(sizes, vec![4000, 4000, 2036]);

        let mut reassembled = Vec::new();
        for frame in &frames {
            assert_eq!(&frame[..HEADER_SIZE], b"440200042");
            let header = FrameHeader::parse(frame).unwrap();
            assert_eq!(header.channel(), channel);
            reassembled.extend_from_slice(&frame[HEADER_SIZE..]);
        }
        assert_eq!(reassembled, payload);
    }

    #[tokio::test]
    async fn empty_payload_sends_nothing() {
        let (_rx, addr) = receiver().await;
        let report = sender_to(addr)
            .send_bytes(&[], ChannelId::new(1).unwrap(), MessageId::new(1))
            .await
            .unwrap();

        assert_eq!(report.frames_sent, 0);
        assert_eq!(report.bytes, 0);
    }

    #[tokio::test]
    async fn exact_capacity_fits_one_frame() {
        let (rx, addr) = receiver().await;
        let payload = vec![7u8; FrameBudget::default().capacity()];

        let report = sender_to(addr)
            .send_bytes(&payload, ChannelId::new(3).unwrap(), MessageId::new(5))
            .await
            .unwrap();

        assert_eq!(report.frames_sent, 1);
        assert_eq!(recv_frames(&rx, 1).await[0].len(), 4000);
    }

    #[tokio::test]
    async fn progress_reports_every_frame() {
        let (_rx, addr) = receiver().await;
        let calls = Arc::new(AtomicUsize::new(0));
        let last_total = Arc::new(AtomicUsize::new(0));
        let progress: FrameProgress = {
            let calls = Arc::clone(&calls);
            let last_total = Arc::clone(&last_total);
            Arc::new(move |_, total| {
                calls.fetch_add(1, Ordering::SeqCst);
                last_total.store(total, Ordering::SeqCst);
            })
        };

        sender_to(addr)
            .with_progress(progress)
            .send_bytes(&[1u8; 9000], ChannelId::new(1).unwrap(), MessageId::new(1))
            .await
            .unwrap();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(last_total.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn missing_file_is_a_read_failure() {
        let (_rx, addr) = receiver().await;
        let result = sender_to(addr)
            .send_file(
                Path::new("/nonexistent/session_0001_0001.mp4"),
                ChannelId::new(1).unwrap(),
                MessageId::new(1),
            )
            .await;

        assert!(matches!(result, Err(TransportError::ReadFailed(_))));
    }

    #[tokio::test]
    async fn oversized_message_type_is_refused() {
        let (_rx, addr) = receiver().await;
        let mut sender = sender_to(addr);
        sender.config.message_type = 10_000;

        let result = sender
            .send_bytes(b"x", ChannelId::new(1).unwrap(), MessageId::new(1))
            .await;

        assert!(matches!(result, Err(TransportError::Unavailable(_))));
    }

    #[test]
    fn config_defaults_match_protocol_constants() {
        let config = ChunkedSenderConfig::default();
        assert_eq!(config.destination.to_string(), DEFAULT_DESTINATION);
        assert_eq!(config.message_type, DEFAULT_MESSAGE_TYPE);
        assert_eq!(config.frame_delay, StdDuration::from_micros(1000));
        assert_eq!(config.budget.max_datagram(), 4000);
    }
}
