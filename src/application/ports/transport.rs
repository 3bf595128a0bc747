//! Segment transport port interface

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;

use crate::domain::recording::{ChannelId, MessageId, Segment};

/// Transport errors
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("Failed to send: {0}")]
    SendFailure(String),

    #[error("Failed to read segment file: {0}")]
    ReadFailed(String),

    #[error("Transport unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of one delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryReport {
    pub message_id: MessageId,
    pub channel: ChannelId,
    /// Payload bytes handed to the transport
    pub bytes: usize,
    /// Datagrams accepted by the socket
    pub frames_sent: usize,
    /// Datagrams whose send call failed
    pub frames_failed: usize,
}

/// Port for best-effort delivery of closed segments.
///
/// Implementations are stateless per call. No acknowledgment, no retry.
#[async_trait]
pub trait SegmentTransport: Send + Sync {
    /// Deliver a closed segment under `message_id`.
    async fn deliver(
        &self,
        segment: &Segment,
        message_id: MessageId,
    ) -> Result<DeliveryReport, TransportError>;
}

/// Blanket implementation for boxed transport types
#[async_trait]
impl SegmentTransport for Box<dyn SegmentTransport> {
    async fn deliver(
        &self,
        segment: &Segment,
        message_id: MessageId,
    ) -> Result<DeliveryReport, TransportError> {
        self.as_ref().deliver(segment, message_id).await
    }
}
