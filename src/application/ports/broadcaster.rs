//! Whole-file broadcast port interface

use std::path::Path;

use async_trait::async_trait;

use crate::domain::recording::{ChannelId, MessageId};

use super::transport::TransportError;

/// Port for the external broadcast collaborator.
///
/// Fire-and-forget: returning `Ok` only means the hand-off happened, not that
/// anything reached a receiver.
#[async_trait]
pub trait Broadcaster: Send + Sync {
    async fn broadcast(
        &self,
        path: &Path,
        channel: ChannelId,
        message_id: MessageId,
    ) -> Result<(), TransportError>;
}
