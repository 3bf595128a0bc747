//! Whole-file broadcast transport
//!
//! Hands each closed segment to an external helper program, which is
//! expected to push the file to nearby peers. The helper receives
//! `<path> <channel> <message_id>` after its configured arguments and is not
//! waited on.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::application::ports::{Broadcaster, DeliveryReport, SegmentTransport, TransportError};
use crate::domain::recording::{ChannelId, MessageId, Segment};

/// Runs a helper command per segment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBroadcaster {
    program: String,
    args: Vec<String>,
}

impl CommandBroadcaster {
    /// Parse a whitespace-separated command line. None if it is blank.
    pub fn from_command_line(command: &str) -> Option<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts.next()?;
        Some(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn build_args(&self, path: &Path, channel: ChannelId, message_id: MessageId) -> Vec<String> {
        let mut args = self.args.clone();
        args.extend([
            path.to_string_lossy().into_owned(),
            channel.to_string(),
            message_id.to_string(),
        ]);
        args
    }
}

#[async_trait]
impl Broadcaster for CommandBroadcaster {
    async fn broadcast(
        &self,
        path: &Path,
        channel: ChannelId,
        message_id: MessageId,
    ) -> Result<(), TransportError> {
        let args = self.build_args(path, channel, message_id);
        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    TransportError::Unavailable(format!("{} not found", self.program))
                } else {
                    TransportError::SendFailure(e.to_string())
                }
            })?;

        debug!(program = %self.program, ?args, "broadcast helper started");

        let program = self.program.clone();
        tokio::spawn(async move {
            match child.wait().await {
                Ok(status) if status.success() => {
                    debug!(%program, %message_id, "broadcast helper finished")
                }
                Ok(status) => warn!(%program, %message_id, %status, "broadcast helper failed"),
                Err(e) => warn!(%program, %message_id, error = %e, "broadcast helper lost"),
            }
        });

        Ok(())
    }
}

/// Segment transport that defers to a [`Broadcaster`]
pub struct BroadcastTransport<B: Broadcaster> {
    broadcaster: B,
}

impl<B: Broadcaster> BroadcastTransport<B> {
    pub fn new(broadcaster: B) -> Self {
        Self { broadcaster }
    }
}

#[async_trait]
impl<B: Broadcaster> SegmentTransport for BroadcastTransport<B> {
    async fn deliver(
        &self,
        segment: &Segment,
        message_id: MessageId,
    ) -> Result<DeliveryReport, TransportError> {
        let bytes = tokio::fs::metadata(segment.path())
            .await
            .map_err(|e| TransportError::ReadFailed(format!("{}: {}", segment.path().display(), e)))?
            .len() as usize;

        self.broadcaster
            .broadcast(segment.path(), segment.channel(), message_id)
            .await?;

        info!(file = %segment.file_name(), %message_id, bytes, "segment handed to broadcaster");
        Ok(DeliveryReport {
            message_id,
            channel: segment.channel(),
            bytes,
            frames_sent: 0,
            frames_failed: 0,
        })
    }
}
