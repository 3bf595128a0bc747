//! Streaming session use case

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::domain::recording::{ChannelId, Duration, MediaSample, RecorderState, Segment};

use super::delivery::{DeliveryQueue, DeliverySummary};
use super::ports::{CaptureError, CaptureSource, SegmentTransport, WriterFactory};
use super::recorder::{AppendOutcome, RecorderConfig, RecorderError, SegmentRecorder};

/// Errors from a streaming session
#[derive(Debug, Error)]
pub enum StreamingError {
    #[error("Capture failed: {0}")]
    Capture(#[from] CaptureError),

    #[error("Recorder failed: {0}")]
    Recorder(#[from] RecorderError),
}

/// Configuration for a streaming session
#[derive(Debug, Clone)]
pub struct StreamingConfig {
    /// Rotation period
    pub segment_duration: Duration,
    /// Stop on its own after this long
    pub max_duration: Option<Duration>,
    /// Fixed channel instead of a random one
    pub channel: Option<ChannelId>,
}

impl Default for StreamingConfig {
    fn default() -> Self {
        Self {
            segment_duration: Duration::default_segment(),
            max_duration: None,
            channel: None,
        }
    }
}

/// Why the session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    Shutdown,
    MaxDuration,
    CaptureEnded,
    RotationFailed,
}

/// Sample counts seen by the pump
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SampleCounts {
    pub appended: u64,
    pub dropped: u64,
    pub rejected: u64,
    pub failed: u64,
}

/// Outcome of a finished session
#[derive(Debug, Clone, Serialize)]
pub struct StreamingSummary {
    pub channel: ChannelId,
    pub stop_reason: StopReason,
    pub segments: Vec<Segment>,
    pub samples: SampleCounts,
    pub deliveries: DeliverySummary,
}

/// Capture, segment and deliver until told to stop
pub struct StreamingSession<C, F>
where
    C: CaptureSource,
    F: WriterFactory + 'static,
{
    capture: C,
    recorder: Arc<SegmentRecorder<F>>,
    deliveries: DeliveryQueue,
    config: StreamingConfig,
}

impl<C, F> StreamingSession<C, F>
where
    C: CaptureSource,
    F: WriterFactory + 'static,
{
    /// Wire a session. Spawns the delivery worker, so call inside a runtime.
    pub fn new<T>(
        capture: C,
        factory: F,
        transport: T,
        recorder_config: RecorderConfig,
        config: StreamingConfig,
    ) -> Self
    where
        T: SegmentTransport + 'static,
    {
        let deliveries = DeliveryQueue::spawn(transport);
        let recorder = Arc::new(SegmentRecorder::new(
            factory,
            recorder_config,
            deliveries.handle(),
        ));
        Self {
            capture,
            recorder,
            deliveries,
            config,
        }
    }

    /// Shared recorder, for status subscriptions
    pub fn recorder(&self) -> Arc<SegmentRecorder<F>> {
        Arc::clone(&self.recorder)
    }

    /// Run until `shutdown` resolves, the maximum duration elapses, capture
    /// ends, or a rotation fails. Always stops capture and drains pending
    /// deliveries before returning.
    pub async fn run<S>(self, shutdown: S) -> Result<StreamingSummary, StreamingError>
    where
        S: Future<Output = ()>,
    {
        let Self {
            capture,
            recorder,
            deliveries,
            config,
        } = self;

        let samples = match capture.start().await {
            Ok(samples) => samples,
            Err(e) => {
                deliveries.shutdown().await;
                return Err(e.into());
            }
        };

        let channel = match recorder.start(config.channel).await {
            Ok(channel) => channel,
            Err(e) => {
                if let Err(stop_err) = capture.stop().await {
                    warn!(error = %stop_err, "failed to stop capture");
                }
                deliveries.shutdown().await;
                return Err(e.into());
            }
        };

        let mut pump = tokio::spawn(pump_samples(Arc::clone(&recorder), samples));
        let mut pump_result = None;

        let period = config.segment_duration.as_std();
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let max_duration = config.max_duration;
        let deadline = async move {
            match max_duration {
                Some(limit) => time::sleep(limit.as_std()).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(deadline);
        tokio::pin!(shutdown);

        info!(%channel, segment = %config.segment_duration, "streaming");

        let mut segments = Vec::new();
        let stop_reason = loop {
            tokio::select! {
                _ = &mut shutdown => break StopReason::Shutdown,
                _ = &mut deadline => break StopReason::MaxDuration,
                result = &mut pump, if pump_result.is_none() => {
                    pump_result = Some(result);
                    break StopReason::CaptureEnded;
                }
                _ = ticker.tick() => match recorder.rotate().await {
                    Ok(segment) => segments.push(segment),
                    Err(RecorderError::ReopenFailed { closed, source }) => {
                        error!(segment = %closed.file_name(), error = %source, "rotation failed");
                        segments.push(*closed);
                        break StopReason::RotationFailed;
                    }
                    Err(e) => {
                        error!(error = %e, "rotation failed");
                        break StopReason::RotationFailed;
                    }
                },
            }
        };
        debug!(?stop_reason, "streaming loop ended");

        if recorder.state().await == RecorderState::Recording {
            match recorder.stop().await {
                Ok(segment) => segments.push(segment),
                Err(e) => warn!(error = %e, "failed to stop recorder"),
            }
        }

        if let Err(e) = capture.stop().await {
            warn!(error = %e, "failed to stop capture");
        }

        let samples = match pump_result {
            Some(result) => result,
            None => pump.await,
        }
        .unwrap_or_else(|e| {
            warn!(error = %e, "sample pump ended abnormally");
            SampleCounts::default()
        });

        let deliveries = deliveries.shutdown().await;
        info!(
            %channel,
            segments = segments.len(),
            delivered = deliveries.delivered,
            dropped_samples = samples.dropped,
            "streaming stopped"
        );

        Ok(StreamingSummary {
            channel,
            stop_reason,
            segments,
            samples,
            deliveries,
        })
    }
}

async fn pump_samples<F>(
    recorder: Arc<SegmentRecorder<F>>,
    mut samples: mpsc::Receiver<MediaSample>,
) -> SampleCounts
where
    F: WriterFactory,
{
    let mut counts = SampleCounts::default();
    while let Some(sample) = samples.recv().await {
        match recorder.append_sample(sample).await {
            Ok(AppendOutcome::Appended) => counts.appended += 1,
            Ok(AppendOutcome::Dropped) => counts.dropped += 1,
            Err(RecorderError::NotRecording) => counts.rejected += 1,
            Err(e) => {
                counts.failed += 1;
                warn!(error = %e, "failed to append sample");
            }
        }
    }
    counts
}
