//! Segment recorder use case
//!
//! Owns the active segment writer and rotates it on request. Rotation has
//! three phases:
//!
//! 1. under the lock: enter `Rotating`, detach the active writer, assign the
//!    end timestamp, the next sequence number and a message id
//! 2. unlocked: close the detached writer (its flush runs in the background
//!    and feeds the delivery queue) and open the next writer
//! 3. under the lock: install the new writer and return to `Recording`
//!
//! Samples arriving while phase 2 runs are dropped, never buffered.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::fs;
use tokio::sync::{watch, Mutex};
use tracing::{debug, error, info, warn};

use crate::domain::recording::{
    segment_path, ChannelId, InvalidStateTransition, MediaSample, MediaTimestamp, MessageId,
    MessageIdGenerator, OpenSegment, RecorderState, RecordingSession, SampleDisposition, Segment,
    SequenceNumber,
};

use super::delivery::{DeliveryHandle, PendingDelivery};
use super::ports::{SegmentWriter, WriterError, WriterFactory};

/// Errors from the recorder
#[derive(Debug, Error)]
pub enum RecorderError {
    #[error("Failed to initialize segment writer: {0}")]
    WriterInit(#[source] WriterError),

    #[error("Failed to create sessions directory {}: {message}", path.display())]
    DirectoryCreation { path: PathBuf, message: String },

    #[error("Recorder is not recording")]
    NotRecording,

    #[error("Segment writer failed: {0}")]
    Writer(#[source] WriterError),

    /// The closed segment was handed off, but the next one could not be opened
    #[error("Failed to open the segment after {}: {source}", closed.file_name())]
    ReopenFailed {
        closed: Box<Segment>,
        #[source]
        source: WriterError,
    },

    #[error("Invalid state transition: {0}")]
    InvalidState(#[from] InvalidStateTransition),
}

/// Recorder settings
#[derive(Debug, Clone)]
pub struct RecorderConfig {
    /// Directory holding segment files
    pub sessions_dir: PathBuf,
}

impl RecorderConfig {
    pub fn new(sessions_dir: impl Into<PathBuf>) -> Self {
        Self {
            sessions_dir: sessions_dir.into(),
        }
    }
}

/// Observable recorder status
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RecorderStatus {
    pub state: RecorderState,
    pub channel: Option<ChannelId>,
    pub segments_closed: u64,
    pub samples_appended: u64,
    pub samples_dropped: u64,
    pub last_error: Option<String>,
}

/// What happened to a sample handed to [`SegmentRecorder::append_sample`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppendOutcome {
    Appended,
    /// Discarded because a rotation was in progress
    Dropped,
}

struct ActiveSegment {
    segment: OpenSegment,
    writer: Box<dyn SegmentWriter>,
}

#[derive(Default)]
struct RecorderInner {
    session: RecordingSession,
    channel: Option<ChannelId>,
    previous_channel: Option<ChannelId>,
    next_sequence: SequenceNumber,
    active: Option<ActiveSegment>,
    latest: MediaTimestamp,
    segments_closed: u64,
    samples_appended: u64,
    samples_dropped: u64,
}

/// Records a stream of samples into fixed-length segment files
pub struct SegmentRecorder<F: WriterFactory> {
    factory: F,
    config: RecorderConfig,
    message_ids: Arc<MessageIdGenerator>,
    deliveries: DeliveryHandle,
    inner: Mutex<RecorderInner>,
    status: watch::Sender<RecorderStatus>,
}

impl<F: WriterFactory> SegmentRecorder<F> {
    pub fn new(factory: F, config: RecorderConfig, deliveries: DeliveryHandle) -> Self {
        Self::with_message_ids(
            factory,
            config,
            deliveries,
            Arc::new(MessageIdGenerator::new()),
        )
    }

    /// Share a message id generator with other producers
    pub fn with_message_ids(
        factory: F,
        config: RecorderConfig,
        deliveries: DeliveryHandle,
        message_ids: Arc<MessageIdGenerator>,
    ) -> Self {
        let (status, _) = watch::channel(RecorderStatus::default());
        Self {
            factory,
            config,
            message_ids,
            deliveries,
            inner: Mutex::new(RecorderInner::default()),
            status,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<RecorderStatus> {
        self.status.subscribe()
    }

    pub async fn state(&self) -> RecorderState {
        self.inner.lock().await.session.state()
    }

    pub async fn channel(&self) -> Option<ChannelId> {
        self.inner.lock().await.channel
    }

    pub fn sessions_dir(&self) -> &Path {
        &self.config.sessions_dir
    }

    /// Begin recording on `channel`, or on a fresh random channel that
    /// differs from the previous one.
    ///
    /// Opens segment `0001`. On any failure the recorder stays idle.
    pub async fn start(&self, channel: Option<ChannelId>) -> Result<ChannelId, RecorderError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.session.ensure_can_start()?;

        let dir = &self.config.sessions_dir;
        if let Err(e) = fs::create_dir_all(dir).await {
            let err = RecorderError::DirectoryCreation {
                path: dir.clone(),
                message: e.to_string(),
            };
            error!(error = %err, "cannot start recording");
            self.publish(inner, Some(&err));
            return Err(err);
        }

        let channel = channel.unwrap_or_else(|| {
            ChannelId::random_excluding(inner.previous_channel, &mut rand::thread_rng())
        });
        let sequence = SequenceNumber::FIRST;

        let active = match self.open_segment(channel, sequence, inner.latest).await {
            Ok(active) => active,
            Err(source) => {
                let err = RecorderError::WriterInit(source);
                error!(%channel, error = %err, "cannot start recording");
                self.publish(inner, Some(&err));
                return Err(err);
            }
        };

        inner.session.start()?;
        inner.channel = Some(channel);
        inner.next_sequence = sequence.next();
        inner.active = Some(active);
        inner.segments_closed = 0;
        inner.samples_appended = 0;
        inner.samples_dropped = 0;

        info!(%channel, dir = %dir.display(), "recording started");
        self.publish(inner, None);
        Ok(channel)
    }

    /// Hand one captured sample to the active writer
    pub async fn append_sample(&self, sample: MediaSample) -> Result<AppendOutcome, RecorderError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        match inner.session.sample_disposition() {
            SampleDisposition::Reject => Err(RecorderError::NotRecording),
            SampleDisposition::Drop => {
                inner.latest = inner.latest.max(sample.timestamp);
                inner.samples_dropped += 1;
                debug!(timestamp = %sample.timestamp, "sample dropped during rotation");
                Ok(AppendOutcome::Dropped)
            }
            SampleDisposition::Append => {
                inner.latest = inner.latest.max(sample.timestamp);
                let active = inner.active.as_mut().ok_or(RecorderError::NotRecording)?;
                active
                    .writer
                    .append(&sample)
                    .await
                    .map_err(RecorderError::Writer)?;
                inner.samples_appended += 1;
                Ok(AppendOutcome::Appended)
            }
        }
    }

    /// Close the active segment and open the next one.
    ///
    /// Returns the closed segment. If the next writer cannot be opened the
    /// closed segment is still delivered, the recorder goes idle and the
    /// segment comes back inside [`RecorderError::ReopenFailed`].
    pub async fn rotate(&self) -> Result<Segment, RecorderError> {
        let (closing, end, sequence, message_id) = {
            let mut guard = self.inner.lock().await;
            let inner = &mut *guard;
            inner.session.begin_rotation()?;

            let Some(closing) = inner.active.take() else {
                inner.session.abort_rotation()?;
                return Err(RecorderError::NotRecording);
            };
            let sequence = inner.next_sequence;
            inner.next_sequence = sequence.next();
            inner.segments_closed += 1;
            let message_id = self.message_ids.next_id();
            self.publish(inner, None);
            (closing, inner.latest, sequence, message_id)
        };

        let channel = closing.segment.channel();
        let closed = self.close_segment(closing, end, message_id);
        let opened = self.open_segment(channel, sequence, end).await;

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        match opened {
            Ok(active) => {
                inner.active = Some(active);
                inner.session.finish_rotation()?;
                self.publish(inner, None);
                Ok(closed)
            }
            Err(source) => {
                inner.session.abort_rotation()?;
                inner.previous_channel = inner.channel.take();
                inner.latest = MediaTimestamp::ZERO;
                let err = RecorderError::ReopenFailed {
                    closed: Box::new(closed),
                    source,
                };
                error!(%channel, %sequence, error = %err, "rotation failed, recording stopped");
                self.publish(inner, Some(&err));
                Err(err)
            }
        }
    }

    /// Close the active segment without opening another.
    ///
    /// The closed segment is delivered like any rotated one.
    pub async fn stop(&self) -> Result<Segment, RecorderError> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        inner.session.begin_stop()?;

        let Some(active) = inner.active.take() else {
            inner.session.finish_stop()?;
            return Err(RecorderError::NotRecording);
        };

        let message_id = self.message_ids.next_id();
        let closed = self.close_segment(active, inner.latest, message_id);
        inner.segments_closed += 1;
        inner.previous_channel = inner.channel.take();
        // Capture clocks restart with the next session
        inner.latest = MediaTimestamp::ZERO;
        inner.session.finish_stop()?;

        info!(
            channel = %closed.channel(),
            segments = inner.segments_closed,
            "recording stopped"
        );
        self.publish(inner, None);
        Ok(closed)
    }

    async fn open_segment(
        &self,
        channel: ChannelId,
        sequence: SequenceNumber,
        at: MediaTimestamp,
    ) -> Result<ActiveSegment, WriterError> {
        let path = segment_path(&self.config.sessions_dir, channel, sequence);
        let mut writer = self.factory.create(&path).await?;
        writer.start_session(at)?;

        debug!(path = %path.display(), start = %at, "segment opened");
        Ok(ActiveSegment {
            segment: OpenSegment::new(channel, sequence, path, at),
            writer,
        })
    }

    /// End the writer's timeline, spawn its flush and queue the delivery
    fn close_segment(
        &self,
        active: ActiveSegment,
        end: MediaTimestamp,
        message_id: MessageId,
    ) -> Segment {
        let ActiveSegment { segment, mut writer } = active;
        writer.end_session(end);
        writer.mark_as_finished();

        let closed = segment.finalize(end);
        let flushed = closed.clone();
        let flush = tokio::spawn(async move { writer.finish_writing().await.map(|()| flushed) });

        if !self.deliveries.enqueue(PendingDelivery { message_id, flush }) {
            warn!(file = %closed.file_name(), "delivery queue closed, segment will not be sent");
        }

        info!(
            file = %closed.file_name(),
            %message_id,
            duration_ms = closed.duration().as_millis() as u64,
            "segment closed"
        );
        closed
    }

    fn publish(&self, inner: &RecorderInner, error: Option<&RecorderError>) {
        self.status.send_modify(|status| {
            status.state = inner.session.state();
            status.channel = inner.channel;
            status.segments_closed = inner.segments_closed;
            status.samples_appended = inner.samples_appended;
            status.samples_dropped = inner.samples_dropped;
            if let Some(err) = error {
                status.last_error = Some(err.to_string());
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::delivery::DeliveryQueue;
    use crate::application::ports::{DeliveryReport, SegmentTransport, TransportError};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;
    use tokio::sync::Notify;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum WriterEvent {
        Created(String),
        Started(u64),
        Appended(usize),
        Ended(u64),
        MarkedFinished,
        Finished(String),
    }

    type EventLog = Arc<StdMutex<Vec<WriterEvent>>>;

    struct MemoryWriter {
        name: String,
        events: EventLog,
    }

    #[async_trait]
    impl SegmentWriter for MemoryWriter {
        fn start_session(&mut self, at: MediaTimestamp) -> Result<(), WriterError> {
            self.events.lock().unwrap().push(WriterEvent::Started(at.as_nanos()));
            Ok(())
        }

        async fn append(&mut self, sample: &MediaSample) -> Result<(), WriterError> {
            self.events.lock().unwrap().push(WriterEvent::Appended(sample.len()));
            Ok(())
        }

        fn end_session(&mut self, at: MediaTimestamp) {
            self.events.lock().unwrap().push(WriterEvent::Ended(at.as_nanos()));
        }

        fn mark_as_finished(&mut self) {
            self.events.lock().unwrap().push(WriterEvent::MarkedFinished);
        }

        async fn finish_writing(self: Box<Self>) -> Result<(), WriterError> {
            self.events.lock().unwrap().push(WriterEvent::Finished(self.name.clone()));
            Ok(())
        }
    }

    /// Creates in-memory writers. Creation number `fail_at` (1-based) fails;
    /// creations from `gate_from` on wait for `gate` to be notified.
    #[derive(Default)]
    struct MemoryWriterFactory {
        events: EventLog,
        created: AtomicUsize,
        fail_at: Option<usize>,
        gate_from: Option<usize>,
        gate: Arc<Notify>,
    }

    #[async_trait]
    impl WriterFactory for MemoryWriterFactory {
        async fn create(&self, path: &Path) -> Result<Box<dyn SegmentWriter>, WriterError> {
            let n = self.created.fetch_add(1, Ordering::SeqCst) + 1;
            if self.gate_from.is_some_and(|from| n >= from) {
                self.gate.notified().await;
            }
            if self.fail_at == Some(n) {
                return Err(WriterError::CreateFailed("codec unavailable".to_string()));
            }
            let name = path.file_name().unwrap().to_string_lossy().into_owned();
            self.events.lock().unwrap().push(WriterEvent::Created(name.clone()));
            Ok(Box::new(MemoryWriter {
                name,
                events: Arc::clone(&self.events),
            }))
        }
    }

    #[derive(Default, Clone)]
    struct RecordingTransport {
        delivered: Arc<StdMutex<Vec<(String, MessageId)>>>,
    }

    #[async_trait]
    impl SegmentTransport for RecordingTransport {
        async fn deliver(
            &self,
            segment: &Segment,
            message_id: MessageId,
        ) -> Result<DeliveryReport, TransportError> {
            self.delivered
                .lock()
                .unwrap()
                .push((segment.file_name(), message_id));
            Ok(DeliveryReport {
                message_id,
                channel: segment.channel(),
                bytes: 0,
                frames_sent: 0,
                frames_failed: 0,
            })
        }
    }

    fn sample_at(secs: u64) -> MediaSample {
        MediaSample::new(MediaTimestamp::from_nanos(secs * 1_000_000_000), vec![0u8; 16])
    }

    fn recorder_in(
        dir: &Path,
        factory: MemoryWriterFactory,
    ) -> (SegmentRecorder<MemoryWriterFactory>, DeliveryQueue, RecordingTransport) {
        let transport = RecordingTransport::default();
        let queue = DeliveryQueue::spawn(transport.clone());
        let recorder = SegmentRecorder::new(factory, RecorderConfig::new(dir), queue.handle());
        (recorder, queue, transport)
    }

    #[tokio::test]
    async fn start_opens_first_segment_and_enters_recording() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MemoryWriterFactory::default();
        let events = Arc::clone(&factory.events);
        let (recorder, _queue, _) = recorder_in(dir.path(), factory);

        let channel = recorder.start(None).await.unwrap();

        assert_eq!(recorder.state().await, RecorderState::Recording);
        assert_eq!(recorder.channel().await, Some(channel));
        assert_eq!(
            events.lock().unwrap()[0],
            WriterEvent::Created(format!("session_{}_0001.mp4", channel))
        );
    }

    #[tokio::test]
    async fn three_rotations_and_stop_deliver_four_segments_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, queue, transport) = recorder_in(dir.path(), MemoryWriterFactory::default());
        let channel = recorder.start(None).await.unwrap();

        for tick in 1..=3u64 {
            recorder.append_sample(sample_at(tick * 4 - 1)).await.unwrap();
            recorder.append_sample(sample_at(tick * 4)).await.unwrap();
            let closed = recorder.rotate().await.unwrap();
            assert_eq!(closed.sequence().value() as u64, tick);
            assert_eq!(closed.ended_at().as_nanos(), tick * 4_000_000_000);
        }
        recorder.append_sample(sample_at(15)).await.unwrap();
        recorder.stop().await.unwrap();

        let summary = queue.shutdown().await;
        assert_eq!(summary.delivered, 4);

        let delivered = transport.delivered.lock().unwrap().clone();
        let expected: Vec<(String, MessageId)> = (1..=4)
            .map(|n| (format!("session_{}_{:04}.mp4", channel, n), MessageId::new(n)))
            .collect();
        assert_eq!(delivered, expected);
        assert_eq!(recorder.state().await, RecorderState::Idle);
    }

    #[tokio::test]
    async fn writer_sees_calls_in_lifecycle_order() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MemoryWriterFactory::default();
        let events = Arc::clone(&factory.events);
        let (recorder, queue, _) = recorder_in(dir.path(), factory);

        let channel = recorder.start(None).await.unwrap();
        recorder.append_sample(sample_at(2)).await.unwrap();
        recorder.stop().await.unwrap();
        queue.shutdown().await;

        let name = format!("session_{}_0001.mp4", channel);
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                WriterEvent::Created(name.clone()),
                WriterEvent::Started(0),
                WriterEvent::Appended(16),
                WriterEvent::Ended(2_000_000_000),
                WriterEvent::MarkedFinished,
                WriterEvent::Finished(name),
            ]
        );
    }

    #[tokio::test]
    async fn writer_init_failure_leaves_recorder_idle() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MemoryWriterFactory {
            fail_at: Some(1),
            ..Default::default()
        };
        let (recorder, _queue, _) = recorder_in(dir.path(), factory);
        let status = recorder.subscribe();

        let result = recorder.start(None).await;

        assert!(matches!(result, Err(RecorderError::WriterInit(_))));
        assert_eq!(recorder.state().await, RecorderState::Idle);
        assert!(matches!(
            recorder.append_sample(sample_at(1)).await,
            Err(RecorderError::NotRecording)
        ));
        assert!(status.borrow().last_error.is_some());
    }

    #[tokio::test]
    async fn unusable_sessions_dir_fails_start() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("not-a-dir");
        std::fs::write(&blocker, b"x").unwrap();
        let (recorder, _queue, _) =
            recorder_in(&blocker.join("sessions"), MemoryWriterFactory::default());

        let result = recorder.start(None).await;

        assert!(matches!(result, Err(RecorderError::DirectoryCreation { .. })));
        assert_eq!(recorder.state().await, RecorderState::Idle);
    }

    #[tokio::test]
    async fn failed_reopen_still_delivers_closed_segment() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MemoryWriterFactory {
            fail_at: Some(2),
            ..Default::default()
        };
        let (recorder, queue, transport) = recorder_in(dir.path(), factory);
        recorder.start(None).await.unwrap();

        let result = recorder.rotate().await;

        let Err(RecorderError::ReopenFailed { closed, source }) = result else {
            panic!("Expected ReopenFailed, got {:?}", result);
        };
        assert_eq!(closed.sequence(), SequenceNumber::FIRST);
        assert!(matches!(source, WriterError::CreateFailed(_)));
        assert_eq!(recorder.state().await, RecorderState::Idle);
        assert_eq!(queue.shutdown().await.delivered, 1);
        assert_eq!(transport.delivered.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn samples_during_rotation_are_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MemoryWriterFactory {
            gate_from: Some(2),
            ..Default::default()
        };
        let gate = Arc::clone(&factory.gate);
        let (recorder, _queue, _) = recorder_in(dir.path(), factory);
        let recorder = Arc::new(recorder);
        recorder.start(None).await.unwrap();

        let mut status = recorder.subscribe();
        let rotating = tokio::spawn({
            let recorder = Arc::clone(&recorder);
            async move { recorder.rotate().await }
        });
        status
            .wait_for(|s| s.state == RecorderState::Rotating)
            .await
            .unwrap();

        assert_eq!(
            recorder.append_sample(sample_at(5)).await.unwrap(),
            AppendOutcome::Dropped
        );
        assert!(matches!(
            recorder.rotate().await,
            Err(RecorderError::InvalidState(_))
        ));

        gate.notify_one();
        rotating.await.unwrap().unwrap();

        assert_eq!(
            recorder.append_sample(sample_at(6)).await.unwrap(),
            AppendOutcome::Appended
        );
        assert_eq!(status.borrow().samples_dropped, 1);
    }

    #[tokio::test]
    async fn restart_picks_a_different_channel_and_resets_sequence() {
        let dir = tempfile::tempdir().unwrap();
        let factory = MemoryWriterFactory::default();
        let events = Arc::clone(&factory.events);
        let (recorder, _queue, _) = recorder_in(dir.path(), factory);

        let first = recorder.start(None).await.unwrap();
        recorder.rotate().await.unwrap();
        recorder.stop().await.unwrap();
        let second = recorder.start(None).await.unwrap();

        assert_ne!(first, second);
        assert!(events
            .lock()
            .unwrap()
            .contains(&WriterEvent::Created(format!("session_{}_0001.mp4", second))));
    }

    #[tokio::test]
    async fn explicit_channel_is_used() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, _queue, _) = recorder_in(dir.path(), MemoryWriterFactory::default());
        let wanted = ChannelId::new(42).unwrap();

        assert_eq!(recorder.start(Some(wanted)).await.unwrap(), wanted);
    }

    #[tokio::test]
    async fn double_start_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, _queue, _) = recorder_in(dir.path(), MemoryWriterFactory::default());
        recorder.start(None).await.unwrap();

        assert!(matches!(
            recorder.start(None).await,
            Err(RecorderError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn stop_when_idle_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, _queue, _) = recorder_in(dir.path(), MemoryWriterFactory::default());

        assert!(matches!(
            recorder.stop().await,
            Err(RecorderError::InvalidState(_))
        ));
    }

    #[tokio::test]
    async fn message_ids_keep_counting_across_sessions() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, queue, transport) = recorder_in(dir.path(), MemoryWriterFactory::default());

        recorder.start(None).await.unwrap();
        recorder.stop().await.unwrap();
        recorder.start(None).await.unwrap();
        recorder.stop().await.unwrap();
        queue.shutdown().await;

        let ids: Vec<u32> = transport
            .delivered
            .lock()
            .unwrap()
            .iter()
            .map(|(_, id)| id.value())
            .collect();
        assert_eq!(ids, vec![1, 2]);
    }

    #[tokio::test]
    async fn restarted_session_uses_its_own_timeline() {
        let dir = tempfile::tempdir().unwrap();
        let (recorder, queue, _) = recorder_in(dir.path(), MemoryWriterFactory::default());

        recorder.start(None).await.unwrap();
        recorder.append_sample(sample_at(10)).await.unwrap();
        recorder.stop().await.unwrap();

        recorder.start(None).await.unwrap();
        recorder.append_sample(sample_at(1)).await.unwrap();
        recorder.append_sample(sample_at(3)).await.unwrap();
        let closed = recorder.rotate().await.unwrap();
        queue.shutdown().await;

        assert_eq!(closed.started_at(), MediaTimestamp::ZERO);
        assert_eq!(closed.ended_at().as_nanos(), 3_000_000_000);
        assert_eq!(closed.duration().as_secs(), 3);
    }
}
