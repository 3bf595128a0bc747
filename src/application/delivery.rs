//! Ordered hand-off of closed segments to the transport
//!
//! One worker task per queue. Deliveries leave in the order they were
//! enqueued, which is rotation order, even when a later segment finishes
//! flushing before an earlier one.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::domain::recording::{MessageId, Segment};

use super::ports::{SegmentTransport, WriterError};

/// Completion of a segment flush. Resolves to the closed segment.
pub type FlushHandle = JoinHandle<Result<Segment, WriterError>>;

/// A closed segment waiting for its flush and then its delivery
pub struct PendingDelivery {
    pub message_id: MessageId,
    pub flush: FlushHandle,
}

enum Command {
    Deliver(PendingDelivery),
    Shutdown,
}

/// Running delivery counters
#[derive(Debug, Default)]
pub struct DeliveryStats {
    delivered: AtomicU64,
    failed: AtomicU64,
    flush_failures: AtomicU64,
    frames_sent: AtomicU64,
    frames_failed: AtomicU64,
    bytes: AtomicU64,
}

impl DeliveryStats {
    pub fn snapshot(&self) -> DeliverySummary {
        DeliverySummary {
            delivered: self.delivered.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
            flush_failures: self.flush_failures.load(Ordering::SeqCst),
            frames_sent: self.frames_sent.load(Ordering::SeqCst),
            frames_failed: self.frames_failed.load(Ordering::SeqCst),
            bytes: self.bytes.load(Ordering::SeqCst),
        }
    }
}

/// Point-in-time copy of [`DeliveryStats`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DeliverySummary {
    pub delivered: u64,
    pub failed: u64,
    pub flush_failures: u64,
    pub frames_sent: u64,
    pub frames_failed: u64,
    pub bytes: u64,
}

/// Cloneable sender side of a [`DeliveryQueue`]
#[derive(Clone)]
pub struct DeliveryHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl DeliveryHandle {
    /// Queue a delivery. Returns false if the queue has shut down.
    pub fn enqueue(&self, pending: PendingDelivery) -> bool {
        self.tx.send(Command::Deliver(pending)).is_ok()
    }
}

/// Serializes deliveries through a single worker
pub struct DeliveryQueue {
    handle: DeliveryHandle,
    worker: JoinHandle<()>,
    stats: Arc<DeliveryStats>,
}

impl DeliveryQueue {
    /// Spawn the worker. Must be called inside a tokio runtime.
    pub fn spawn<T>(transport: T) -> Self
    where
        T: SegmentTransport + 'static,
    {
        let (tx, rx) = mpsc::unbounded_channel();
        let stats = Arc::new(DeliveryStats::default());
        let worker = tokio::spawn(run_worker(transport, rx, Arc::clone(&stats)));

        Self {
            handle: DeliveryHandle { tx },
            worker,
            stats,
        }
    }

    pub fn handle(&self) -> DeliveryHandle {
        self.handle.clone()
    }

    pub fn stats(&self) -> DeliverySummary {
        self.stats.snapshot()
    }

    /// Finish everything queued so far, then stop the worker.
    /// In-flight sends run to completion.
    pub async fn shutdown(self) -> DeliverySummary {
        let _ = self.handle.tx.send(Command::Shutdown);
        if let Err(e) = self.worker.await {
            warn!(error = %e, "delivery worker ended abnormally");
        }
        self.stats.snapshot()
    }
}

async fn run_worker<T>(
    transport: T,
    mut rx: mpsc::UnboundedReceiver<Command>,
    stats: Arc<DeliveryStats>,
) where
    T: SegmentTransport,
{
    while let Some(command) = rx.recv().await {
        match command {
            Command::Deliver(pending) => deliver_one(&transport, pending, &stats).await,
            Command::Shutdown => break,
        }
    }
    debug!("delivery worker stopped");
}

async fn deliver_one<T>(transport: &T, pending: PendingDelivery, stats: &DeliveryStats)
where
    T: SegmentTransport,
{
    let PendingDelivery { message_id, flush } = pending;

    let segment = match flush.await {
        Ok(Ok(segment)) => segment,
        Ok(Err(e)) => {
            warn!(%message_id, error = %e, "segment flush failed, skipping delivery");
            stats.flush_failures.fetch_add(1, Ordering::SeqCst);
            return;
        }
        Err(e) => {
            warn!(%message_id, error = %e, "segment flush task aborted");
            stats.flush_failures.fetch_add(1, Ordering::SeqCst);
            return;
        }
    };

    match transport.deliver(&segment, message_id).await {
        Ok(report) => {
            stats.delivered.fetch_add(1, Ordering::SeqCst);
            stats.frames_sent.fetch_add(report.frames_sent as u64, Ordering::SeqCst);
            stats.frames_failed.fetch_add(report.frames_failed as u64, Ordering::SeqCst);
            stats.bytes.fetch_add(report.bytes as u64, Ordering::SeqCst);
            info!(
                channel = %segment.channel(),
                sequence = %segment.sequence(),
                %message_id,
                bytes = report.bytes,
                frames = report.frames_sent,
                failed_frames = report.frames_failed,
                "segment delivered"
            );
        }
        Err(e) => {
            stats.failed.fetch_add(1, Ordering::SeqCst);
            warn!(
                channel = %segment.channel(),
                sequence = %segment.sequence(),
                %message_id,
                error = %e,
                "segment delivery failed"
            );
        }
    }
}
