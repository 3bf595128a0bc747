//! Runner for `segcast record`

use std::path::PathBuf;
use std::process::ExitCode;

use crate::application::ports::SegmentTransport;
use crate::application::{
    RecorderConfig, StopReason, StreamingConfig, StreamingSession, StreamingSummary,
};
use crate::domain::config::AppConfig;
use crate::domain::recording::ChannelId;
use crate::infrastructure::{
    BroadcastTransport, CaptureSettings, ChunkedUdpSender, FfmpegCapture, FileWriterFactory,
};

use super::app::{parse_duration, resolve_transport, TransportChoice, EXIT_ERROR, EXIT_SUCCESS};
use super::presenter::Presenter;
use super::signals::ShutdownSignal;

/// Fully validated settings for one recording run
#[derive(Debug, Clone)]
pub struct RecordOptions {
    pub streaming: StreamingConfig,
    pub sessions_dir: PathBuf,
    pub capture: CaptureSettings,
    pub transport: TransportChoice,
}

impl RecordOptions {
    /// Validate a merged config. Errors are usage errors.
    pub fn resolve(config: &AppConfig, channel: Option<&str>) -> Result<Self, String> {
        let segment_duration = match config.segment_duration.as_deref() {
            Some(raw) => parse_duration("segment duration", raw)?,
            None => config.segment_duration_or_default(),
        };
        let max_duration = config
            .max_duration
            .as_deref()
            .map(|raw| parse_duration("max duration", raw))
            .transpose()?;
        let channel = channel
            .map(|raw| raw.parse::<ChannelId>().map_err(|e| e.to_string()))
            .transpose()?;

        Ok(Self {
            streaming: StreamingConfig {
                segment_duration,
                max_duration,
                channel,
            },
            sessions_dir: config.sessions_dir_or_default(),
            capture: CaptureSettings::new(
                config.capture_format_or_default(),
                config.capture_device_or_default(),
            ),
            transport: resolve_transport(config)?,
        })
    }
}

fn build_transport(choice: TransportChoice) -> Box<dyn SegmentTransport> {
    match choice {
        TransportChoice::Chunked(config) => Box::new(ChunkedUdpSender::new(config)),
        TransportChoice::Broadcast(broadcaster) => Box::new(BroadcastTransport::new(broadcaster)),
    }
}

/// Capture, segment and deliver until interrupted
pub async fn run_record(options: RecordOptions, presenter: &mut Presenter) -> ExitCode {
    // Setup signal handler before ffmpeg starts
    let shutdown = match ShutdownSignal::install() {
        Ok(signal) => signal,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mode = options.transport.mode();
    let session = StreamingSession::new(
        FfmpegCapture::new(options.capture),
        FileWriterFactory::new(),
        build_transport(options.transport),
        RecorderConfig::new(&options.sessions_dir),
        options.streaming,
    );

    presenter.start_spinner(&format!("Starting capture ({} transport)...", mode.as_str()));

    // Mirror recorder status into the spinner
    let status_task = presenter.spinner_handle().map(|spinner| {
        let mut status = session.recorder().subscribe();
        tokio::spawn(async move {
            while status.changed().await.is_ok() {
                let line = Presenter::format_status(&status.borrow_and_update());
                spinner.set_message(line);
            }
        })
    });

    let result = session
        .run(async move {
            let kind = shutdown.recv().await;
            tracing::info!(signal = %kind, "shutdown requested");
        })
        .await;

    if let Some(task) = status_task {
        task.abort();
    }

    match result {
        Ok(summary) => {
            let failed = summary.stop_reason == StopReason::RotationFailed;
            let line = summary_line(&summary);
            if failed {
                presenter.spinner_fail(&line);
            } else {
                presenter.spinner_success(&line);
            }

            if presenter.is_json() {
                presenter.json(&summary);
            } else if summary.samples.dropped > 0 {
                presenter.warn(&format!(
                    "{} samples dropped during rotation",
                    summary.samples.dropped
                ));
            }

            if failed {
                presenter.error("Recording stopped: could not open the next segment");
                ExitCode::from(EXIT_ERROR)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            }
        }
        Err(e) => {
            presenter.spinner_fail("Recording failed");
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn summary_line(summary: &StreamingSummary) -> String {
    format!(
        "Channel {}: {} segment{} recorded, {} delivered, {} failed ({})",
        summary.channel,
        summary.segments.len(),
        if summary.segments.len() == 1 { "" } else { "s" },
        summary.deliveries.delivered,
        summary.deliveries.failed + summary.deliveries.flush_failures,
        stop_reason_label(summary.stop_reason),
    )
}

fn stop_reason_label(reason: StopReason) -> &'static str {
    match reason {
        StopReason::Shutdown => "interrupted",
        StopReason::MaxDuration => "max duration reached",
        StopReason::CaptureEnded => "capture ended",
        StopReason::RotationFailed => "rotation failed",
    }
}
