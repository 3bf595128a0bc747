//! Runner for `segcast send`

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use serde::Serialize;

use crate::application::ports::{Broadcaster, DeliveryReport};
use crate::domain::config::AppConfig;
use crate::domain::recording::{ChannelId, MessageId};
use crate::infrastructure::ChunkedUdpSender;

use super::app::{resolve_transport, TransportChoice, EXIT_ERROR, EXIT_SUCCESS};
use super::presenter::Presenter;

/// Validated settings for a one-off send
#[derive(Debug, Clone)]
pub struct SendOptions {
    pub file: PathBuf,
    pub channel: ChannelId,
    pub message_id: MessageId,
    pub transport: TransportChoice,
}

impl SendOptions {
    pub fn resolve(
        config: &AppConfig,
        file: PathBuf,
        channel: &str,
        message_id: u32,
    ) -> Result<Self, String> {
        Ok(Self {
            file,
            channel: channel.parse::<ChannelId>().map_err(|e| e.to_string())?,
            message_id: MessageId::new(message_id),
            transport: resolve_transport(config)?,
        })
    }
}

#[derive(Debug, Serialize)]
struct SendSummary<'a> {
    file: &'a str,
    transport: &'static str,
    #[serde(flatten)]
    report: &'a DeliveryReport,
}

/// Send one file as a single message and report what went out
pub async fn run_send(options: SendOptions, presenter: &Presenter) -> ExitCode {
    let mode = options.transport.mode();
    let bytes = match tokio::fs::metadata(&options.file).await {
        Ok(meta) if meta.is_file() => meta.len() as usize,
        Ok(_) => {
            presenter.error(&format!("Not a file: {}", options.file.display()));
            return ExitCode::from(EXIT_ERROR);
        }
        Err(e) => {
            presenter.error(&format!(
                "Cannot read {}: {}",
                options.file.display(),
                e
            ));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let result = match options.transport {
        TransportChoice::Chunked(config) => {
            let bar = presenter.frame_progress(config.budget.frame_count(bytes) as u64);
            let progress_bar = bar.clone();
            let sender = ChunkedUdpSender::new(config).with_progress(Arc::new(move |done, _| {
                progress_bar.set_position(done as u64);
            }));

            let result = sender
                .send_file(&options.file, options.channel, options.message_id)
                .await;
            bar.finish_and_clear();
            result
        }
        TransportChoice::Broadcast(broadcaster) => broadcaster
            .broadcast(&options.file, options.channel, options.message_id)
            .await
            .map(|()| DeliveryReport {
                message_id: options.message_id,
                channel: options.channel,
                bytes,
                frames_sent: 0,
                frames_failed: 0,
            }),
    };

    match result {
        Ok(report) => {
            let file = options.file.to_string_lossy();
            if presenter.is_json() {
                presenter.json(&SendSummary {
                    file: &file,
                    transport: mode.as_str(),
                    report: &report,
                });
            } else {
                presenter.success(&describe(&report, mode.as_str()));
                if report.frames_failed > 0 {
                    presenter.warn(&format!("{} frames failed to send", report.frames_failed));
                }
            }

            if all_frames_failed(&report) {
                presenter.error("No frames could be sent");
                ExitCode::from(EXIT_ERROR)
            } else {
                ExitCode::from(EXIT_SUCCESS)
            }
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

fn describe(report: &DeliveryReport, mode: &str) -> String {
    if report.frames_sent + report.frames_failed == 0 {
        format!(
            "Message {} on channel {}: {} bytes via {}",
            report.message_id, report.channel, report.bytes, mode
        )
    } else {
        format!(
            "Message {} on channel {}: {} bytes in {} frames",
            report.message_id, report.channel, report.bytes, report.frames_sent
        )
    }
}

fn all_frames_failed(report: &DeliveryReport) -> bool {
    report.frames_failed > 0 && report.frames_sent == 0
}
