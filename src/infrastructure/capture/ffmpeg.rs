//! FFmpeg-based webcam capture adapter

use std::process::Stdio;
use std::time::Instant;

use async_trait::async_trait;
#[cfg(unix)]
use nix::sys::signal::{self, Signal};
#[cfg(unix)]
use nix::unistd::Pid;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio::process::{Child, ChildStderr, ChildStdout, Command};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{timeout, Duration as TokioDuration};
use tracing::{debug, info, warn};

use crate::application::ports::{CaptureError, CaptureSource};
use crate::domain::recording::{MediaSample, MediaTimestamp};

/// Bytes per emitted sample
pub const SAMPLE_CHUNK_SIZE: usize = 64 * 1024;

/// Samples buffered between the reader and the recorder
const SAMPLE_QUEUE_DEPTH: usize = 64;

/// Grace period for ffmpeg to flush after SIGINT
const STOP_GRACE: TokioDuration = TokioDuration::from_secs(5);

/// Capture device settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureSettings {
    /// ffmpeg input format
    pub format: String,
    /// ffmpeg input device
    pub device: String,
    pub framerate: u32,
}

impl CaptureSettings {
    pub fn new(format: impl Into<String>, device: impl Into<String>) -> Self {
        Self {
            format: format.into(),
            device: device.into(),
            framerate: 30,
        }
    }
}

struct RunningCapture {
    child: Child,
    reader: JoinHandle<()>,
}

/// Webcam and microphone capture through an ffmpeg child process.
///
/// ffmpeg encodes H.264/AAC into MPEG-TS on stdout; stdout is cut into
/// [`SAMPLE_CHUNK_SIZE`] samples stamped with time since start.
pub struct FfmpegCapture {
    settings: CaptureSettings,
    running: Mutex<Option<RunningCapture>>,
}

impl FfmpegCapture {
    pub fn new(settings: CaptureSettings) -> Self {
        Self {
            settings,
            running: Mutex::new(None),
        }
    }

    /// Build FFmpeg args for capture
    fn build_ffmpeg_args(settings: &CaptureSettings) -> Vec<String> {
        let mut args = vec![
            "-hide_banner".to_string(),
            "-loglevel".to_string(),
            "error".to_string(),
            "-f".to_string(),
            settings.format.clone(),
        ];

        // lavfi test sources carry their own rate
        if settings.format != "lavfi" {
            args.push("-framerate".to_string());
            args.push(settings.framerate.to_string());
        }

        args.extend([
            "-i".to_string(),
            settings.device.clone(),
            "-c:v".to_string(),
            "libx264".to_string(),
            "-preset".to_string(),
            "ultrafast".to_string(),
            "-tune".to_string(),
            "zerolatency".to_string(),
            "-pix_fmt".to_string(),
            "yuv420p".to_string(),
            "-c:a".to_string(),
            "aac".to_string(),
            "-f".to_string(),
            "mpegts".to_string(),
            "pipe:1".to_string(),
        ]);

        args
    }

    fn spawn_ffmpeg(args: &[String]) -> Result<Child, CaptureError> {
        Command::new("ffmpeg")
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                if e.kind() == std::io::ErrorKind::NotFound {
                    CaptureError::FfmpegNotFound
                } else {
                    CaptureError::StartFailed(e.to_string())
                }
            })
    }

    #[cfg(unix)]
    fn interrupt(child: &mut Child) -> Result<(), CaptureError> {
        if let Some(id) = child.id() {
            signal::kill(Pid::from_raw(id as i32), Signal::SIGINT)
                .map_err(|e| CaptureError::CaptureFailed(format!("Signal failed: {}", e)))?;
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn interrupt(child: &mut Child) -> Result<(), CaptureError> {
        child
            .start_kill()
            .map_err(|e| CaptureError::CaptureFailed(e.to_string()))
    }
}

/// Cut stdout into timestamped samples until EOF or the receiver goes away
async fn read_samples(mut stdout: ChildStdout, tx: mpsc::Sender<MediaSample>) {
    let started = Instant::now();
    let mut buf = vec![0u8; SAMPLE_CHUNK_SIZE];
    let mut total = 0usize;

    loop {
        let n = match stdout.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) => {
                warn!(error = %e, "capture read failed");
                break;
            }
        };
        total += n;
        let sample = MediaSample::new(MediaTimestamp::from_std(started.elapsed()), buf[..n].to_vec());
        if tx.send(sample).await.is_err() {
            debug!("sample receiver dropped, ending capture reader");
            break;
        }
    }
    debug!(bytes = total, "capture stream ended");
}

async fn log_stderr(stderr: ChildStderr) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        debug!(target: "ffmpeg", "{}", line);
    }
}

#[async_trait]
impl CaptureSource for FfmpegCapture {
    async fn start(&self) -> Result<mpsc::Receiver<MediaSample>, CaptureError> {
        let mut running = self.running.lock().await;
        if running.is_some() {
            return Err(CaptureError::AlreadyRunning);
        }

        let args = Self::build_ffmpeg_args(&self.settings);
        let mut child = Self::spawn_ffmpeg(&args)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| CaptureError::StartFailed("ffmpeg stdout unavailable".to_string()))?;
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(log_stderr(stderr));
        }

        let (tx, rx) = mpsc::channel(SAMPLE_QUEUE_DEPTH);
        let reader = tokio::spawn(read_samples(stdout, tx));

        info!(
            format = %self.settings.format,
            device = %self.settings.device,
            "capture started"
        );
        *running = Some(RunningCapture { child, reader });
        Ok(rx)
    }

    async fn stop(&self) -> Result<(), CaptureError> {
        let Some(RunningCapture { mut child, reader }) = self.running.lock().await.take() else {
            return Ok(());
        };

        // ffmpeg may already have exited on its own
        if let Ok(None) = child.try_wait() {
            Self::interrupt(&mut child)?;
        }

        match timeout(STOP_GRACE, child.wait()).await {
            Ok(Ok(status)) => debug!(%status, "ffmpeg exited"),
            Ok(Err(e)) => warn!(error = %e, "failed to wait for ffmpeg"),
            Err(_) => {
                warn!("ffmpeg did not exit after interrupt, killing");
                let _ = child.kill().await;
            }
        }

        if let Err(e) = reader.await {
            warn!(error = %e, "capture reader ended abnormally");
        }
        info!("capture stopped");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_select_input_and_mpegts_output() {
        let args = FfmpegCapture::build_ffmpeg_args(&CaptureSettings::new("v4l2", "/dev/video0"));

        let input = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input + 1], "/dev/video0");
        assert_eq!(&args[3..5], ["-f", "v4l2"]);
        assert!(args.contains(&"-framerate".to_string()));
        assert_eq!(args[args.len() - 3..], ["-f", "mpegts", "pipe:1"]);
    }

    #[test]
    fn lavfi_input_skips_framerate() {
        let args = FfmpegCapture::build_ffmpeg_args(&CaptureSettings::new(
            "lavfi",
            "testsrc=size=320x240:rate=10",
        ));

        assert!(!args.contains(&"-framerate".to_string()));
    }

    #[tokio::test]
    async fn stop_without_start_is_a_no_op() {
        let capture = FfmpegCapture::new(CaptureSettings::new("v4l2", "/dev/video0"));
        assert!(capture.stop().await.is_ok());
    }
}
