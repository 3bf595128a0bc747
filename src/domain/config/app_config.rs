//! Application configuration value object

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::protocol::{FrameBudget, DEFAULT_MESSAGE_TYPE, MAX_DATAGRAM_SIZE};
use crate::domain::recording::Duration;

/// Default destination of chunked datagrams
pub const DEFAULT_DESTINATION: &str = "127.0.0.1:3001";

/// Default pause between two datagrams, in microseconds
pub const DEFAULT_FRAME_DELAY_US: u64 = 1000;

/// Default tracing filter
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// How closed segments leave the machine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TransportMode {
    /// Header-prefixed datagrams, sent by this process
    #[default]
    Chunked,
    /// Whole file handed to an external broadcast helper
    Broadcast,
}

impl TransportMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Chunked => "chunked",
            Self::Broadcast => "broadcast",
        }
    }
}

impl std::str::FromStr for TransportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "chunked" => Ok(Self::Chunked),
            "broadcast" => Ok(Self::Broadcast),
            other => Err(format!(
                "Invalid transport: \"{}\". Valid transports are: chunked, broadcast",
                other
            )),
        }
    }
}

/// Capture device configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CaptureConfig {
    /// ffmpeg input format (avfoundation, v4l2, lavfi, ...)
    pub format: Option<String>,
    /// ffmpeg input device
    pub device: Option<String>,
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub segment_duration: Option<String>,
    pub max_duration: Option<String>,
    pub sessions_dir: Option<String>,
    pub destination: Option<String>,
    pub transport: Option<String>,
    pub message_type: Option<u16>,
    pub frame_delay_us: Option<u64>,
    pub max_datagram_size: Option<usize>,
    pub broadcast_command: Option<String>,
    pub log_level: Option<String>,
    pub capture: Option<CaptureConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        Self {
            segment_duration: Some(Duration::default_segment().to_string()),
            max_duration: None,
            sessions_dir: Some(default_sessions_dir().to_string_lossy().into_owned()),
            destination: Some(DEFAULT_DESTINATION.to_string()),
            transport: Some(TransportMode::Chunked.as_str().to_string()),
            message_type: Some(DEFAULT_MESSAGE_TYPE),
            frame_delay_us: Some(DEFAULT_FRAME_DELAY_US),
            max_datagram_size: Some(MAX_DATAGRAM_SIZE),
            broadcast_command: None,
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            capture: Some(CaptureConfig {
                format: Some(default_capture_format().to_string()),
                device: Some(default_capture_device().to_string()),
            }),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            segment_duration: other.segment_duration.or(self.segment_duration),
            max_duration: other.max_duration.or(self.max_duration),
            sessions_dir: other.sessions_dir.or(self.sessions_dir),
            destination: other.destination.or(self.destination),
            transport: other.transport.or(self.transport),
            message_type: other.message_type.or(self.message_type),
            frame_delay_us: other.frame_delay_us.or(self.frame_delay_us),
            max_datagram_size: other.max_datagram_size.or(self.max_datagram_size),
            broadcast_command: other.broadcast_command.or(self.broadcast_command),
            log_level: other.log_level.or(self.log_level),
            capture: Self::merge_capture_config(self.capture, other.capture),
        }
    }

    fn merge_capture_config(
        base: Option<CaptureConfig>,
        other: Option<CaptureConfig>,
    ) -> Option<CaptureConfig> {
        match (base, other) {
            (None, None) => None,
            (Some(b), None) => Some(b),
            (None, Some(o)) => Some(o),
            (Some(b), Some(o)) => Some(CaptureConfig {
                format: o.format.or(b.format),
                device: o.device.or(b.device),
            }),
        }
    }

    /// Segment rotation interval, or default if not set/invalid
    pub fn segment_duration_or_default(&self) -> Duration {
        self.segment_duration
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(Duration::default_segment)
    }

    /// Destination socket address, or default if not set/invalid
    pub fn destination_or_default(&self) -> SocketAddr {
        self.destination
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_else(default_destination)
    }

    /// Transport mode, or chunked if not set/invalid
    pub fn transport_or_default(&self) -> TransportMode {
        self.transport
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    pub fn message_type_or_default(&self) -> u16 {
        self.message_type.unwrap_or(DEFAULT_MESSAGE_TYPE)
    }

    pub fn frame_delay_us_or_default(&self) -> u64 {
        self.frame_delay_us.unwrap_or(DEFAULT_FRAME_DELAY_US)
    }

    /// Frame budget, or the 4000-byte default if unset or out of range
    pub fn frame_budget_or_default(&self) -> FrameBudget {
        self.max_datagram_size
            .and_then(FrameBudget::new)
            .unwrap_or_default()
    }

    pub fn sessions_dir_or_default(&self) -> PathBuf {
        self.sessions_dir
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(default_sessions_dir)
    }

    pub fn log_level_or_default(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn capture_format_or_default(&self) -> &str {
        self.capture
            .as_ref()
            .and_then(|c| c.format.as_deref())
            .unwrap_or(default_capture_format())
    }

    pub fn capture_device_or_default(&self) -> &str {
        self.capture
            .as_ref()
            .and_then(|c| c.device.as_deref())
            .unwrap_or(default_capture_device())
    }
}

fn default_destination() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 3001))
}

/// Per-application directory that receives segment files
pub fn default_sessions_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("segcast")
        .join("sessions")
}

/// ffmpeg input format for the platform webcam
pub fn default_capture_format() -> &'static str {
    if cfg!(target_os = "macos") {
        "avfoundation"
    } else {
        "v4l2"
    }
}

/// ffmpeg input device for the platform webcam
pub fn default_capture_device() -> &'static str {
    if cfg!(target_os = "macos") {
        "0:0"
    } else {
        "/dev/video0"
    }
}
