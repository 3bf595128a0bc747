//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

use crate::domain::config::{AppConfig, CaptureConfig, TransportMode};

/// segcast - record a live feed into short segments and ship each one
#[derive(Parser, Debug)]
#[command(name = "segcast")]
#[command(version)]
#[command(about = "Record webcam video into fixed-length segments and send each one over UDP")]
#[command(long_about = None)]
pub struct Cli {
    /// Print machine-readable JSON summaries on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Log filter (error, warn, info, debug, trace); RUST_LOG wins when set
    #[arg(long, global = true, value_name = "LEVEL")]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Capture, segment and deliver until interrupted
    Record(RecordArgs),
    /// Send one file as a single message
    Send(SendArgs),
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Transport flags shared by `record` and `send`
#[derive(Args, Debug, Clone, Default)]
pub struct TransportArgs {
    /// Delivery mode
    #[arg(short = 't', long, value_name = "MODE")]
    pub transport: Option<TransportArg>,

    /// Datagram destination (host:port)
    #[arg(long, value_name = "ADDR")]
    pub destination: Option<String>,

    /// Pause between datagrams in microseconds
    #[arg(long, value_name = "MICROS")]
    pub frame_delay_us: Option<u64>,

    /// Largest datagram including the 9-byte header (at most 4000)
    #[arg(long, value_name = "BYTES")]
    pub max_datagram_size: Option<usize>,

    /// Four-digit message type written into every header
    #[arg(long, value_name = "TYPE")]
    pub message_type: Option<u16>,

    /// Helper run per segment in broadcast mode
    #[arg(long, value_name = "COMMAND")]
    pub broadcast_command: Option<String>,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RecordArgs {
    /// Segment length (e.g., 4s, 500ms, 1m)
    #[arg(short = 's', long, value_name = "TIME")]
    pub segment_duration: Option<String>,

    /// Stop on its own after this long
    #[arg(short = 'm', long, value_name = "TIME")]
    pub max_duration: Option<String>,

    /// Fixed four-digit channel instead of a random one
    #[arg(short = 'c', long, value_name = "NNNN")]
    pub channel: Option<String>,

    /// Directory for segment files
    #[arg(long, value_name = "DIR")]
    pub sessions_dir: Option<PathBuf>,

    /// ffmpeg input format (avfoundation, v4l2, lavfi, ...)
    #[arg(long, value_name = "FORMAT")]
    pub format: Option<String>,

    /// ffmpeg input device
    #[arg(long, value_name = "DEVICE")]
    pub device: Option<String>,

    #[command(flatten)]
    pub transport: TransportArgs,
}

#[derive(Args, Debug, Clone)]
pub struct SendArgs {
    /// File to send
    pub file: PathBuf,

    /// Four-digit channel written into every header
    #[arg(short = 'c', long, value_name = "NNNN", default_value = "0001")]
    pub channel: String,

    /// Message id reported for this send
    #[arg(long, value_name = "ID", default_value_t = 1)]
    pub message_id: u32,

    #[command(flatten)]
    pub transport: TransportArgs,
}

/// Config action subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

/// Transport argument for clap ValueEnum
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum TransportArg {
    Chunked,
    Broadcast,
}

impl From<TransportArg> for TransportMode {
    fn from(arg: TransportArg) -> Self {
        match arg {
            TransportArg::Chunked => TransportMode::Chunked,
            TransportArg::Broadcast => TransportMode::Broadcast,
        }
    }
}

impl TransportArgs {
    /// Overrides carried by these flags
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            transport: self
                .transport
                .map(|t| TransportMode::from(t).as_str().to_string()),
            destination: self.destination.clone(),
            frame_delay_us: self.frame_delay_us,
            max_datagram_size: self.max_datagram_size,
            message_type: self.message_type,
            broadcast_command: self.broadcast_command.clone(),
            ..Default::default()
        }
    }
}

impl RecordArgs {
    /// Overrides carried by these flags
    pub fn to_config(&self) -> AppConfig {
        let capture = if self.format.is_some() || self.device.is_some() {
            Some(CaptureConfig {
                format: self.format.clone(),
                device: self.device.clone(),
            })
        } else {
            None
        };

        AppConfig {
            segment_duration: self.segment_duration.clone(),
            max_duration: self.max_duration.clone(),
            sessions_dir: self
                .sessions_dir
                .as_ref()
                .map(|p| p.to_string_lossy().into_owned()),
            capture,
            ..Default::default()
        }
        .merge(self.transport.to_config())
    }
}

/// Valid config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "segment_duration",
    "max_duration",
    "sessions_dir",
    "destination",
    "transport",
    "message_type",
    "frame_delay_us",
    "max_datagram_size",
    "broadcast_command",
    "log_level",
    "capture.format",
    "capture.device",
];

/// Valid log levels
pub const VALID_LOG_LEVELS: &[&str] = &["error", "warn", "info", "debug", "trace"];

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_parses_record_defaults() {
        let cli = Cli::parse_from(["segcast", "record"]);
        assert!(!cli.json);
        let Commands::Record(args) = cli.command else {
            panic!("Expected record command");
        };
        assert!(args.segment_duration.is_none());
        assert!(args.channel.is_none());
        assert!(args.transport.transport.is_none());
    }

    #[test]
    fn cli_parses_record_options() {
        let cli = Cli::parse_from([
            "segcast",
            "record",
            "-s",
            "2s",
            "-m",
            "1m",
            "-c",
            "0042",
            "-t",
            "broadcast",
            "--broadcast-command",
            "peer-send",
        ]);
        let Commands::Record(args) = cli.command else {
            panic!("Expected record command");
        };
        assert_eq!(args.segment_duration.as_deref(), Some("2s"));
        assert_eq!(args.max_duration.as_deref(), Some("1m"));
        assert_eq!(args.channel.as_deref(), Some("0042"));
        assert_eq!(args.transport.transport, Some(TransportArg::Broadcast));

        let config = args.to_config();
        assert_eq!(config.transport.as_deref(), Some("broadcast"));
        assert_eq!(config.broadcast_command.as_deref(), Some("peer-send"));
    }

    #[test]
    fn cli_parses_send() {
        let cli = Cli::parse_from([
            "segcast",
            "--json",
            "send",
            "clip.mp4",
            "--channel",
            "0007",
            "--destination",
            "127.0.0.1:9000",
            "--frame-delay-us",
            "0",
        ]);
        assert!(cli.json);
        let Commands::Send(args) = cli.command else {
            panic!("Expected send command");
        };
        assert_eq!(args.file, PathBuf::from("clip.mp4"));
        assert_eq!(args.channel, "0007");
        assert_eq!(args.message_id, 1);
        assert_eq!(args.transport.destination.as_deref(), Some("127.0.0.1:9000"));
        assert_eq!(args.transport.frame_delay_us, Some(0));
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::parse_from(["segcast", "config", "list", "--log-level", "debug"]);
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn cli_parses_config_set() {
        let cli = Cli::parse_from(["segcast", "config", "set", "transport", "broadcast"]);
        if let Commands::Config {
            action: ConfigAction::Set { key, value },
        } = cli.command
        {
            assert_eq!(key, "transport");
            assert_eq!(value, "broadcast");
        } else {
            panic!("Expected Config Set command");
        }
    }

    #[test]
    fn record_capture_flags_build_capture_table() {
        let args = RecordArgs {
            format: Some("lavfi".to_string()),
            ..Default::default()
        };
        let config = args.to_config();
        assert_eq!(config.capture_format_or_default(), "lavfi");
    }

    #[test]
    fn valid_config_keys() {
        assert!(is_valid_config_key("destination"));
        assert!(is_valid_config_key("capture.device"));
        assert!(!is_valid_config_key("api_key"));
    }

    #[test]
    fn verify_cli() {
        Cli::command().debug_assert();
    }
}
