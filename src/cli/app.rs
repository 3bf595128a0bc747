//! Shared runner plumbing: exit codes, config merging, transport selection

use std::env;
use std::net::SocketAddr;

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, TransportMode};
use crate::domain::error::ConfigError;
use crate::domain::protocol::{FrameBudget, HEADER_SIZE, MAX_DATAGRAM_SIZE, MAX_MESSAGE_TYPE};
use crate::domain::recording::Duration;
use crate::infrastructure::{ChunkedSenderConfig, CommandBroadcaster};

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment override for the datagram destination
pub const DESTINATION_ENV: &str = "SEGCAST_DESTINATION";

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config<S: ConfigStore>(
    store: &S,
    cli_config: AppConfig,
) -> Result<AppConfig, ConfigError> {
    let file_config = store.load().await?;

    let env_config = AppConfig {
        destination: env::var(DESTINATION_ENV).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    };

    // Merge: defaults < file < env < cli
    Ok(AppConfig::defaults()
        .merge(file_config)
        .merge(env_config)
        .merge(cli_config))
}

/// Where delivered segments go
#[derive(Debug, Clone)]
pub enum TransportChoice {
    Chunked(ChunkedSenderConfig),
    Broadcast(CommandBroadcaster),
}

impl TransportChoice {
    pub fn mode(&self) -> TransportMode {
        match self {
            Self::Chunked(_) => TransportMode::Chunked,
            Self::Broadcast(_) => TransportMode::Broadcast,
        }
    }
}

/// Validate the transport settings of a merged config.
///
/// Unlike the `*_or_default` accessors, malformed values are reported
/// instead of silently replaced.
pub fn resolve_transport(config: &AppConfig) -> Result<TransportChoice, String> {
    let mode = match config.transport.as_deref() {
        Some(raw) => raw.parse::<TransportMode>()?,
        None => TransportMode::default(),
    };

    match mode {
        TransportMode::Chunked => {
            if let Some(raw) = config.destination.as_deref() {
                parse_destination(raw)?;
            }
            if let Some(message_type) = config.message_type {
                check_message_type(message_type)?;
            }
            if let Some(size) = config.max_datagram_size {
                check_datagram_size(size)?;
            }
            Ok(TransportChoice::Chunked(ChunkedSenderConfig::from_app_config(
                config,
            )))
        }
        TransportMode::Broadcast => {
            let command = config.broadcast_command.as_deref().unwrap_or_default();
            CommandBroadcaster::from_command_line(command)
                .map(TransportChoice::Broadcast)
                .ok_or_else(|| {
                    "Broadcast transport needs a helper. Pass --broadcast-command or run 'segcast config set broadcast_command <cmd>'".to_string()
                })
        }
    }
}

/// Parse a `TIME` value, naming the offending option on failure
pub fn parse_duration(option: &str, raw: &str) -> Result<Duration, String> {
    raw.parse::<Duration>()
        .map_err(|e| format!("Invalid {}: {}", option, e))
}

pub fn parse_destination(raw: &str) -> Result<SocketAddr, String> {
    raw.parse::<SocketAddr>().map_err(|_| {
        format!(
            "Invalid destination: \"{}\". Expected host:port with a numeric IP (e.g., 127.0.0.1:3001)",
            raw
        )
    })
}

pub fn check_message_type(message_type: u16) -> Result<(), String> {
    if message_type > MAX_MESSAGE_TYPE {
        return Err(format!(
            "Invalid message type: {}. Must fit in 4 digits",
            message_type
        ));
    }
    Ok(())
}

pub fn check_datagram_size(size: usize) -> Result<(), String> {
    if FrameBudget::new(size).is_none() {
        return Err(format!(
            "Invalid datagram size: {}. Must be between {} and {}",
            size,
            HEADER_SIZE + 1,
            MAX_DATAGRAM_SIZE
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_resolve_to_chunked_localhost() {
        let choice = resolve_transport(&AppConfig::defaults()).unwrap();
        let TransportChoice::Chunked(config) = choice else {
            panic!("Expected chunked transport");
        };
        assert_eq!(config.destination.to_string(), "127.0.0.1:3001");
        assert_eq!(config.budget.max_datagram(), 4000);
    }

    #[test]
    fn invalid_destination_is_reported() {
        let config = AppConfig {
            destination: Some("nowhere".to_string()),
            ..AppConfig::defaults()
        };
        assert!(resolve_transport(&config)
            .unwrap_err()
            .contains("Invalid destination"));
    }

    #[test]
    fn broadcast_requires_command() {
        let config = AppConfig {
            transport: Some("broadcast".to_string()),
            ..AppConfig::defaults()
        };
        assert!(resolve_transport(&config).is_err());

        let config = AppConfig {
            broadcast_command: Some("peer-send --fast".to_string()),
            ..config
        };
        assert_eq!(
            resolve_transport(&config).unwrap().mode(),
            TransportMode::Broadcast
        );
    }

    #[test]
    fn unknown_transport_is_reported() {
        let config = AppConfig {
            transport: Some("carrier-pigeon".to_string()),
            ..AppConfig::defaults()
        };
        assert!(resolve_transport(&config)
            .unwrap_err()
            .contains("Invalid transport"));
    }

    #[test]
    fn datagram_size_bounds() {
        assert!(check_datagram_size(HEADER_SIZE).is_err());
        assert!(check_datagram_size(HEADER_SIZE + 1).is_ok());
        assert!(check_datagram_size(MAX_DATAGRAM_SIZE).is_ok());
        assert!(check_datagram_size(MAX_DATAGRAM_SIZE + 1).is_err());
        assert!(check_datagram_size(65_507).is_err());
    }

    #[test]
    fn oversized_datagram_is_a_usage_error() {
        let config = AppConfig {
            max_datagram_size: Some(8000),
            ..AppConfig::defaults()
        };
        assert!(resolve_transport(&config)
            .unwrap_err()
            .contains("between 10 and 4000"));
    }

    #[test]
    fn message_type_bounds() {
        assert!(check_message_type(4402).is_ok());
        assert!(check_message_type(10_000).is_err());
    }

    #[test]
    fn parse_duration_names_option() {
        let err = parse_duration("segment duration", "soon").unwrap_err();
        assert!(err.starts_with("Invalid segment duration"));
    }

    #[tokio::test]
    async fn cli_values_override_file_values() {
        let dir = tempfile::tempdir().unwrap();
        let store = crate::infrastructure::XdgConfigStore::with_path(dir.path().join("c.toml"));
        store
            .save(&AppConfig {
                frame_delay_us: Some(50),
                segment_duration: Some("2s".to_string()),
                ..Default::default()
            })
            .await
            .unwrap();

        let merged = load_merged_config(
            &store,
            AppConfig {
                frame_delay_us: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap();

        assert_eq!(merged.frame_delay_us, Some(0));
        assert_eq!(merged.segment_duration.as_deref(), Some("2s"));
        assert_eq!(merged.message_type, Some(4402));
    }
}
