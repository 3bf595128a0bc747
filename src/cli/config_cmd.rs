//! Config command handler

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, CaptureConfig};
use crate::domain::error::ConfigError;
use crate::domain::recording::Duration;

use super::app::{check_datagram_size, check_message_type, parse_destination};
use super::args::{is_valid_config_key, ConfigAction, VALID_CONFIG_KEYS, VALID_LOG_LEVELS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    ensure_valid_key(key)?;
    validate_config_value(key, value)?;

    let mut config = store.load().await?;
    apply_value(&mut config, key, value)?;

    store.save(&config).await?;
    presenter.success(&format!("{} = {}", key, value));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    ensure_valid_key(key)?;

    let config = store.load().await?;
    match get_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    if presenter.is_json() {
        presenter.json(&config);
        return Ok(());
    }

    for key in VALID_CONFIG_KEYS {
        let value = get_value(&config, key);
        presenter.key_value(key, value.as_deref().unwrap_or(NOT_SET));
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn ensure_valid_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!("Unknown key. Valid keys: {}", VALID_CONFIG_KEYS.join(", ")),
    })
}

fn invalid(key: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.into(),
    }
}

/// Validate a config value based on key type
fn validate_config_value(key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "segment_duration" | "max_duration" => {
            value
                .parse::<Duration>()
                .map_err(|e| invalid(key, e.to_string()))?;
        }
        "destination" => {
            parse_destination(value).map_err(|e| invalid(key, e))?;
        }
        "transport" => {
            value
                .parse::<crate::domain::config::TransportMode>()
                .map_err(|e| invalid(key, e))?;
        }
        "message_type" => {
            let parsed = value
                .parse::<u16>()
                .map_err(|_| invalid(key, "Value must be a number between 0 and 9999"))?;
            check_message_type(parsed).map_err(|e| invalid(key, e))?;
        }
        "frame_delay_us" => {
            value
                .parse::<u64>()
                .map_err(|_| invalid(key, "Value must be a whole number of microseconds"))?;
        }
        "max_datagram_size" => {
            let parsed = value
                .parse::<usize>()
                .map_err(|_| invalid(key, "Value must be a number of bytes"))?;
            check_datagram_size(parsed).map_err(|e| invalid(key, e))?;
        }
        "log_level" => {
            let lower = value.to_lowercase();
            if !VALID_LOG_LEVELS.contains(&lower.as_str()) {
                return Err(invalid(
                    key,
                    format!(
                        "Invalid value '{}'. Valid options: {}",
                        value,
                        VALID_LOG_LEVELS.join(", ")
                    ),
                ));
            }
        }
        _ => {
            if value.trim().is_empty() {
                return Err(invalid(key, "Value must not be empty"));
            }
        }
    }
    Ok(())
}

/// Store an already validated value
fn apply_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "segment_duration" => config.segment_duration = Some(value.to_string()),
        "max_duration" => config.max_duration = Some(value.to_string()),
        "sessions_dir" => config.sessions_dir = Some(value.to_string()),
        "destination" => config.destination = Some(value.to_string()),
        "transport" => config.transport = Some(value.trim().to_lowercase()),
        "message_type" => {
            config.message_type = Some(value.parse().map_err(|_| invalid(key, "not a number"))?)
        }
        "frame_delay_us" => {
            config.frame_delay_us = Some(value.parse().map_err(|_| invalid(key, "not a number"))?)
        }
        "max_datagram_size" => {
            config.max_datagram_size =
                Some(value.parse().map_err(|_| invalid(key, "not a number"))?)
        }
        "broadcast_command" => config.broadcast_command = Some(value.to_string()),
        "log_level" => config.log_level = Some(value.to_lowercase()),
        "capture.format" => {
            config.capture.get_or_insert_with(CaptureConfig::default).format =
                Some(value.to_string())
        }
        "capture.device" => {
            config.capture.get_or_insert_with(CaptureConfig::default).device =
                Some(value.to_string())
        }
        _ => return Err(invalid(key, "Unknown key")),
    }
    Ok(())
}

fn get_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "segment_duration" => config.segment_duration.clone(),
        "max_duration" => config.max_duration.clone(),
        "sessions_dir" => config.sessions_dir.clone(),
        "destination" => config.destination.clone(),
        "transport" => config.transport.clone(),
        "message_type" => config.message_type.map(|v| v.to_string()),
        "frame_delay_us" => config.frame_delay_us.map(|v| v.to_string()),
        "max_datagram_size" => config.max_datagram_size.map(|v| v.to_string()),
        "broadcast_command" => config.broadcast_command.clone(),
        "log_level" => config.log_level.clone(),
        "capture.format" => config.capture.as_ref().and_then(|c| c.format.clone()),
        "capture.device" => config.capture.as_ref().and_then(|c| c.device.clone()),
        _ => None,
    }
}
