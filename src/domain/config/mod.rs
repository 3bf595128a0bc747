//! Configuration value objects

pub mod app_config;

pub use app_config::{
    default_sessions_dir, AppConfig, CaptureConfig, TransportMode, DEFAULT_DESTINATION,
    DEFAULT_FRAME_DELAY_US, DEFAULT_LOG_LEVEL,
};
