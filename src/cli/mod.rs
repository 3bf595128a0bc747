//! CLI layer - Command-line interface
//!
//! Contains argument parsing, output formatting, signal handling,
//! and the runners behind each subcommand.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod logging;
pub mod presenter;
pub mod record_cmd;
pub mod send_cmd;
pub mod signals;

// Re-export commonly used types
pub use app::{load_merged_config, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{Cli, Commands, ConfigAction, RecordArgs, SendArgs};
pub use presenter::Presenter;
pub use record_cmd::{run_record, RecordOptions};
pub use send_cmd::{run_send, SendOptions};
