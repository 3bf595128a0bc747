//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

/// Install the global subscriber. Events go to stderr so stdout stays
/// clean for `--json` output. `RUST_LOG` overrides `level`.
pub fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("segcast={}", level)));

    // A second init (tests, embedding) keeps the first subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
