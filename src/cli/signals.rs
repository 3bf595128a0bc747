//! Shutdown signal handling

use std::fmt;

#[cfg(unix)]
use tokio::signal::unix::{signal, Signal, SignalKind};

/// Which signal asked us to stop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownKind {
    /// SIGINT / Ctrl+C
    Interrupt,
    /// SIGTERM
    Terminate,
}

impl fmt::Display for ShutdownKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interrupt => write!(f, "SIGINT"),
            Self::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Listens for SIGINT and SIGTERM.
///
/// Install before starting work so an early Ctrl+C is not lost.
pub struct ShutdownSignal {
    #[cfg(unix)]
    sigint: Signal,
    #[cfg(unix)]
    sigterm: Signal,
}

impl ShutdownSignal {
    #[cfg(unix)]
    pub fn install() -> Result<Self, std::io::Error> {
        Ok(Self {
            sigint: signal(SignalKind::interrupt())?,
            sigterm: signal(SignalKind::terminate())?,
        })
    }

    #[cfg(not(unix))]
    pub fn install() -> Result<Self, std::io::Error> {
        Ok(Self {})
    }

    /// Wait for the first shutdown signal
    #[cfg(unix)]
    pub async fn recv(mut self) -> ShutdownKind {
        tokio::select! {
            _ = self.sigint.recv() => ShutdownKind::Interrupt,
            _ = self.sigterm.recv() => ShutdownKind::Terminate,
        }
    }

    #[cfg(not(unix))]
    pub async fn recv(self) -> ShutdownKind {
        // A failed listener means Ctrl+C can never arrive; wait forever
        if tokio::signal::ctrl_c().await.is_err() {
            std::future::pending::<()>().await;
        }
        ShutdownKind::Interrupt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shutdown_kind_display() {
        assert_eq!(ShutdownKind::Interrupt.to_string(), "SIGINT");
        assert_eq!(ShutdownKind::Terminate.to_string(), "SIGTERM");
    }

    #[tokio::test]
    async fn install_inside_runtime() {
        assert!(ShutdownSignal::install().is_ok());
    }
}
