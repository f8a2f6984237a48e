//! Lifecycle error types.

use std::time::Duration;

use thiserror::Error;

/// Errors returned while starting or stopping a [`Subsystem`](crate::Subsystem).
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// The listener could not be opened at construction.
    #[error("{name} could not bind {addr}: {source}")]
    Bind {
        name: String,
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{0} is already running")]
    AlreadyRunning(String),

    /// Shutdown was requested on a subsystem that is not running.
    #[error("{0} is not running")]
    NotRunning(String),

    #[error("{name} failed to start: {reason}")]
    Start { name: String, reason: String },

    /// In-flight work did not drain within the grace period and was dropped.
    #[error("{name} did not stop within {grace:?}, forced close")]
    ShutdownTimeout { name: String, grace: Duration },

    #[error("{name} failed to shut down: {reason}")]
    Shutdown { name: String, reason: String },

    #[error("no subsystem named '{0}'")]
    UnknownSubsystem(String),

    #[error("failed to install signal handler: {0}")]
    Signal(#[source] std::io::Error),
}
