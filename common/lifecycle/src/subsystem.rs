use std::fmt;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::LifecycleError;

/// Where a subsystem is in its life, as tracked by the [`Orchestrator`](crate::Orchestrator).
///
/// `Created -> Starting -> Running -> ShuttingDown -> Stopped`, or
/// `Starting -> Failed` when start returns an error. `Stopped` is reached
/// after a shutdown attempt whatever its outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubsystemState {
    Created,
    Starting,
    Running,
    ShuttingDown,
    Stopped,
    Failed,
}

impl fmt::Display for SubsystemState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SubsystemState::Created => "created",
            SubsystemState::Starting => "starting",
            SubsystemState::Running => "running",
            SubsystemState::ShuttingDown => "shutting_down",
            SubsystemState::Stopped => "stopped",
            SubsystemState::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// A long-lived part of the process owned by the orchestrator.
///
/// `start` must not block: listeners are expected to spawn their accept loop
/// and return. `shutdown` gets the grace period for draining in-flight work.
#[async_trait]
pub trait Subsystem: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&mut self) -> Result<(), LifecycleError> {
        Ok(())
    }

    async fn shutdown(&mut self, grace: Duration) -> Result<(), LifecycleError>;
}
