//! Orchestrator: ordered start, ordered partial-failure tolerant shutdown.

use std::time::{Duration, Instant};

use tracing::{debug, error, info, warn};

use crate::error::LifecycleError;
use crate::metrics;
use crate::subsystem::{Subsystem, SubsystemState};

/// Extra wait after the last shutdown step, on top of the grace period.
pub const DRAIN_PADDING: Duration = Duration::from_secs(1);

/// What happens when a subsystem in the start plan fails to start.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartPolicy {
    /// Abort the whole start sequence.
    Required,
    /// Log and carry on.
    BestEffort,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Every step ran. `clean` is false if any of them reported an error.
    Completed { clean: bool },
    /// Shutdown had already run, nothing was done.
    AlreadyStopped,
}

struct Entry {
    subsystem: Box<dyn Subsystem>,
    state: SubsystemState,
}

/// Owns the long-lived subsystems of the process and sequences their start
/// and shutdown.
pub struct Orchestrator {
    name: String,
    entries: Vec<Entry>,
    stopped: bool,
}

impl Orchestrator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            entries: Vec::new(),
            stopped: false,
        }
    }

    /// Takes ownership of a subsystem. Registration order is construction order.
    pub fn register(&mut self, subsystem: Box<dyn Subsystem>) {
        debug!(component = subsystem.name(), "Lifecycle: component registered");
        self.entries.push(Entry {
            subsystem,
            state: SubsystemState::Created,
        });
    }

    pub fn state(&self, name: &str) -> Option<SubsystemState> {
        self.entries
            .iter()
            .find(|e| e.subsystem.name() == name)
            .map(|e| e.state)
    }

    fn position(&self, name: &str) -> Result<usize, LifecycleError> {
        self.entries
            .iter()
            .position(|e| e.subsystem.name() == name)
            .ok_or_else(|| LifecycleError::UnknownSubsystem(name.to_owned()))
    }

    /// Starts the subsystems.
    ///
    /// Subsystems missing from `plan` are started first, in registration
    /// order, and must succeed. The plan then runs in its own order: a
    /// `Required` failure aborts, a `BestEffort` failure is logged.
    pub async fn start(&mut self, plan: &[(&str, StartPolicy)]) -> Result<(), LifecycleError> {
        for (name, _) in plan {
            self.position(name)?;
        }

        let unlisted: Vec<usize> = (0..self.entries.len())
            .filter(|&i| {
                let name = self.entries[i].subsystem.name();
                !plan.iter().any(|(n, _)| *n == name)
            })
            .collect();
        for index in unlisted {
            self.start_one(index, StartPolicy::Required).await?;
        }

        for (name, policy) in plan {
            let index = self.position(name)?;
            self.start_one(index, *policy).await?;
        }
        Ok(())
    }

    async fn start_one(&mut self, index: usize, policy: StartPolicy) -> Result<(), LifecycleError> {
        let entry = &mut self.entries[index];
        if entry.state != SubsystemState::Created {
            return Ok(());
        }

        entry.state = SubsystemState::Starting;
        match entry.subsystem.start().await {
            Ok(()) => {
                entry.state = SubsystemState::Running;
                let component = entry.subsystem.name();
                metrics::emit_component_start_result(&self.name, component, "started");
                info!(component, "Lifecycle: component started");
                Ok(())
            }
            Err(e) => {
                entry.state = SubsystemState::Failed;
                let component = entry.subsystem.name();
                metrics::emit_component_start_result(&self.name, component, "failed");
                match policy {
                    StartPolicy::Required => {
                        error!(component, "Lifecycle: start aborted: {}", e);
                        Err(e)
                    }
                    StartPolicy::BestEffort => {
                        warn!(component, "Lifecycle: component failed to start: {}", e);
                        Ok(())
                    }
                }
            }
        }
    }

    /// Shuts every subsystem down, then waits `grace` plus [`DRAIN_PADDING`].
    ///
    /// `order` lists the first steps; remaining subsystems follow in reverse
    /// registration order. Each step gets `grace` and runs whatever happened
    /// to the previous ones. A second call does nothing.
    pub async fn shutdown(&mut self, order: &[&str], grace: Duration) -> ShutdownOutcome {
        if self.stopped {
            info!(app = %self.name, "Lifecycle: already stopped");
            return ShutdownOutcome::AlreadyStopped;
        }
        self.stopped = true;

        metrics::emit_shutdown_initiated(&self.name);
        info!(
            app = %self.name,
            grace_secs = grace.as_secs_f64(),
            "Lifecycle: shutdown initiated"
        );
        let clock = Instant::now();

        let mut steps: Vec<usize> = Vec::with_capacity(self.entries.len());
        for name in order {
            match self.position(name) {
                Ok(index) if !steps.contains(&index) => steps.push(index),
                Ok(_) => {}
                Err(_) => debug!(component = name, "Lifecycle: not configured, skipping"),
            }
        }
        for index in (0..self.entries.len()).rev() {
            if !steps.contains(&index) {
                steps.push(index);
            }
        }

        let mut clean = true;
        for index in steps {
            clean &= self.shutdown_one(index, grace).await;
        }

        tokio::time::sleep(grace + DRAIN_PADDING).await;

        metrics::emit_shutdown_completed(&self.name, clean);
        let total = clock.elapsed().as_secs_f64();
        if clean {
            info!(clean, total_duration_secs = total, "Lifecycle: shutdown complete");
        } else {
            warn!(
                clean,
                total_duration_secs = total,
                "Lifecycle: shutdown complete with failures"
            );
        }
        ShutdownOutcome::Completed { clean }
    }

    async fn shutdown_one(&mut self, index: usize, grace: Duration) -> bool {
        let entry = &mut self.entries[index];
        entry.state = SubsystemState::ShuttingDown;

        let started = Instant::now();
        // Backstop for subsystems that do not enforce the grace period themselves.
        let backstop = grace + DRAIN_PADDING;
        let result = match tokio::time::timeout(backstop, entry.subsystem.shutdown(grace)).await {
            Ok(result) => result,
            Err(_) => Err(LifecycleError::ShutdownTimeout {
                name: entry.subsystem.name().to_owned(),
                grace,
            }),
        };
        entry.state = SubsystemState::Stopped;

        let duration = started.elapsed().as_secs_f64();
        let component = entry.subsystem.name();
        let (label, clean) = match &result {
            Ok(()) => {
                info!(
                    component,
                    duration_secs = duration,
                    result = "completed",
                    "Lifecycle: component completed shutdown"
                );
                ("completed", true)
            }
            Err(LifecycleError::NotRunning(_)) => {
                info!(
                    component,
                    result = "not_running",
                    "Lifecycle: component already stopped"
                );
                ("not_running", true)
            }
            Err(e @ LifecycleError::ShutdownTimeout { .. }) => {
                warn!(
                    component,
                    duration_secs = duration,
                    result = "timeout",
                    "Lifecycle: component timed out during graceful shutdown: {}",
                    e
                );
                ("timeout", false)
            }
            Err(e) => {
                warn!(
                    component,
                    duration_secs = duration,
                    result = "failed",
                    "Lifecycle: component failed to shut down: {}",
                    e
                );
                ("failed", false)
            }
        };
        metrics::emit_component_shutdown(&self.name, component, label, duration);
        clean
    }
}
