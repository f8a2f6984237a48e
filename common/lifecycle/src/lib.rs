//! Process lifecycle: subsystem registration, ordered start, ordered and
//! partial-failure tolerant graceful shutdown, signal trapping and metrics.

mod error;
mod manager;
mod metrics;
mod server;
mod signals;
mod subsystem;

pub use error::LifecycleError;
pub use manager::{Orchestrator, ShutdownOutcome, StartPolicy, DRAIN_PADDING};
pub use server::HttpServer;
pub use signals::wait_for_shutdown_signal;
pub use subsystem::{Subsystem, SubsystemState};
