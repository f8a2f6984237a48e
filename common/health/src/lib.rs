//! Health aggregation for a multi-component process.
//!
//! Components register a [`Probe`] with an [`Aggregator`], flagged as required
//! or optional. Every call to [`HealthCheck::check_all`] probes all of them
//! concurrently, each under its own deadline, and reduces the outcomes:
//!   - the process is healthy unless a required component failed
//!   - failing optional components are reported but never degrade the verdict
//!   - an empty registry is healthy
//!
//! [`probe_router`] serves the verdict as JSON on `/live` and `/ready`.

mod aggregator;
mod http_probe;
mod metrics;
mod routes;
mod server;
mod status;

pub use aggregator::{Aggregator, AggregatorError, HealthCheck, Probe};
pub use http_probe::{parse_as, HttpServiceProbe, ResponseCheck};
pub use routes::{RouteEntry, RouteSet, RouteTable};
pub use server::probe_router;
pub use status::{GlobalStatus, ProbeResult, ProbeStatus, WireError};
