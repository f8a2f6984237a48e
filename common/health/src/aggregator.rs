use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use futures::future::join_all;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::metrics;
use crate::status::{GlobalStatus, ProbeResult};

/// Anything that can tell whether it is healthy.
///
/// `Ok` carries the healthy message, `Err` the failure detail. Deadlines are
/// enforced by the caller, implementations only need to do the check itself.
#[async_trait]
pub trait Probe: Send + Sync {
    async fn check(&self) -> Result<String, String>;
}

/// Source of the global health verdict, as served on the probe endpoints.
#[async_trait]
pub trait HealthCheck: Send + Sync {
    async fn check_all(&self) -> GlobalStatus;
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregatorError {
    #[error("component '{0}' is already registered")]
    DuplicateComponent(String),
}

struct Component {
    name: String,
    required: bool,
    deadline: Duration,
    probe: Arc<dyn Probe>,
}

/// Runs every registered probe concurrently and folds the results into a
/// [`GlobalStatus`].
///
/// Components are registered once at startup. Each check runs on its own
/// task under its own deadline, so a panicking or hung probe only ever
/// produces an ERROR result for its own component.
pub struct Aggregator {
    name: String,
    components: Vec<Component>,
}

impl Aggregator {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_owned(),
            components: Vec::new(),
        }
    }

    pub fn register(
        &mut self,
        name: &str,
        required: bool,
        deadline: Duration,
        probe: Arc<dyn Probe>,
    ) -> Result<(), AggregatorError> {
        if self.components.iter().any(|c| c.name == name) {
            return Err(AggregatorError::DuplicateComponent(name.to_owned()));
        }

        debug!(
            component = name,
            required,
            deadline_secs = deadline.as_secs_f64(),
            "{} component registered",
            self.name
        );
        self.components.push(Component {
            name: name.to_owned(),
            required,
            deadline,
            probe,
        });
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    async fn probe_one(component: &Component) -> ProbeResult {
        let deadline = component.deadline;
        let probe = component.probe.clone();

        let start = Instant::now();
        let mut task = tokio::spawn(async move { probe.check().await });
        let outcome = match tokio::time::timeout(deadline, &mut task).await {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) => Err(format!("probe aborted: {err}")),
            Err(_) => {
                task.abort();
                Err(format!("probe timed out after {}s", deadline.as_secs_f64()))
            }
        };
        let elapsed = start.elapsed();

        match outcome {
            Ok(message) => ProbeResult::ok(message, elapsed, component.required),
            Err(message) => ProbeResult::error(message, elapsed, component.required),
        }
    }
}

#[async_trait]
impl HealthCheck for Aggregator {
    async fn check_all(&self) -> GlobalStatus {
        let results = join_all(self.components.iter().map(|c| async move {
            let result = Self::probe_one(c).await;
            metrics::emit_probe(&self.name, &c.name, &result);
            (c.name.clone(), result)
        }))
        .await;

        let first_failure = results
            .iter()
            .find(|(_, r)| r.required && !r.is_ok())
            .map(|(name, r)| (name.clone(), r.message.clone()));

        let global = GlobalStatus::reduce(results);
        match first_failure {
            None => info!("{} health check ok", self.name),
            Some((component, message)) => warn!(
                component = %component,
                "{} health check failed: {}",
                self.name,
                message
            ),
        }
        global
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::status::ProbeStatus;

    struct Fixed(Result<&'static str, &'static str>);

    #[async_trait]
    impl Probe for Fixed {
        async fn check(&self) -> Result<String, String> {
            self.0.map(str::to_owned).map_err(str::to_owned)
        }
    }

    struct Slow(Duration);

    #[async_trait]
    impl Probe for Slow {
        async fn check(&self) -> Result<String, String> {
            tokio::time::sleep(self.0).await;
            Ok("eventually".to_string())
        }
    }

    struct Panicking;

    #[async_trait]
    impl Probe for Panicking {
        async fn check(&self) -> Result<String, String> {
            panic!("probe exploded")
        }
    }

    struct Counting(Arc<AtomicUsize>);

    #[async_trait]
    impl Probe for Counting {
        async fn check(&self) -> Result<String, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("counted".to_string())
        }
    }

    const DEADLINE: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn empty_aggregator_is_ok() {
        let aggregator = Aggregator::new("readiness");
        let global = aggregator.check_all().await;
        assert_eq!(global.status, ProbeStatus::Ok);
        assert!(global.components.is_empty());
    }

    #[tokio::test]
    async fn rejects_duplicate_names() {
        let mut aggregator = Aggregator::new("readiness");
        aggregator
            .register("db", true, DEADLINE, Arc::new(Fixed(Ok("up"))))
            .unwrap();
        assert_eq!(
            aggregator.register("db", false, DEADLINE, Arc::new(Fixed(Ok("up")))),
            Err(AggregatorError::DuplicateComponent("db".to_string()))
        );
        assert_eq!(aggregator.len(), 1);
    }

    #[tokio::test]
    async fn optional_failures_are_reported_but_ignored() {
        let mut aggregator = Aggregator::new("readiness");
        aggregator
            .register("db", true, DEADLINE, Arc::new(Fixed(Ok("DB up"))))
            .unwrap();
        aggregator
            .register("tracing", false, DEADLINE, Arc::new(Fixed(Err("not registered"))))
            .unwrap();

        let global = aggregator.check_all().await;
        assert!(global.is_ok());
        assert_eq!(global.components["db"].message, "DB up");
        assert_eq!(global.components["tracing"].status, ProbeStatus::Error);
        assert!(!global.components["tracing"].required);
    }

    #[tokio::test]
    async fn required_failure_fails_everything() {
        let mut aggregator = Aggregator::new("readiness");
        aggregator
            .register("db", true, DEADLINE, Arc::new(Fixed(Err("connection refused"))))
            .unwrap();
        aggregator
            .register("api", true, DEADLINE, Arc::new(Fixed(Ok("API healthy"))))
            .unwrap();

        let global = aggregator.check_all().await;
        assert_eq!(global.code(), 500);
        assert_eq!(global.components["db"].message, "connection refused");
        assert_eq!(global.components["api"].status, ProbeStatus::Ok);
    }

    #[tokio::test]
    async fn hung_probe_times_out_without_delaying_others() {
        let mut aggregator = Aggregator::new("readiness");
        aggregator
            .register(
                "db",
                true,
                Duration::from_millis(200),
                Arc::new(Slow(Duration::from_secs(60))),
            )
            .unwrap();
        aggregator
            .register("api", true, DEADLINE, Arc::new(Fixed(Ok("API healthy"))))
            .unwrap();

        let start = Instant::now();
        let global = aggregator.check_all().await;
        assert!(start.elapsed() < Duration::from_secs(5));

        let db = &global.components["db"];
        assert_eq!(db.status, ProbeStatus::Error);
        assert!(db.message.contains("timed out"), "{}", db.message);
        assert!(db.elapsed >= Duration::from_millis(200));
        assert_eq!(global.components["api"].status, ProbeStatus::Ok);
        assert_eq!(global.status, ProbeStatus::Error);
    }

    #[tokio::test]
    async fn panicking_probe_is_isolated() {
        let mut aggregator = Aggregator::new("readiness");
        aggregator
            .register("monitoring", true, DEADLINE, Arc::new(Panicking))
            .unwrap();
        aggregator
            .register("api", true, DEADLINE, Arc::new(Fixed(Ok("API healthy"))))
            .unwrap();

        let global = aggregator.check_all().await;
        assert_eq!(global.components["monitoring"].status, ProbeStatus::Error);
        assert_eq!(global.components["api"].status, ProbeStatus::Ok);
    }

    #[tokio::test]
    async fn probes_run_on_every_check() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut aggregator = Aggregator::new("liveness");
        aggregator
            .register("api", true, DEADLINE, Arc::new(Counting(calls.clone())))
            .unwrap();

        aggregator.check_all().await;
        aggregator.check_all().await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}
