use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use health::{
    parse_as, probe_router, Aggregator, GlobalStatus, HealthCheck, HttpServiceProbe, Probe,
    ResponseCheck,
};
use lifecycle::{HttpServer, LifecycleError, Orchestrator, ShutdownOutcome, StartPolicy, Subsystem};
use tracing::info;

use crate::api::{self, PRODUCTS_PATH};
use crate::config::Config;
use crate::database::Database;
use crate::error::AppError;
use crate::logging::OtelHandle;
use crate::monitoring::{self, METRICS_PATH};
use crate::store::{Product, ProductStore};
use crate::tracing_client::TracingClient;

pub const SERVICE_NAME: &str = "product-service";

/// Stop order, each step waiting for the previous one.
const SHUTDOWN_ORDER: &[&str] = &["probes", "monitoring", "tracing", "api", "db"];

/// The datastore subsystem: hands the products store to the API and the
/// connectivity probe to the aggregator.
pub trait Datastore: Subsystem {
    fn store(&self) -> Arc<dyn ProductStore>;
    fn probe(&self) -> Arc<dyn Probe>;
    fn into_subsystem(self: Box<Self>) -> Box<dyn Subsystem>;
}

/// Every subsystem of the service, wired together.
///
/// Construction binds all listeners but serves nothing, see [`Application::start`].
pub struct Application {
    orchestrator: Orchestrator,
    health: Arc<Aggregator>,
    api_addr: SocketAddr,
    monitoring_addr: Option<SocketAddr>,
    probe_addr: Option<SocketAddr>,
    shutdown_timeout: Duration,
}

impl Application {
    /// Connects to Postgres, then builds the rest, see [`Application::from_parts`].
    pub async fn new(config: Config, otel: Option<&OtelHandle>) -> Result<Self, AppError> {
        let traced = config.global.enable_tracing;
        let database = Database::connect(&config.db, traced).await?;
        Self::from_parts(config, Box::new(database), otel).await
    }

    /// Builds every subsystem in dependency order around an already open
    /// datastore. The first failure aborts, nothing built so far is started.
    pub async fn from_parts(
        config: Config,
        datastore: Box<dyn Datastore>,
        otel: Option<&OtelHandle>,
    ) -> Result<Self, AppError> {
        let config = config.validated();
        let db_timeout = config.db_health_timeout();
        let rest_timeout = config.rest_health_timeout();

        let client = reqwest::Client::builder()
            .timeout(rest_timeout)
            .no_proxy()
            .build()?;

        let mut orchestrator = Orchestrator::new(SERVICE_NAME);
        let mut health = Aggregator::new("readiness");

        health.register("db", true, db_timeout, datastore.probe())?;
        let store = datastore.store();
        orchestrator.register(datastore.into_subsystem());

        let (router, routes) = api::router(store);
        let api = HttpServer::bind("api", &config.products.bind(), router).await?;
        let api_addr = api.local_addr();
        health.register(
            "api",
            true,
            rest_timeout,
            Arc::new(HttpServiceProbe::new(
                "API",
                api.probe_addr(),
                Arc::new(routes),
                PRODUCTS_PATH,
                ResponseCheck::Json(parse_as::<Vec<Product>>),
                client.clone(),
                rest_timeout,
            )),
        )?;
        orchestrator.register(Box::new(api));

        let mut monitoring_addr = None;
        if config.global.enable_monitoring {
            let (router, routes) = monitoring::router(monitoring::setup_metrics_recorder()?);
            let server = HttpServer::bind("monitoring", &config.monitor.bind(), router).await?;
            monitoring_addr = Some(server.local_addr());
            health.register(
                "monitoring",
                true,
                rest_timeout,
                Arc::new(HttpServiceProbe::new(
                    "Monitoring",
                    server.probe_addr(),
                    Arc::new(routes),
                    METRICS_PATH,
                    ResponseCheck::NonEmpty,
                    client.clone(),
                    rest_timeout,
                )),
            )?;
            orchestrator.register(Box::new(server));
        }

        if config.global.enable_tracing {
            let tracing = TracingClient::init(&config.tracing, otel)?;
            health.register("tracing", false, rest_timeout, tracing.probe())?;
            orchestrator.register(Box::new(tracing));
        }

        let health = Arc::new(health);

        let mut probe_addr = None;
        if config.global.enable_kube_probes {
            let router = probe_router(health.clone());
            let server = HttpServer::bind("probes", &config.kube.bind(), router).await?;
            probe_addr = Some(server.local_addr());
            orchestrator.register(Box::new(server));
        }

        info!(components = health.len(), "{} constructed", SERVICE_NAME);

        Ok(Self {
            orchestrator,
            health,
            api_addr,
            monitoring_addr,
            probe_addr,
            shutdown_timeout: config.shutdown_timeout(),
        })
    }

    /// Starts the listeners. Only the API is allowed to fail the start.
    pub async fn start(&mut self) -> Result<(), LifecycleError> {
        let plan: Vec<(&str, StartPolicy)> = [
            ("monitoring", StartPolicy::BestEffort),
            ("api", StartPolicy::Required),
            ("probes", StartPolicy::BestEffort),
        ]
        .into_iter()
        .filter(|(name, _)| self.orchestrator.state(name).is_some())
        .collect();

        self.orchestrator.start(&plan).await
    }

    pub async fn shutdown(&mut self) -> ShutdownOutcome {
        self.orchestrator
            .shutdown(SHUTDOWN_ORDER, self.shutdown_timeout)
            .await
    }

    pub fn api_addr(&self) -> SocketAddr {
        self.api_addr
    }

    pub fn monitoring_addr(&self) -> Option<SocketAddr> {
        self.monitoring_addr
    }

    pub fn probe_addr(&self) -> Option<SocketAddr> {
        self.probe_addr
    }
}

#[async_trait]
impl HealthCheck for Application {
    async fn check_all(&self) -> GlobalStatus {
        self.health.check_all().await
    }
}
