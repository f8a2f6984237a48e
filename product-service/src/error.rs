use health::AggregatorError;
use lifecycle::LifecycleError;
use metrics_exporter_prometheus::BuildError;
use opentelemetry::trace::TraceError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("database setup failed: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),
    #[error("health aggregator setup failed: {0}")]
    Health(#[from] AggregatorError),
    #[error("metrics recorder setup failed: {0}")]
    Metrics(#[from] BuildError),
    #[error("tracer setup failed: {0}")]
    Tracing(#[from] TraceError),
    #[error("failed to attach tracing layer: {0}")]
    TracingLayer(#[from] tracing_subscriber::reload::Error),
    #[error("failed to build health check client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
