use envconfig::Envconfig;
use opentelemetry_sdk::trace::Tracer;
use thiserror::Error;
use tracing::level_filters::LevelFilter;
use tracing_opentelemetry::OpenTelemetryLayer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, reload, EnvFilter, Layer, Registry};

pub type OtelLayer = OpenTelemetryLayer<Registry, Tracer>;

/// Slot for the OpenTelemetry layer, filled once the tracing client is built.
pub type OtelHandle = reload::Handle<Option<OtelLayer>, Registry>;

#[derive(Envconfig)]
pub struct LoggingConfig {
    /// Pretty colored output instead of JSON lines.
    #[envconfig(from = "DEBUG", default = "false")]
    pub debug: bool,
}

#[derive(Debug, Error)]
pub enum LoggingError {
    #[error("invalid logging configuration: {0}")]
    Config(#[from] envconfig::Error),
    #[error("failed to install subscriber: {0}")]
    Init(#[from] TryInitError),
}

/// Installs the global subscriber:
///   - stdout, level from RUST_LOG (default INFO), JSON unless DEBUG is set
///   - an empty OpenTelemetry slot, see [`OtelHandle`]
pub fn init() -> Result<OtelHandle, LoggingError> {
    let config = LoggingConfig::init_from_env()?;

    let filter = || {
        EnvFilter::builder()
            .with_default_directive(LevelFilter::INFO.into())
            .from_env_lossy()
    };

    let log_layer = {
        let base_layer = fmt::layer()
            .with_target(true)
            .with_thread_ids(true)
            .with_level(true);

        if config.debug {
            base_layer
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
                .with_ansi(true)
                .with_filter(filter())
                .boxed()
        } else {
            base_layer.json().with_filter(filter()).boxed()
        }
    };

    let (otel_layer, handle) = reload::Layer::new(None::<OtelLayer>);

    tracing_subscriber::registry()
        .with(otel_layer)
        .with(log_layer)
        .try_init()?;

    Ok(handle)
}
