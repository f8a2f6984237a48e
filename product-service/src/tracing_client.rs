use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use health::Probe;
use lifecycle::{LifecycleError, Subsystem};
use opentelemetry::trace::TraceError;
use opentelemetry::{KeyValue, Value};
use opentelemetry_otlp::WithExportConfig;
use opentelemetry_sdk::trace::{BatchConfig, RandomIdGenerator, Sampler, Tracer};
use opentelemetry_sdk::{runtime, Resource};
use tracing::{info, warn};
use tracing_opentelemetry::OpenTelemetryLayer;

use crate::config::TracingConfig;
use crate::error::AppError;
use crate::logging::OtelHandle;

fn init_tracer(config: &TracingConfig) -> Result<Tracer, TraceError> {
    opentelemetry_otlp::new_pipeline()
        .tracing()
        .with_trace_config(
            opentelemetry_sdk::trace::Config::default()
                .with_sampler(Sampler::ParentBased(Box::new(Sampler::TraceIdRatioBased(
                    config.sampling_rate,
                ))))
                .with_id_generator(RandomIdGenerator::default())
                .with_resource(Resource::new(vec![KeyValue::new(
                    "service.name",
                    Value::from(config.service_name.clone()),
                )])),
        )
        .with_batch_config(BatchConfig::default())
        .with_exporter(
            opentelemetry_otlp::new_exporter()
                .tonic()
                .with_endpoint(&config.endpoint)
                .with_timeout(Duration::from_secs(config.export_timeout_secs)),
        )
        .install_batch(runtime::Tokio)
}

/// The `tracing` subsystem: the OTLP exporter behind the log pipeline.
///
/// Building it registers the tracer globally, shutting it down flushes and
/// closes the exporter. Nothing checks the collector is reachable, export
/// failures only show up in the exporter's own logs.
pub struct TracingClient {
    registered: Arc<AtomicBool>,
}

impl TracingClient {
    /// Registers the tracer and, given a subscriber slot, starts exporting
    /// spans through it.
    pub fn init(config: &TracingConfig, otel: Option<&OtelHandle>) -> Result<Self, AppError> {
        let tracer = init_tracer(config)?;
        if let Some(handle) = otel {
            handle.reload(Some(OpenTelemetryLayer::new(tracer)))?;
        }
        info!(
            endpoint = %config.endpoint,
            sampling_rate = config.sampling_rate,
            "tracer registered"
        );
        Ok(Self {
            registered: Arc::new(AtomicBool::new(true)),
        })
    }

    pub fn probe(&self) -> Arc<dyn Probe> {
        Arc::new(TracingProbe {
            registered: self.registered.clone(),
        })
    }
}

#[async_trait]
impl Subsystem for TracingClient {
    fn name(&self) -> &str {
        "tracing"
    }

    async fn shutdown(&mut self, grace: Duration) -> Result<(), LifecycleError> {
        if !self.registered.swap(false, Ordering::SeqCst) {
            return Err(LifecycleError::NotRunning("tracing".to_string()));
        }

        // Flushing blocks until the batch exporter drains.
        let flush = tokio::task::spawn_blocking(opentelemetry::global::shutdown_tracer_provider);
        match tokio::time::timeout(grace, flush).await {
            Ok(Ok(())) => {
                info!("tracer closed");
                Ok(())
            }
            Ok(Err(e)) => Err(LifecycleError::Shutdown {
                name: "tracing".to_string(),
                reason: e.to_string(),
            }),
            Err(_) => {
                warn!("tracer did not flush within {}s", grace.as_secs_f64());
                Err(LifecycleError::ShutdownTimeout {
                    name: "tracing".to_string(),
                    grace,
                })
            }
        }
    }
}

/// Reports whether the tracer is still registered.
pub struct TracingProbe {
    registered: Arc<AtomicBool>,
}

#[async_trait]
impl Probe for TracingProbe {
    async fn check(&self) -> Result<String, String> {
        if self.registered.load(Ordering::SeqCst) {
            Ok("tracer registered".to_string())
        } else {
            Err("tracer NOT REGISTERED".to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn probe_follows_registration() {
        let mut client = TracingClient {
            registered: Arc::new(AtomicBool::new(true)),
        };
        let probe = client.probe();
        assert_eq!(probe.check().await, Ok("tracer registered".to_string()));

        client.shutdown(Duration::from_secs(1)).await.unwrap();
        assert_eq!(probe.check().await, Err("tracer NOT REGISTERED".to_string()));
    }

    #[tokio::test]
    async fn second_shutdown_is_not_running() {
        let mut client = TracingClient {
            registered: Arc::new(AtomicBool::new(false)),
        };
        let err = client.shutdown(Duration::from_secs(1)).await.unwrap_err();
        assert!(matches!(err, LifecycleError::NotRunning(name) if name == "tracing"));
    }
}
