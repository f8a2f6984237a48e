use std::time::Duration;

use envconfig::Envconfig;
use tracing::warn;

pub const DEFAULT_HEALTH_CHECK_TIMEOUT_SECS: i64 = 5;
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: i64 = 10;

#[derive(Envconfig, Clone, Debug)]
pub struct Config {
    #[envconfig(nested = true)]
    pub global: GlobalConfig,

    #[envconfig(nested = true)]
    pub health: HealthConfig,

    #[envconfig(nested = true)]
    pub db: DbConfig,

    #[envconfig(nested = true)]
    pub products: RestConfig,

    #[envconfig(nested = true)]
    pub monitor: MonitorConfig,

    #[envconfig(nested = true)]
    pub kube: KubeConfig,

    #[envconfig(nested = true)]
    pub tracing: TracingConfig,
}

#[derive(Envconfig, Clone, Debug)]
pub struct GlobalConfig {
    /// Grace period in seconds, minimum 1.
    #[envconfig(from = "SHUTDOWN_TIMEOUT", default = "10")]
    pub shutdown_timeout: i64,

    #[envconfig(from = "ENABLE_KUBE_PROBES", default = "true")]
    pub enable_kube_probes: bool,

    #[envconfig(from = "ENABLE_MONITORING", default = "true")]
    pub enable_monitoring: bool,

    #[envconfig(from = "ENABLE_TRACING", default = "true")]
    pub enable_tracing: bool,
}

#[derive(Envconfig, Clone, Debug)]
pub struct HealthConfig {
    #[envconfig(from = "DB_HEALTH_CHECK_TIMEOUT", default = "5")]
    pub db_timeout: i64,

    #[envconfig(from = "REST_HEALTH_CHECK_TIMEOUT", default = "5")]
    pub rest_timeout: i64,
}

#[derive(Envconfig, Clone, Debug)]
pub struct DbConfig {
    #[envconfig(from = "DB_HOST", default = "localhost")]
    pub host: String,

    #[envconfig(from = "DB_PORT", default = "5432")]
    pub port: u16,

    #[envconfig(from = "DB_USERNAME", default = "username")]
    pub username: String,

    #[envconfig(from = "DB_PASSWORD", default = "password")]
    pub password: String,

    #[envconfig(from = "DB_NAME", default = "db")]
    pub name: String,

    #[envconfig(from = "DB_SSL_MODE", default = "disable")]
    pub ssl_mode: String,

    #[envconfig(from = "DB_MAX_CONNECTIONS", default = "10")]
    pub max_connections: u32,
}

#[derive(Envconfig, Clone, Debug)]
pub struct RestConfig {
    #[envconfig(from = "PRODUCTS_REST_HOST", default = "localhost")]
    pub host: String,

    #[envconfig(from = "PRODUCTS_REST_PORT", default = "8080")]
    pub port: u16,
}

#[derive(Envconfig, Clone, Debug)]
pub struct MonitorConfig {
    #[envconfig(from = "MONITOR_HOST", default = "localhost")]
    pub host: String,

    #[envconfig(from = "MONITOR_PORT", default = "9090")]
    pub port: u16,
}

#[derive(Envconfig, Clone, Debug)]
pub struct KubeConfig {
    #[envconfig(from = "KUBE_PROBES_HOST", default = "localhost")]
    pub host: String,

    #[envconfig(from = "KUBE_PROBES_PORT", default = "9091")]
    pub port: u16,
}

#[derive(Envconfig, Clone, Debug)]
pub struct TracingConfig {
    #[envconfig(from = "OTEL_EXPORTER_OTLP_ENDPOINT", default = "http://localhost:4317")]
    pub endpoint: String,

    #[envconfig(from = "OTEL_SAMPLING_RATE", default = "1.0")]
    pub sampling_rate: f64,

    #[envconfig(from = "OTEL_SERVICE_NAME", default = "product-service")]
    pub service_name: String,

    #[envconfig(from = "OTEL_EXPORT_TIMEOUT_SECS", default = "3")]
    pub export_timeout_secs: u64,
}

impl RestConfig {
    /// Produce a host:port address for binding a TcpListener.
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl MonitorConfig {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl KubeConfig {
    pub fn bind(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Config {
    /// Replaces out of range timeouts with their defaults, logging each fallback.
    pub fn validated(mut self) -> Self {
        if self.health.db_timeout <= 0 {
            warn!(
                "DB_HEALTH_CHECK_TIMEOUT must be > 0, got {}, using default {}s",
                self.health.db_timeout, DEFAULT_HEALTH_CHECK_TIMEOUT_SECS
            );
            self.health.db_timeout = DEFAULT_HEALTH_CHECK_TIMEOUT_SECS;
        }
        if self.health.rest_timeout <= 0 {
            warn!(
                "REST_HEALTH_CHECK_TIMEOUT must be > 0, got {}, using default {}s",
                self.health.rest_timeout, DEFAULT_HEALTH_CHECK_TIMEOUT_SECS
            );
            self.health.rest_timeout = DEFAULT_HEALTH_CHECK_TIMEOUT_SECS;
        }
        if self.global.shutdown_timeout < 1 {
            warn!(
                "SHUTDOWN_TIMEOUT must be >= 1, got {}, using default {}s",
                self.global.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT_SECS
            );
            self.global.shutdown_timeout = DEFAULT_SHUTDOWN_TIMEOUT_SECS;
        }
        self
    }

    pub fn db_health_timeout(&self) -> Duration {
        secs(self.health.db_timeout, DEFAULT_HEALTH_CHECK_TIMEOUT_SECS)
    }

    pub fn rest_health_timeout(&self) -> Duration {
        secs(self.health.rest_timeout, DEFAULT_HEALTH_CHECK_TIMEOUT_SECS)
    }

    pub fn shutdown_timeout(&self) -> Duration {
        secs(self.global.shutdown_timeout, DEFAULT_SHUTDOWN_TIMEOUT_SECS)
    }
}

fn secs(value: i64, default: i64) -> Duration {
    let value = if value > 0 { value } else { default };
    Duration::from_secs(value.unsigned_abs())
}
