use std::collections::HashMap;
use std::net::SocketAddr;

use envconfig::Envconfig;

use product_service::app::Application;
use product_service::config::Config;
use product_service::test_utils::MemoryDatastore;

/// Loopback listeners on ephemeral ports, tracing off, one second grace.
pub fn test_config(extra: &[(&str, &str)]) -> Config {
    let mut env: HashMap<String, String> = [
        ("PRODUCTS_REST_HOST", "127.0.0.1"),
        ("PRODUCTS_REST_PORT", "0"),
        ("MONITOR_HOST", "127.0.0.1"),
        ("MONITOR_PORT", "0"),
        ("KUBE_PROBES_HOST", "127.0.0.1"),
        ("KUBE_PROBES_PORT", "0"),
        ("ENABLE_TRACING", "false"),
        ("SHUTDOWN_TIMEOUT", "1"),
    ]
    .iter()
    .map(|(k, v)| (k.to_string(), v.to_string()))
    .collect();
    for (k, v) in extra {
        env.insert(k.to_string(), v.to_string());
    }
    Config::init_from_hashmap(&env).expect("test config")
}

pub async fn start_app(config: Config, datastore: MemoryDatastore) -> Application {
    let mut app = Application::from_parts(config, Box::new(datastore), None)
        .await
        .expect("failed to build application");
    app.start().await.expect("failed to start application");
    app
}

pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .no_proxy()
        .build()
        .expect("failed to build client")
}

pub fn url(addr: SocketAddr, path: &str) -> String {
    format!("http://{addr}{path}")
}
