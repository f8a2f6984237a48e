use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tokio::net::TcpStream;

use crate::aggregator::Probe;
use crate::routes::RouteTable;

/// How the body of the probed endpoint is validated.
#[derive(Clone, Copy)]
pub enum ResponseCheck {
    /// Body must parse as the expected JSON structure, see [`parse_as`].
    Json(fn(&[u8]) -> Result<(), serde_json::Error>),
    /// Body must not be empty.
    NonEmpty,
}

/// Checks that a body parses as `T`, for use with [`ResponseCheck::Json`].
pub fn parse_as<T: DeserializeOwned>(body: &[u8]) -> Result<(), serde_json::Error> {
    serde_json::from_slice::<T>(body).map(|_| ())
}

impl ResponseCheck {
    fn validate(&self, body: &[u8]) -> Result<(), String> {
        match self {
            ResponseCheck::Json(parse) => parse(body).map_err(|e| format!("invalid body: {e}")),
            ResponseCheck::NonEmpty if body.is_empty() => Err("empty body".to_string()),
            ResponseCheck::NonEmpty => Ok(()),
        }
    }
}

/// Probe for one of our own HTTP listeners.
///
/// Three stages, the first failure wins:
///   - dial the advertised address
///   - walk the route table
///   - GET the designated endpoint and validate the answer
pub struct HttpServiceProbe {
    service: String,
    addr: SocketAddr,
    routes: Arc<RouteTable>,
    path: String,
    check: ResponseCheck,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpServiceProbe {
    pub fn new(
        service: &str,
        addr: SocketAddr,
        routes: Arc<RouteTable>,
        path: &str,
        check: ResponseCheck,
        client: reqwest::Client,
        timeout: Duration,
    ) -> Self {
        Self {
            service: service.to_owned(),
            addr,
            routes,
            path: path.to_owned(),
            check,
            client,
            timeout,
        }
    }

    fn unhealthy(&self, err: impl std::fmt::Display) -> String {
        format!("{} NOT HEALTHY: {}", self.service, err)
    }

    async fn dial(&self) -> Result<(), String> {
        match tokio::time::timeout(self.timeout, TcpStream::connect(self.addr)).await {
            Ok(Ok(_stream)) => Ok(()),
            Ok(Err(e)) => Err(self.unhealthy(format!("dial tcp {}: {}", self.addr, e))),
            Err(_) => Err(self.unhealthy(format!("dial tcp {}: i/o timeout", self.addr))),
        }
    }

    async fn request(&self) -> Result<(), String> {
        let url = format!("http://{}{}", self.addr, self.path);
        let response = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| self.unhealthy(e))?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            return Err(format!("{} response code {}", self.service, status.as_u16()));
        }

        let body = response.bytes().await.map_err(|e| self.unhealthy(e))?;
        self.check.validate(&body).map_err(|e| self.unhealthy(e))
    }
}

#[async_trait]
impl Probe for HttpServiceProbe {
    async fn check(&self) -> Result<String, String> {
        self.dial().await?;
        self.routes.walk().map_err(|e| self.unhealthy(e))?;
        self.request().await?;
        Ok(format!("{} healthy", self.service))
    }
}

#[cfg(test)]
mod tests {
    use axum::http::Method;
    use axum::routing::get;
    use axum::Router;
    use serde::Deserialize;
    use tokio::net::TcpListener;

    use super::*;
    use crate::routes::RouteSet;

    #[derive(Deserialize)]
    #[allow(dead_code)]
    struct Item {
        id: i64,
    }

    async fn serve(router: Router) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
        addr
    }

    fn table() -> Arc<RouteTable> {
        let (_, table) = RouteSet::<()>::new()
            .record("items", Method::GET, "/items", || async { "[]" })
            .into_router();
        Arc::new(table)
    }

    fn client() -> reqwest::Client {
        reqwest::Client::builder().no_proxy().build().unwrap()
    }

    fn probe(addr: SocketAddr, routes: Arc<RouteTable>, check: ResponseCheck) -> HttpServiceProbe {
        HttpServiceProbe::new(
            "API",
            addr,
            routes,
            "/items",
            check,
            client(),
            Duration::from_secs(2),
        )
    }

    #[tokio::test]
    async fn healthy_json_endpoint() {
        let addr = serve(Router::new().route("/items", get(|| async { r#"[{"id":1}]"# }))).await;
        let outcome = probe(addr, table(), ResponseCheck::Json(parse_as::<Vec<Item>>))
            .check()
            .await;
        assert_eq!(outcome, Ok("API healthy".to_string()));
    }

    #[tokio::test]
    async fn malformed_json_is_unhealthy() {
        let addr = serve(Router::new().route("/items", get(|| async { "not json" }))).await;
        let outcome = probe(addr, table(), ResponseCheck::Json(parse_as::<Vec<Item>>))
            .check()
            .await
            .unwrap_err();
        assert!(outcome.starts_with("API NOT HEALTHY: invalid body"), "{outcome}");
    }

    #[tokio::test]
    async fn non_200_reports_code() {
        let addr = serve(Router::new()).await;
        let outcome = probe(addr, table(), ResponseCheck::NonEmpty)
            .check()
            .await
            .unwrap_err();
        assert_eq!(outcome, "API response code 404");
    }

    #[tokio::test]
    async fn empty_body_is_unhealthy() {
        let addr = serve(Router::new().route("/items", get(|| async { "" }))).await;
        let outcome = probe(addr, table(), ResponseCheck::NonEmpty)
            .check()
            .await
            .unwrap_err();
        assert_eq!(outcome, "API NOT HEALTHY: empty body");
    }

    #[tokio::test]
    async fn declared_only_route_fails_before_the_request() {
        let (router, routes) = RouteSet::<()>::new()
            .record("items", Method::GET, "/items", || async { "[]" })
            .declare("purgeItems", Method::DELETE, "/items")
            .into_router();
        let addr = serve(router).await;

        let outcome = probe(addr, Arc::new(routes), ResponseCheck::NonEmpty)
            .check()
            .await
            .unwrap_err();
        assert_eq!(
            outcome,
            "API NOT HEALTHY: route purgeItems (DELETE /items) has no handler"
        );
    }

    #[tokio::test]
    async fn closed_port_fails_dial() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let outcome = probe(addr, table(), ResponseCheck::NonEmpty)
            .check()
            .await
            .unwrap_err();
        assert!(outcome.starts_with("API NOT HEALTHY: dial tcp"), "{outcome}");
    }
}
