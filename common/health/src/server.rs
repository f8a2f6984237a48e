use std::sync::Arc;

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tracing::error;

use crate::aggregator::HealthCheck;
use crate::status::GlobalStatus;

impl IntoResponse for GlobalStatus {
    /// Always answers 200: the orchestrator reads the verdict from the `code`
    /// field of the body, not from the transport status.
    fn into_response(self) -> Response {
        let body = match serde_json::to_vec(&self) {
            Ok(body) => body,
            Err(err) => {
                error!("failed to serialize health status: {}", err);
                Vec::new()
            }
        };
        ([(header::CONTENT_TYPE, "application/json")], body).into_response()
    }
}

/// Router for the container orchestrator probes. Liveness and readiness
/// both run the full aggregation.
pub fn probe_router(health: Arc<dyn HealthCheck>) -> Router {
    Router::new()
        .route("/live", get(check))
        .route("/ready", get(check))
        .with_state(health)
}

async fn check(State(health): State<Arc<dyn HealthCheck>>) -> GlobalStatus {
    health.check_all().await
}

#[cfg(test)]
mod tests {
    use assert_json_diff::assert_json_include;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::time::Duration;
    use tower::ServiceExt;

    use super::*;
    use crate::status::ProbeResult;

    struct Canned(GlobalStatus);

    #[async_trait]
    impl HealthCheck for Canned {
        async fn check_all(&self) -> GlobalStatus {
            self.0.clone()
        }
    }

    fn failing_db() -> Arc<dyn HealthCheck> {
        Arc::new(Canned(GlobalStatus::reduce(vec![
            (
                "db".to_string(),
                ProbeResult::error("DB interface NOT HEALTHY", Duration::from_millis(5), true),
            ),
            (
                "api".to_string(),
                ProbeResult::ok("API healthy", Duration::from_millis(1), true),
            ),
        ])))
    }

    async fn get_json(router: Router, path: &str) -> (StatusCode, Option<String>, Value) {
        let response = router
            .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| v.to_str().unwrap().to_owned());
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, content_type, serde_json::from_slice(&body).unwrap())
    }

    #[tokio::test]
    async fn ready_reports_error_in_body_with_http_200() {
        let (status, content_type, body) = get_json(probe_router(failing_db()), "/ready").await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(content_type.as_deref(), Some("application/json"));
        assert_json_include!(
            actual: body,
            expected: json!({
                "status": "ERROR",
                "code": 500,
                "components": {
                    "db": {"status": "ERROR", "code": 500, "isRequired": true},
                    "api": {"status": "OK", "code": 200}
                }
            })
        );
    }

    #[tokio::test]
    async fn live_and_ready_agree() {
        let (_, _, live) = get_json(probe_router(failing_db()), "/live").await;
        let (_, _, ready) = get_json(probe_router(failing_db()), "/ready").await;
        assert_eq!(live, ready);
    }

    #[tokio::test]
    async fn empty_status_is_ok() {
        let health: Arc<dyn HealthCheck> = Arc::new(Canned(GlobalStatus::reduce(Vec::new())));
        let (_, _, body) = get_json(probe_router(health), "/live").await;
        assert_eq!(body, json!({"status": "OK", "code": 200, "components": {}}));
    }
}
