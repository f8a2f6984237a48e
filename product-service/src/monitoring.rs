use std::sync::{Mutex, PoisonError};
use std::time::{Instant, SystemTime};

use axum::body::Body;
use axum::extract::MatchedPath;
use axum::http::{Method, Request};
use axum::middleware::Next;
use axum::response::Response;
use axum::Router;
use health::{RouteSet, RouteTable};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

pub const METRICS_PATH: &str = "/metrics";
pub const UNMATCHED_ROUTE: &str = "unmatched";

// The recorder is process-global, install it once and share the handle.
static RECORDER: Mutex<Option<PrometheusHandle>> = Mutex::new(None);

pub fn setup_metrics_recorder() -> Result<PrometheusHandle, BuildError> {
    const BUCKETS: &[f64] = &[
        0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 50.0, 100.0, 250.0,
    ];

    let mut recorder = RECORDER.lock().unwrap_or_else(PoisonError::into_inner);
    if let Some(handle) = recorder.as_ref() {
        return Ok(handle.clone());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(BUCKETS)?
        .install_recorder()?;
    metrics::gauge!("service_start_time_seconds").set(get_current_timestamp_seconds());

    *recorder = Some(handle.clone());
    Ok(handle)
}

/// Router for the monitoring listener, with the route inventory its health
/// probe walks.
pub fn router(handle: PrometheusHandle) -> (Router, RouteTable) {
    let render = move || std::future::ready(handle.render());
    let (router, routes) = RouteSet::<()>::new()
        .record("metrics", Method::GET, METRICS_PATH, render)
        .into_router();

    (router.layer(axum::middleware::from_fn(track_metrics)), routes)
}

/// Counts requests and their latency per method, route and status.
///
/// The route label is the matched route template, so `/api/v1/products/7`
/// and `/api/v1/products/8` share a series. Requests that match no route
/// are all labelled [`UNMATCHED_ROUTE`].
pub async fn track_metrics(req: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    let method = req.method().to_string();
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| UNMATCHED_ROUTE.to_owned(), |path| path.as_str().to_owned());

    let response = next.run(req).await;

    let labels = [
        ("method", method),
        ("path", route),
        ("status", response.status().as_u16().to_string()),
    ];
    metrics::counter!("http_requests_total", &labels).increment(1);
    metrics::histogram!("http_requests_duration_seconds", &labels)
        .record(start.elapsed().as_secs_f64());

    response
}

/// Returns the number of seconds since the Unix epoch, to use in prom gauges.
/// Saturates to zero if the system time is set before epoch.
pub fn get_current_timestamp_seconds() -> f64 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs_f64()
}

#[cfg(test)]
mod tests {
    use axum::http::StatusCode;
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn metrics_endpoint_is_never_empty() {
        let handle = setup_metrics_recorder().unwrap();
        let (router, routes) = router(handle);
        assert_eq!(routes.walk(), Ok(1));

        let response = router
            .oneshot(Request::builder().uri(METRICS_PATH).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = response.into_body().collect().await.unwrap().to_bytes();
        let body = String::from_utf8(body.to_vec()).unwrap();
        assert!(body.contains("service_start_time_seconds"), "{body}");
    }

    #[tokio::test]
    async fn unknown_paths_share_one_series() {
        let handle = setup_metrics_recorder().unwrap();
        let (router, _) = router(handle.clone());

        for path in ["/wp-admin/setup.php", "/.env"] {
            let response = router
                .clone()
                .oneshot(Request::builder().uri(path).body(Body::empty()).unwrap())
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::NOT_FOUND);
        }

        let rendered = handle.render();
        assert!(rendered.contains(r#"path="unmatched""#), "{rendered}");
        assert!(!rendered.contains("wp-admin"), "{rendered}");
    }

    #[test]
    fn recorder_is_installed_once() {
        let first = setup_metrics_recorder().unwrap();
        let second = setup_metrics_recorder().unwrap();
        metrics::counter!("recorder_probe_total").increment(1);
        assert!(first.render().contains("recorder_probe_total"));
        assert!(second.render().contains("recorder_probe_total"));
    }
}
