use crate::status::ProbeResult;

pub(crate) const METRIC_PROBE_DURATION: &str = "health_probe_duration_seconds";
pub(crate) const METRIC_PROBE_RESULT: &str = "health_probe_result_total";

pub(crate) fn emit_probe(registry: &str, component: &str, result: &ProbeResult) {
    let labels = [
        ("registry", registry.to_string()),
        ("component", component.to_string()),
        ("status", result.status.to_string()),
    ];

    metrics::counter!(METRIC_PROBE_RESULT, &labels).increment(1);
    metrics::histogram!(METRIC_PROBE_DURATION, &labels).record(result.elapsed.as_secs_f64());
}
