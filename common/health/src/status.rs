use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// Outcome of a single probe, or of the whole process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeStatus {
    Ok,
    Error,
}

impl ProbeStatus {
    /// HTTP-style code reported next to the status on the wire.
    pub fn code(&self) -> u16 {
        match self {
            ProbeStatus::Ok => 200,
            ProbeStatus::Error => 500,
        }
    }
}

impl fmt::Display for ProbeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeStatus::Ok => write!(f, "OK"),
            ProbeStatus::Error => write!(f, "ERROR"),
        }
    }
}

/// Health of one component at one instant. Built fresh on every probe cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireProbeResult", try_from = "WireProbeResult")]
pub struct ProbeResult {
    pub status: ProbeStatus,
    pub message: String,
    pub elapsed: Duration,
    pub required: bool,
}

impl ProbeResult {
    pub fn ok(message: impl Into<String>, elapsed: Duration, required: bool) -> Self {
        Self {
            status: ProbeStatus::Ok,
            message: message.into(),
            elapsed,
            required,
        }
    }

    pub fn error(message: impl Into<String>, elapsed: Duration, required: bool) -> Self {
        Self {
            status: ProbeStatus::Error,
            message: message.into(),
            elapsed,
            required,
        }
    }

    pub fn code(&self) -> u16 {
        self.status.code()
    }

    pub fn is_ok(&self) -> bool {
        self.status == ProbeStatus::Ok
    }
}

/// The single verdict handed to the container orchestrator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "WireGlobalStatus", try_from = "WireGlobalStatus")]
pub struct GlobalStatus {
    pub status: ProbeStatus,
    pub components: BTreeMap<String, ProbeResult>,
}

impl GlobalStatus {
    /// Folds per-component results, given in registration order, into one verdict.
    ///
    /// Only required components can pull the status down to ERROR. Failing optional
    /// components are kept in the map for display and nothing else. An empty input
    /// is reported as OK.
    pub fn reduce<I>(results: I) -> Self
    where
        I: IntoIterator<Item = (String, ProbeResult)>,
    {
        let mut status = ProbeStatus::Ok;
        let mut components = BTreeMap::new();

        for (name, result) in results {
            if result.required && result.code() != ProbeStatus::Ok.code() {
                status = result.status;
            }
            components.insert(name, result);
        }

        if components.is_empty() {
            warn!("no components configured for health check, returning OK per default");
        }

        Self { status, components }
    }

    pub fn code(&self) -> u16 {
        self.status.code()
    }

    pub fn is_ok(&self) -> bool {
        self.status == ProbeStatus::Ok
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WireError {
    #[error("code {code} does not match status {status}")]
    CodeMismatch { status: ProbeStatus, code: u16 },
    #[error("timeConsumed must be a finite positive number")]
    InvalidElapsed,
}

fn check_code(status: ProbeStatus, code: u16) -> Result<(), WireError> {
    if status.code() == code {
        Ok(())
    } else {
        Err(WireError::CodeMismatch { status, code })
    }
}

// Milliseconds as a float, rounded back to whole nanoseconds when decoding.
fn millis(elapsed: Duration) -> f64 {
    elapsed.as_nanos() as f64 / 1_000_000.0
}

fn from_millis(ms: f64) -> Result<Duration, WireError> {
    if !ms.is_finite() || ms < 0.0 {
        return Err(WireError::InvalidElapsed);
    }
    Ok(Duration::from_nanos((ms * 1_000_000.0).round() as u64))
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireProbeResult {
    status: ProbeStatus,
    code: u16,
    message: String,
    time_consumed: f64,
    is_required: bool,
}

impl From<ProbeResult> for WireProbeResult {
    fn from(result: ProbeResult) -> Self {
        Self {
            code: result.code(),
            status: result.status,
            message: result.message,
            time_consumed: millis(result.elapsed),
            is_required: result.required,
        }
    }
}

impl TryFrom<WireProbeResult> for ProbeResult {
    type Error = WireError;

    fn try_from(wire: WireProbeResult) -> Result<Self, Self::Error> {
        check_code(wire.status, wire.code)?;
        Ok(Self {
            status: wire.status,
            message: wire.message,
            elapsed: from_millis(wire.time_consumed)?,
            required: wire.is_required,
        })
    }
}

#[derive(Serialize, Deserialize)]
struct WireGlobalStatus {
    status: ProbeStatus,
    code: u16,
    components: BTreeMap<String, ProbeResult>,
}

impl From<GlobalStatus> for WireGlobalStatus {
    fn from(global: GlobalStatus) -> Self {
        Self {
            code: global.code(),
            status: global.status,
            components: global.components,
        }
    }
}

impl TryFrom<WireGlobalStatus> for GlobalStatus {
    type Error = WireError;

    fn try_from(wire: WireGlobalStatus) -> Result<Self, Self::Error> {
        check_code(wire.status, wire.code)?;
        Ok(Self {
            status: wire.status,
            components: wire.components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_json_diff::assert_json_eq;
    use serde_json::json;

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    #[test]
    fn codes_follow_status() {
        assert_eq!(ProbeStatus::Ok.code(), 200);
        assert_eq!(ProbeStatus::Error.code(), 500);
        assert_eq!(ProbeResult::error("down", ms(1), false).code(), 500);
    }

    #[test]
    fn empty_registry_is_ok() {
        let global = GlobalStatus::reduce(Vec::new());
        assert_eq!(global.status, ProbeStatus::Ok);
        assert_eq!(global.code(), 200);
        assert!(global.components.is_empty());
    }

    #[test]
    fn optional_failure_keeps_global_ok() {
        let global = GlobalStatus::reduce(vec![
            ("db".to_string(), ProbeResult::ok("DB healthy", ms(3), true)),
            (
                "tracing".to_string(),
                ProbeResult::error("tracer NOT REGISTERED", ms(0), false),
            ),
        ]);
        assert!(global.is_ok());
        assert_eq!(
            global.components["tracing"].status,
            ProbeStatus::Error,
            "optional failures stay visible"
        );
    }

    #[test]
    fn required_failure_degrades_global() {
        let global = GlobalStatus::reduce(vec![
            ("db".to_string(), ProbeResult::error("timeout", ms(5000), true)),
            ("api".to_string(), ProbeResult::ok("API healthy", ms(2), true)),
        ]);
        assert_eq!(global.status, ProbeStatus::Error);
        assert_eq!(global.code(), 500);
        assert_eq!(global.components.len(), 2);
    }

    #[test]
    fn serializes_to_probe_contract() {
        let global = GlobalStatus::reduce(vec![
            (
                "api".to_string(),
                ProbeResult::ok("API healthy", Duration::from_micros(1500), true),
            ),
            (
                "tracing".to_string(),
                ProbeResult::error("tracer NOT REGISTERED", Duration::ZERO, false),
            ),
        ]);

        assert_json_eq!(
            serde_json::to_value(&global).unwrap(),
            json!({
                "status": "OK",
                "code": 200,
                "components": {
                    "api": {
                        "status": "OK",
                        "code": 200,
                        "message": "API healthy",
                        "timeConsumed": 1.5,
                        "isRequired": true
                    },
                    "tracing": {
                        "status": "ERROR",
                        "code": 500,
                        "message": "tracer NOT REGISTERED",
                        "timeConsumed": 0.0,
                        "isRequired": false
                    }
                }
            })
        );
    }

    #[test]
    fn parses_back_what_it_writes() {
        let global = GlobalStatus::reduce(vec![
            (
                "db".to_string(),
                ProbeResult::error("DB interface NOT HEALTHY", Duration::new(5, 123_456_789), true),
            ),
            (
                "monitoring".to_string(),
                ProbeResult::ok("monitoring healthy", Duration::from_nanos(42), true),
            ),
        ]);

        let body = serde_json::to_string(&global).unwrap();
        let parsed: GlobalStatus = serde_json::from_str(&body).unwrap();
        assert_eq!(parsed, global);
    }

    #[test]
    fn rejects_inconsistent_code() {
        let body = json!({"status": "OK", "code": 500, "components": {}});
        let err = serde_json::from_value::<GlobalStatus>(body).unwrap_err();
        assert_eq!(err.to_string(), "code 500 does not match status OK");

        let body = json!({
            "status": "ERROR", "code": 200, "message": "", "timeConsumed": 1.0, "isRequired": true
        });
        assert!(serde_json::from_value::<ProbeResult>(body).is_err());
    }

    #[test]
    fn rejects_negative_elapsed() {
        let body = json!({
            "status": "OK", "code": 200, "message": "", "timeConsumed": -1.0, "isRequired": true
        });
        assert!(serde_json::from_value::<ProbeResult>(body).is_err());
    }

    #[test]
    fn wire_errors_are_std_errors() {
        let err: Box<dyn std::error::Error + Send + Sync> = Box::new(WireError::InvalidElapsed);
        assert_eq!(err.to_string(), "timeConsumed must be a finite positive number");
        assert!(err.source().is_none());
    }
}
