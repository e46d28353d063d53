//! Nightscout data server client
//!
//! Read-only access to the `entries` (CGM readings) and `treatments`
//! collections for one evaluation window.

use crate::config::{ConnectionConfig, NightscoutConfig};
use crate::error::{GlucoRsError, Result, Service, UpstreamError};
use crate::models::{GlucoseReading, Treatment};
use crate::window::EvaluationWindow;
use serde_json::{json, Value};
use std::time::Duration;
use tracing::debug;
use ureq::Agent;

/// Maximum glucose entries requested per day
pub const GLUCOSE_QUERY_LIMIT: usize = 10_000;
/// Maximum treatment records requested per day
pub const TREATMENT_QUERY_LIMIT: usize = 5_000;

const ENTRIES_ENDPOINT: &str = "entries.json";
const TREATMENTS_ENDPOINT: &str = "treatments.json";
const STATUS_ENDPOINT: &str = "status.json";

/// Source of a day's CGM readings and treatments
pub trait GlucoseSource {
    /// Sensor glucose readings observed in `[start, end)`; order unspecified
    fn fetch_glucose(&self, window: &EvaluationWindow) -> Result<Vec<GlucoseReading>>;

    /// Treatment records created in `[start, end)`
    fn fetch_treatments(&self, window: &EvaluationWindow) -> Result<Vec<Treatment>>;
}

/// `find` filter for SGV entries in the window (epoch milliseconds)
pub fn glucose_query(window: &EvaluationWindow) -> String {
    json!({
        "date": { "$gte": window.start_ms(), "$lt": window.end_ms() },
        "type": "sgv",
    })
    .to_string()
}

/// `find` filter for treatments in the window (ISO-8601 timestamps)
pub fn treatment_query(window: &EvaluationWindow) -> String {
    json!({
        "created_at": { "$gte": window.start_iso(), "$lt": window.end_iso() },
    })
    .to_string()
}

fn expect_array(body: Value, endpoint: &str) -> Result<Vec<Value>> {
    match body {
        Value::Array(records) => Ok(records),
        other => Err(UpstreamError::Decode {
            service: Service::Nightscout,
            endpoint: endpoint.to_string(),
            reason: format!("expected a JSON array, got {}", json_kind(&other)),
        }
        .into()),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Decode an `entries.json` body, dropping records without a numeric `sgv`
pub fn parse_entries(body: Value) -> Result<Vec<GlucoseReading>> {
    let records = expect_array(body, ENTRIES_ENDPOINT)?;
    let total = records.len();
    let readings: Vec<GlucoseReading> = records.iter().filter_map(GlucoseReading::from_entry).collect();

    if readings.len() < total {
        debug!(
            discarded = total - readings.len(),
            kept = readings.len(),
            "Discarded entries without numeric sgv"
        );
    }

    Ok(readings)
}

/// Decode a `treatments.json` body
pub fn parse_treatments(body: Value) -> Result<Vec<Treatment>> {
    let records = expect_array(body, TREATMENTS_ENDPOINT)?;
    Ok(records.iter().map(Treatment::from_record).collect())
}

/// Map a ureq failure onto the upstream error taxonomy
pub(crate) fn upstream_error(service: Service, endpoint: &str, err: ureq::Error) -> GlucoRsError {
    match err {
        ureq::Error::Status(status, _) => UpstreamError::Status {
            service,
            endpoint: endpoint.to_string(),
            status,
        },
        ureq::Error::Transport(transport) => UpstreamError::Transport {
            service,
            endpoint: endpoint.to_string(),
            // Display would include the URL, which may carry a token
            reason: match transport.message() {
                Some(message) => format!("{}: {}", transport.kind(), message),
                None => transport.kind().to_string(),
            },
        },
    }
    .into()
}

pub(crate) fn decode_error(service: Service, endpoint: &str, err: std::io::Error) -> GlucoRsError {
    UpstreamError::Decode {
        service,
        endpoint: endpoint.to_string(),
        reason: err.to_string(),
    }
    .into()
}

/// Blocking Nightscout API v1 client
pub struct NightscoutClient {
    agent: Agent,
    config: NightscoutConfig,
}

impl NightscoutClient {
    pub fn new(config: NightscoutConfig, timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new().timeout(timeout).build();
        Self { agent, config }
    }

    pub fn from_config(config: &ConnectionConfig) -> Self {
        Self::new(config.nightscout.clone(), config.request_timeout)
    }

    fn url(&self, endpoint: &str) -> String {
        format!("{}/api/v1/{}", self.config.base_url, endpoint)
    }

    fn get(&self, endpoint: &str) -> ureq::Request {
        let request = self
            .agent
            .get(&self.url(endpoint))
            .set("Accept", "application/json");
        match &self.config.api_secret {
            Some(secret) => request.set("api-secret", secret),
            None => request,
        }
    }

    fn get_json(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Value> {
        debug!(endpoint, ?query, "Nightscout request");
        let response = query
            .iter()
            .fold(self.get(endpoint), |request, (key, value)| request.query(key, value))
            .call()
            .map_err(|e| upstream_error(Service::Nightscout, endpoint, e))?;

        response
            .into_json::<Value>()
            .map_err(|e| decode_error(Service::Nightscout, endpoint, e))
    }

    /// HTTP status of `status.json`, fetched without the secret header
    pub fn status(&self) -> Result<u16> {
        let response = self
            .agent
            .get(&self.url(STATUS_ENDPOINT))
            .call()
            .map_err(|e| upstream_error(Service::Nightscout, STATUS_ENDPOINT, e))?;
        Ok(response.status())
    }

    /// The most recent `count` entries, undecoded
    pub fn sample_entries(&self, count: usize) -> Result<Value> {
        let count = count.to_string();
        self.get_json(ENTRIES_ENDPOINT, &[("count", count.as_str())])
    }
}

impl GlucoseSource for NightscoutClient {
    fn fetch_glucose(&self, window: &EvaluationWindow) -> Result<Vec<GlucoseReading>> {
        let find = glucose_query(window);
        let count = GLUCOSE_QUERY_LIMIT.to_string();
        let body = self.get_json(ENTRIES_ENDPOINT, &[("find", find.as_str()), ("count", count.as_str())])?;
        parse_entries(body)
    }

    fn fetch_treatments(&self, window: &EvaluationWindow) -> Result<Vec<Treatment>> {
        let find = treatment_query(window);
        let count = TREATMENT_QUERY_LIMIT.to_string();
        let body = self.get_json(TREATMENTS_ENDPOINT, &[("find", find.as_str()), ("count", count.as_str())])?;
        parse_treatments(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use chrono_tz::Europe::Berlin;

    fn window() -> EvaluationWindow {
        EvaluationWindow::for_date(NaiveDate::from_ymd_opt(2024, 6, 14).unwrap(), Berlin).unwrap()
    }

    #[test]
    fn test_glucose_query() {
        let query: Value = serde_json::from_str(&glucose_query(&window())).unwrap();
        assert_eq!(query["type"], "sgv");
        assert_eq!(query["date"]["$gte"], 1_718_316_000_000i64);
        assert_eq!(query["date"]["$lt"], 1_718_402_400_000i64);
    }

    #[test]
    fn test_treatment_query() {
        let query: Value = serde_json::from_str(&treatment_query(&window())).unwrap();
        assert_eq!(query["created_at"]["$gte"], "2024-06-14T00:00:00+02:00");
        assert_eq!(query["created_at"]["$lt"], "2024-06-15T00:00:00+02:00");
    }

    #[test]
    fn test_parse_entries_filters_non_numeric() {
        let body = json!([
            {"sgv": 110, "date": 3, "type": "sgv"},
            {"sgv": "HIGH", "date": 2},
            {"sgv": null, "date": 4},
            {"sgv": 95.5, "date": 1},
        ]);
        let readings = parse_entries(body).unwrap();
        assert_eq!(
            readings,
            vec![GlucoseReading::new(3, 110.0), GlucoseReading::new(1, 95.5)]
        );
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = parse_entries(json!({"status": 401})).unwrap_err();
        assert!(matches!(
            err,
            GlucoRsError::Upstream(UpstreamError::Decode { service: Service::Nightscout, .. })
        ));
        assert!(err.to_string().contains("an object"));
    }

    #[test]
    fn test_parse_treatments() {
        let body = json!([{"carbs": 10}, {"insulin": "x"}, {}]);
        let treatments = parse_treatments(body).unwrap();
        assert_eq!(treatments.len(), 3);
        assert_eq!(treatments[0].carbs, Some(10.0));
        assert_eq!(treatments[1].insulin, None);
    }

    #[test]
    fn test_urls() {
        let client = NightscoutClient::new(
            NightscoutConfig {
                base_url: "https://ns.example.org".to_string(),
                api_secret: None,
            },
            Duration::from_secs(30),
        );
        assert_eq!(client.url(ENTRIES_ENDPOINT), "https://ns.example.org/api/v1/entries.json");
    }
}
