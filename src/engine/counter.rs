//! Counter verification
//!
//! The engine reports counters as formatted strings. Values are parsed into
//! [`CounterValue`] as soon as they arrive so that comparisons are numeric;
//! `"9"` vs `"10"` must not be decided lexically.

use std::fmt;

use serde::Deserialize;
use serde_json::Value;

use super::client::EngineClient;
use super::endpoints::Endpoints;
use crate::common::{Error, Result};

/// A parsed counter value
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CounterValue(u64);

impl CounterValue {
    /// Baseline used when the engine has no such counter yet
    pub const ZERO: CounterValue = CounterValue(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    /// Parse the engine's string form, tolerating thousands separators
    ///
    /// Accepts plain digits (`"1234"`) or comma-grouped digits with a 1-3 digit
    /// leading group (`"1,234"`). Signs and misplaced commas are rejected.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        let mut groups = raw.split(',');
        let lead = groups.next()?;
        if lead.is_empty() || !lead.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let mut digits = lead.to_string();
        if raw.contains(',') {
            if lead.len() > 3 {
                return None;
            }
            for group in groups {
                if group.len() != 3 || !group.bytes().all(|b| b.is_ascii_digit()) {
                    return None;
                }
                digits.push_str(group);
            }
        }
        digits.parse().ok().map(Self)
    }

    /// Parse a JSON counter value, either a string or a non-negative integer
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Self::parse(s),
            Value::Number(n) => n.as_u64().map(Self),
            _ => None,
        }
    }
}

impl fmt::Display for CounterValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Name and context identifying one counter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterKey {
    pub name: String,
    pub context: String,
}

impl CounterKey {
    pub fn new(name: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            context: context.into(),
        }
    }
}

impl fmt::Display for CounterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.context)
    }
}

/// Pass/fail of one run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Pass,
    Fail,
}

/// Pass only if the counter strictly increased
pub fn evaluate(before: CounterValue, after: CounterValue) -> RunOutcome {
    if after <= before {
        RunOutcome::Fail
    } else {
        RunOutcome::Pass
    }
}

#[derive(Debug, Deserialize)]
struct CountersEntity {
    counters: CountersDto,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CountersDto {
    aggregate_snapshot: CountersSnapshot,
}

#[derive(Debug, Deserialize)]
struct CountersSnapshot {
    #[serde(default)]
    counters: Vec<CounterRecord>,
}

#[derive(Debug, Deserialize)]
struct CounterRecord {
    name: String,
    context: String,
    value: Value,
}

/// Reads counters and pokes the ingestion endpoint
pub struct CounterVerifier<'a> {
    client: &'a EngineClient,
    endpoints: &'a Endpoints,
}

impl<'a> CounterVerifier<'a> {
    pub fn new(client: &'a EngineClient, endpoints: &'a Endpoints) -> Self {
        Self { client, endpoints }
    }

    /// Current value of `key`, or [`CounterValue::ZERO`] if the engine does not list it
    pub async fn read_counter(&self, key: &CounterKey) -> Result<CounterValue> {
        let url = self.endpoints.counters();
        let body = self.client.fetch(&url).await?;
        let entity: CountersEntity = serde_json::from_value(body)
            .map_err(|e| Error::malformed(&url, format!("unexpected counters layout: {}", e)))?;

        let record = entity
            .counters
            .aggregate_snapshot
            .counters
            .into_iter()
            .find(|c| c.name == key.name && c.context == key.context);

        match record {
            Some(record) => CounterValue::from_json(&record.value).ok_or_else(|| {
                Error::malformed(
                    &url,
                    format!("counter {} has non-numeric value {}", key, record.value),
                )
            }),
            None => {
                tracing::debug!(counter = %key, "counter not present, using zero baseline");
                Ok(CounterValue::ZERO)
            }
        }
    }

    /// Post `payload` to the ingestion endpoint
    pub async fn stimulate(&self, payload: &Value) -> Result<()> {
        self.client.post(self.endpoints.ingest(), payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn counters_body(records: Value) -> Value {
        json!({ "counters": { "aggregateSnapshot": { "counters": records } } })
    }

    fn key() -> CounterKey {
        CounterKey::new("testCounterSuccess", "All UpdateCounter's")
    }

    fn setup(server: &MockServer) -> (EngineClient, Endpoints) {
        let client = EngineClient::new(Duration::from_secs(5)).unwrap();
        let endpoints = Endpoints::new(
            &format!("{}/nifi-api", server.uri()),
            &format!("{}/testInput", server.uri()),
        );
        (client, endpoints)
    }

    #[test]
    fn test_parse_counter_values() {
        assert_eq!(CounterValue::parse("0"), Some(CounterValue::ZERO));
        assert_eq!(CounterValue::parse(" 42 "), Some(CounterValue::new(42)));
        assert_eq!(CounterValue::parse("1,234,567"), Some(CounterValue::new(1_234_567)));
        assert_eq!(CounterValue::parse(""), None);
        assert_eq!(CounterValue::parse("-1"), None);
        assert_eq!(CounterValue::parse("many"), None);
        assert_eq!(CounterValue::parse("999,999"), Some(CounterValue::new(999_999)));

        assert_eq!(CounterValue::from_json(&json!(7)), Some(CounterValue::new(7)));
        assert_eq!(CounterValue::from_json(&json!("7")), Some(CounterValue::new(7)));
        assert_eq!(CounterValue::from_json(&json!(1.5)), None);
        assert_eq!(CounterValue::from_json(&json!(null)), None);
    }

    #[test]
    fn test_parse_rejects_misplaced_separators() {
        for raw in [",5", "1,,2", "12,34", "1,2345", "1234,567", "5,", "+7", "1, 234", ","] {
            assert_eq!(CounterValue::parse(raw), None, "accepted {raw:?}");
        }
    }

    #[test]
    fn test_evaluate_compares_numerically() {
        let nine = CounterValue::parse("9").unwrap();
        let ten = CounterValue::parse("10").unwrap();
        assert_eq!(evaluate(nine, ten), RunOutcome::Pass);
        assert_eq!(evaluate(ten, nine), RunOutcome::Fail);
    }

    #[test]
    fn test_evaluate_requires_strict_increase() {
        let one = CounterValue::new(1);
        assert_eq!(evaluate(one, one), RunOutcome::Fail);
        assert_eq!(evaluate(CounterValue::ZERO, one), RunOutcome::Pass);
        assert_eq!(
            evaluate(CounterValue::parse("999").unwrap(), CounterValue::parse("1,000").unwrap()),
            RunOutcome::Pass
        );
    }

    #[tokio::test]
    async fn test_read_counter_matches_name_and_context() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nifi-api/counters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(counters_body(json!([
                { "name": "testCounterSuccess", "context": "Other", "value": "99" },
                { "name": "otherCounter", "context": "All UpdateCounter's", "value": "98" },
                { "name": "testCounterSuccess", "context": "All UpdateCounter's", "value": "3" },
                { "name": "testCounterSuccess", "context": "All UpdateCounter's", "value": "4" }
            ]))))
            .mount(&server)
            .await;
        let (client, endpoints) = setup(&server);

        let value = CounterVerifier::new(&client, &endpoints)
            .read_counter(&key())
            .await
            .unwrap();
        assert_eq!(value, CounterValue::new(3));
    }

    #[tokio::test]
    async fn test_read_counter_absent_is_zero() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nifi-api/counters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(counters_body(json!([]))))
            .mount(&server)
            .await;
        let (client, endpoints) = setup(&server);

        let value = CounterVerifier::new(&client, &endpoints)
            .read_counter(&key())
            .await
            .unwrap();
        assert_eq!(value, CounterValue::ZERO);
    }

    #[tokio::test]
    async fn test_read_counter_is_idempotent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nifi-api/counters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(counters_body(json!([
                { "name": "testCounterSuccess", "context": "All UpdateCounter's", "value": "12" }
            ]))))
            .expect(3)
            .mount(&server)
            .await;
        let (client, endpoints) = setup(&server);
        let verifier = CounterVerifier::new(&client, &endpoints);

        let first = verifier.read_counter(&key()).await.unwrap();
        for _ in 0..2 {
            assert_eq!(verifier.read_counter(&key()).await.unwrap(), first);
        }
    }

    #[tokio::test]
    async fn test_read_counter_rejects_unexpected_layout() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nifi-api/counters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "counters": [] })))
            .mount(&server)
            .await;
        let (client, endpoints) = setup(&server);

        let err = CounterVerifier::new(&client, &endpoints)
            .read_counter(&key())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_read_counter_rejects_non_numeric_value() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/nifi-api/counters"))
            .respond_with(ResponseTemplate::new(200).set_body_json(counters_body(json!([
                { "name": "testCounterSuccess", "context": "All UpdateCounter's", "value": "n/a" }
            ]))))
            .mount(&server)
            .await;
        let (client, endpoints) = setup(&server);

        let err = CounterVerifier::new(&client, &endpoints)
            .read_counter(&key())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_stimulate_failure_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/testInput"))
            .respond_with(ResponseTemplate::new(500))
            .expect(1)
            .mount(&server)
            .await;
        let (client, endpoints) = setup(&server);

        let err = CounterVerifier::new(&client, &endpoints)
            .stimulate(&json!({ "foo": "bar" }))
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
    }
}
