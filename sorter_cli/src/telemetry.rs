//! HTTP telemetry sink (ThingSpeak-style channel update).

use std::time::Duration;

use serde_json::json;
use sorter_traits::{BoxError, TelemetrySink};

pub struct HttpTelemetry {
    client: reqwest::blocking::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpTelemetry {
    pub fn new(url: impl Into<String>, api_key: Option<String>, timeout: Duration) -> eyre::Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
            api_key,
        })
    }

    fn body(&self, good: u64, bad: u64, avg_weight_g: f64) -> serde_json::Value {
        json!({
            "api_key": self.api_key,
            "field1": good,
            "field2": bad,
            "field3": (avg_weight_g * 1000.0).round() / 1000.0,
        })
    }
}

impl TelemetrySink for HttpTelemetry {
    fn push(&mut self, good_count: u64, bad_count: u64, avg_weight_g: f64) -> Result<(), BoxError> {
        let resp = self
            .client
            .post(&self.url)
            .json(&self.body(good_count, bad_count, avg_weight_g))
            .send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(format!("telemetry endpoint returned {status}").into());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn body_carries_counts_and_rounded_average() {
        let t = HttpTelemetry::new("http://127.0.0.1:9/update", Some("KEY".into()), Duration::from_millis(50))
            .unwrap();
        let b = t.body(7, 3, 0.123_456);
        assert_eq!(b["api_key"], "KEY");
        assert_eq!(b["field1"], 7);
        assert_eq!(b["field2"], 3);
        assert_eq!(b["field3"], 0.123);
    }

    #[test]
    fn unreachable_endpoint_is_an_error_not_a_panic() {
        // Port 9 (discard) is closed on test hosts
        let mut t = HttpTelemetry::new("http://127.0.0.1:9/update", None, Duration::from_millis(200))
            .unwrap();
        assert!(t.push(1, 0, 0.2).is_err());
    }
}
