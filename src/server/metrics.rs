//! Prometheus counters for the HTTP API.

use prometheus::{Encoder, IntCounterVec, Opts, Registry, TextEncoder};

pub struct Metrics {
    registry: Registry,
    requests: IntCounterVec,
    mock_responses: IntCounterVec,
}

impl Metrics {
    pub fn new() -> Result<Self, prometheus::Error> {
        let registry = Registry::new();

        let requests = IntCounterVec::new(
            Opts::new("playground_requests_total", "API requests by endpoint and outcome"),
            &["endpoint", "outcome"],
        )?;
        let mock_responses = IntCounterVec::new(
            Opts::new("playground_mock_responses_total", "Responses served by mock pipelines"),
            &["task"],
        )?;

        registry.register(Box::new(requests.clone()))?;
        registry.register(Box::new(mock_responses.clone()))?;

        Ok(Self {
            registry,
            requests,
            mock_responses,
        })
    }

    pub fn record_request(&self, endpoint: &str, outcome: &str) {
        self.requests.with_label_values(&[endpoint, outcome]).inc();
    }

    pub fn record_mock(&self, task: &str) {
        self.mock_responses.with_label_values(&[task]).inc();
    }

    /// Text exposition format.
    pub fn render(&self) -> Result<String, prometheus::Error> {
        let mut buf = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buf)?;
        String::from_utf8(buf).map_err(|e| prometheus::Error::Msg(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_counters() {
        let m = Metrics::new().unwrap();
        m.record_request("inference", "ok");
        m.record_request("inference", "ok");
        m.record_mock("sentiment-analysis");
        let text = m.render().unwrap();
        assert!(text.contains(r#"playground_requests_total{endpoint="inference",outcome="ok"} 2"#));
        assert!(text.contains(r#"playground_mock_responses_total{task="sentiment-analysis"} 1"#));
    }
}
