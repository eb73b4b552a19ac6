//! HTTP client for participant prediction endpoints.
//!
//! One call per sample, no retries: a timeout or transport failure is a
//! failed sample, and the run keeps going.

use std::time::Instant;

use serde_json::Value;

use crate::configuration::Configuration;

/// Why an endpoint call produced no usable prediction.
#[derive(Debug, thiserror::Error)]
pub enum CallError {
    #[error("endpoint returned status {0}")]
    Status(u16),
    #[error("transport error: {0}")]
    Transport(String),
    #[error("response body is not JSON: {0}")]
    Body(String),
}

/// Result of a successful endpoint call: the parsed body plus the measured
/// wall-clock latency of the round trip.
#[derive(Debug)]
pub struct PredictResponse {
    pub latency_ms: f64,
    pub body: Value,
}

/// A reusable client with the configured connect/read timeouts applied to
/// every call. Cheap to clone; the underlying agent shares its connection
/// pool.
#[derive(Clone)]
pub struct EndpointClient {
    agent: ureq::Agent,
}

impl EndpointClient {
    pub fn new(config: &Configuration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout_connect(config.connect_timeout)
            .timeout_read(config.read_timeout)
            .build();
        Self { agent }
    }

    /// POSTs `{"input": sample}` to the endpoint and parses the JSON body.
    ///
    /// Latency is measured around the whole round trip and reported only on
    /// success; a failure of any kind (non-200, timeout, transport, non-JSON
    /// body) yields a [`CallError`] and no latency figure.
    pub fn predict(&self, endpoint_url: &str, sample: &str) -> Result<PredictResponse, CallError> {
        let url = endpoint_url.trim_end_matches('/');
        let started = Instant::now();
        let response = self
            .agent
            .post(url)
            .send_json(serde_json::json!({ "input": sample }));
        let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

        match response {
            Ok(response) => {
                // only an exact 200 counts, not 2xx in general
                if response.status() != 200 {
                    return Err(CallError::Status(response.status()));
                }
                let body: Value = response
                    .into_json()
                    .map_err(|e| CallError::Body(e.to_string()))?;
                Ok(PredictResponse { latency_ms, body })
            }
            Err(ureq::Error::Status(code, _)) => Err(CallError::Status(code)),
            Err(ureq::Error::Transport(transport)) => {
                Err(CallError::Transport(transport.to_string()))
            }
        }
    }
}
