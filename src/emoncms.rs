//! EmonCMS input API sink.

use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AxpertError, Result};
use crate::sink::TelemetrySink;
use crate::types::TelemetryMapping;

/// Posts telemetry to `{base_url}input/post?apikey=..&node=..&fulljson={..}`
pub struct EmonCmsSink {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    node: String,
}

impl EmonCmsSink {
    /// `base_url` is the instance root, e.g. `http://example.com:80/emoncms/`.
    pub fn new(base_url: &str, api_key: &str, node: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AxpertError::Config(format!("emoncms client: {}", e)))?;
        Ok(EmonCmsSink {
            client,
            endpoint: input_post_url(base_url),
            api_key: api_key.to_string(),
            node: node.to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn failure(&self, reason: impl Into<String>) -> AxpertError {
        AxpertError::SinkDelivery {
            sink: self.name().to_string(),
            reason: reason.into(),
        }
    }
}

impl TelemetrySink for EmonCmsSink {
    fn name(&self) -> &str {
        "emoncms"
    }

    fn deliver(&mut self, telemetry: &TelemetryMapping) -> Result<()> {
        let payload = serde_json::to_string(telemetry).map_err(|e| self.failure(e.to_string()))?;
        debug!(endpoint = %self.endpoint, node = %self.node, %payload, "posting to emoncms");

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("apikey", self.api_key.as_str()),
                ("node", self.node.as_str()),
                ("fulljson", payload.as_str()),
            ])
            .send()
            .map_err(|e| self.failure(e.to_string()))?;

        let status = response.status();
        let body = response.text().unwrap_or_default();
        if !status.is_success() {
            return Err(self.failure(format!("HTTP {}: {}", status, body.trim())));
        }

        info!(
            node = %self.node,
            fields = telemetry.len(),
            result = %body.trim(),
            "emoncms accepted telemetry"
        );
        Ok(())
    }
}

/// Join the instance root and the input API path, tolerating a missing trailing slash.
pub fn input_post_url(base_url: &str) -> String {
    if base_url.ends_with('/') {
        format!("{}input/post", base_url)
    } else {
        format!("{}/input/post", base_url)
    }
}
