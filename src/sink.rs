//! Telemetry sinks.
//!
//! A sink owns its destination (endpoint, credentials, base topic) and its
//! connection. Delivery failures are reported back to the caller and logged, never
//! propagated past the polling round.

use tracing::{info, warn};

use crate::error::{AxpertError, Result};
use crate::types::TelemetryMapping;

/// Destination for decoded telemetry
pub trait TelemetrySink {
    /// Short name used in logs and failure reports
    fn name(&self) -> &str;

    fn deliver(&mut self, telemetry: &TelemetryMapping) -> Result<()>;
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn deliver(&mut self, telemetry: &TelemetryMapping) -> Result<()> {
        (**self).deliver(telemetry)
    }
}

/// A delivery that failed on one sink
#[derive(Debug)]
pub struct SinkFailure {
    pub sink: String,
    pub error: AxpertError,
}

/// Hand `telemetry` to every sink, collecting failures instead of stopping.
pub fn deliver_all<S: TelemetrySink>(
    sinks: &mut [S],
    telemetry: &TelemetryMapping,
) -> Vec<SinkFailure> {
    let mut failures = Vec::new();
    for sink in sinks.iter_mut() {
        if let Err(error) = sink.deliver(telemetry) {
            warn!(sink = sink.name(), error = %error, "telemetry delivery failed");
            failures.push(SinkFailure {
                sink: sink.name().to_string(),
                error,
            });
        }
    }
    failures
}

/// Topic for one field under a base topic: `{base}/{key}`
pub fn topic_for(base_topic: &str, key: &str) -> String {
    format!("{}/{}", base_topic, key)
}

/// Writes every payload to the log; used when no remote sink is configured.
#[derive(Debug, Default)]
pub struct LogSink;

impl TelemetrySink for LogSink {
    fn name(&self) -> &str {
        "log"
    }

    fn deliver(&mut self, telemetry: &TelemetryMapping) -> Result<()> {
        let payload = serde_json::to_string(telemetry).map_err(|e| AxpertError::SinkDelivery {
            sink: self.name().to_string(),
            reason: e.to_string(),
        })?;
        info!(%payload, "telemetry");
        Ok(())
    }
}
