//! MQTT broker sink.
//!
//! Each telemetry field is published to `{base_topic}/{key}` with the value's text
//! as payload. The network event loop runs on its own thread; publishes are queued
//! without blocking, so a dead broker never stalls a polling round. Every field is
//! attempted; fields that could not be queued are reported together.

use rumqttc::{Client, Event, MqttOptions, Packet, QoS};
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::error::{AxpertError, Result};
use crate::sink::{topic_for, TelemetrySink};
use crate::types::TelemetryMapping;

/// Requests buffered between the sink and the network thread
const REQUEST_CAPACITY: usize = 64;

/// Delay before the event loop retries after a connection error
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub struct MqttSink {
    client: Client,
    base_topic: String,
}

impl MqttSink {
    pub fn connect(
        host: &str,
        port: u16,
        client_id: &str,
        keep_alive: Duration,
        base_topic: &str,
    ) -> Result<Self> {
        let mut options = MqttOptions::new(client_id, host, port);
        options.set_keep_alive(keep_alive);
        Self::spawn(options, REQUEST_CAPACITY, base_topic)
    }

    fn spawn(options: MqttOptions, capacity: usize, base_topic: &str) -> Result<Self> {
        let (host, port) = options.broker_address();
        let endpoint = format!("{}:{}", host, port);
        let (client, mut connection) = Client::new(options, capacity);
        thread::Builder::new()
            .name("mqtt-eventloop".to_string())
            .spawn(move || {
                for notification in connection.iter() {
                    match notification {
                        Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                            info!(broker = %endpoint, code = ?ack.code, "MQTT connected");
                        }
                        Ok(event) => debug!(?event, "MQTT event"),
                        Err(e) => {
                            warn!(broker = %endpoint, error = %e, "MQTT connection error");
                            thread::sleep(RECONNECT_DELAY);
                        }
                    }
                }
            })?;

        Ok(MqttSink {
            client,
            base_topic: base_topic.to_string(),
        })
    }
}

impl TelemetrySink for MqttSink {
    fn name(&self) -> &str {
        "mqtt"
    }

    fn deliver(&mut self, telemetry: &TelemetryMapping) -> Result<()> {
        let mut failed = Vec::new();
        for (key, value) in telemetry.iter() {
            let topic = topic_for(&self.base_topic, key);
            let queued = self.client.try_publish(
                topic.as_str(),
                QoS::AtMostOnce,
                false,
                value.to_string(),
            );
            if let Err(e) = queued {
                failed.push(format!("{}: {}", topic, e));
            }
        }

        if !failed.is_empty() {
            return Err(AxpertError::SinkDelivery {
                sink: self.name().to_string(),
                reason: format!(
                    "{} of {} publishes failed ({})",
                    failed.len(),
                    telemetry.len(),
                    failed.join("; ")
                ),
            });
        }

        info!(topic = %self.base_topic, fields = telemetry.len(), "published payload");
        Ok(())
    }
}
