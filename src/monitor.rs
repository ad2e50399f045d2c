//! Polling rounds.
//!
//! A round runs general status, warning status and the host temperature one after
//! the other. Each step ends in its own [`StepStatus`]; a failing step is logged and
//! the round moves on, so one silent inquiry never costs the others their delivery.

use chrono::{DateTime, Utc};
use std::fmt;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

use crate::constants::TEMPERATURE_FIELD;
use crate::error::{AxpertError, Result};
use crate::protocol::Axpert;
use crate::sink::{deliver_all, SinkFailure, TelemetrySink};
use crate::temperature::TemperatureSource;
use crate::transport::{Connector, SerialConnector};
use crate::types::TelemetryMapping;

/// A step of a polling round
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    SoftwareInfo,
    GeneralStatus,
    WarningStatus,
    Temperature,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Step::SoftwareInfo => "software_info",
            Step::GeneralStatus => "general_status",
            Step::WarningStatus => "warning_status",
            Step::Temperature => "temperature",
        };
        f.write_str(name)
    }
}

/// How a step ended
#[derive(Debug)]
pub enum StepStatus {
    /// Telemetry was produced and handed to the sinks; some sinks may have failed
    Delivered {
        fields: usize,
        sink_failures: Vec<SinkFailure>,
    },
    /// The inverter was unreachable or silent
    NoData,
    /// The step itself failed (decode error, I/O error, temperature read)
    Failed(AxpertError),
}

#[derive(Debug)]
pub struct StepOutcome {
    pub step: Step,
    pub status: StepStatus,
}

impl StepOutcome {
    pub fn is_delivered(&self) -> bool {
        matches!(self.status, StepStatus::Delivered { .. })
    }
}

/// Summary of one polling round
#[derive(Debug)]
pub struct RoundReport {
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub steps: Vec<StepOutcome>,
}

impl RoundReport {
    pub fn step(&self, step: Step) -> Option<&StepOutcome> {
        self.steps.iter().find(|outcome| outcome.step == step)
    }

    pub fn delivered(&self) -> usize {
        self.steps.iter().filter(|outcome| outcome.is_delivered()).count()
    }
}

/// Owns the inverter interface, the sinks and the temperature source
pub struct Monitor<C: Connector = SerialConnector> {
    axpert: Axpert<C>,
    sinks: Vec<Box<dyn TelemetrySink>>,
    temperature: Option<Box<dyn TemperatureSource>>,
}

impl<C: Connector> Monitor<C> {
    pub fn new(
        axpert: Axpert<C>,
        sinks: Vec<Box<dyn TelemetrySink>>,
        temperature: Option<Box<dyn TemperatureSource>>,
    ) -> Self {
        Monitor {
            axpert,
            sinks,
            temperature,
        }
    }

    pub fn axpert(&self) -> &Axpert<C> {
        &self.axpert
    }

    /// Query and deliver software info once, typically at start-up.
    pub fn announce_identity(&mut self) -> StepOutcome {
        let result = self.axpert.software_info();
        self.finish(Step::SoftwareInfo, result)
    }

    /// Run one round: general status, warning status, then the host temperature
    /// when a source is configured.
    pub fn poll_round(&mut self) -> RoundReport {
        let started_at = Utc::now();
        let start = Instant::now();

        let status = self.axpert.general_status();
        let general = self.finish(Step::GeneralStatus, status);

        let warning = self.axpert.warning_status();
        let warning = self.finish(Step::WarningStatus, warning);

        let mut steps = vec![general, warning];
        if let Some(source) = self.temperature.as_mut() {
            let reading = source
                .read()
                .map(|value| Some(TelemetryMapping::single(TEMPERATURE_FIELD, value)));
            steps.push(self.finish(Step::Temperature, reading));
        }

        let report = RoundReport {
            started_at,
            elapsed: start.elapsed(),
            steps,
        };
        info!(
            delivered = report.delivered(),
            elapsed_ms = report.elapsed.as_millis() as u64,
            "polling round complete"
        );
        report
    }

    /// Poll forever, starting a round every `interval` (or immediately after a round
    /// that overran it). Rounds never overlap.
    pub fn run(&mut self, interval: Duration) -> ! {
        loop {
            let report = self.poll_round();
            if let Some(remaining) = interval.checked_sub(report.elapsed) {
                thread::sleep(remaining);
            } else {
                warn!(
                    elapsed_ms = report.elapsed.as_millis() as u64,
                    interval_ms = interval.as_millis() as u64,
                    "polling round overran the interval"
                );
            }
        }
    }

    fn finish(&mut self, step: Step, result: Result<Option<TelemetryMapping>>) -> StepOutcome {
        let status = match result {
            Ok(Some(telemetry)) => {
                let sink_failures = deliver_all(&mut self.sinks, &telemetry);
                StepStatus::Delivered {
                    fields: telemetry.len(),
                    sink_failures,
                }
            }
            Ok(None) => {
                warn!(%step, "no data, skipping");
                StepStatus::NoData
            }
            Err(e) => {
                error!(%step, error = %e, "step failed");
                StepStatus::Failed(e)
            }
        };
        StepOutcome { step, status }
    }
}
