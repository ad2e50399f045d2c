//! Host CPU temperature.

use std::fs;
use std::path::PathBuf;

use crate::error::{AxpertError, Result};

/// Default Linux thermal zone for the SoC
pub const DEFAULT_THERMAL_ZONE: &str = "/sys/class/thermal/thermal_zone0/temp";

/// Source of the host temperature, formatted for telemetry
pub trait TemperatureSource {
    fn read(&mut self) -> Result<String>;
}

impl<F> TemperatureSource for F
where
    F: FnMut() -> Result<String>,
{
    fn read(&mut self) -> Result<String> {
        self()
    }
}

/// Reads a sysfs thermal zone reporting millidegrees Celsius
#[derive(Debug, Clone)]
pub struct ThermalZone {
    path: PathBuf,
}

impl ThermalZone {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        ThermalZone { path: path.into() }
    }
}

impl Default for ThermalZone {
    fn default() -> Self {
        ThermalZone::new(DEFAULT_THERMAL_ZONE)
    }
}

impl TemperatureSource for ThermalZone {
    fn read(&mut self) -> Result<String> {
        let content = fs::read_to_string(&self.path).map_err(|e| {
            AxpertError::Temperature(format!("{}: {}", self.path.display(), e))
        })?;
        let millidegrees: i64 = content.trim().parse().map_err(|_| {
            AxpertError::Temperature(format!(
                "{}: unexpected content {:?}",
                self.path.display(),
                content.trim()
            ))
        })?;
        Ok(format!("{:.1}", millidegrees as f64 / 1000.0))
    }
}
