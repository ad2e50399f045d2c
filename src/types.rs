use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::time::Duration;

use crate::constants::*;
use crate::error::{AxpertError, Result};

/// Inquiry commands understood by the inverter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Command {
    /// Protocol id inquiry
    Qpi,
    /// Serial number inquiry
    Qid,
    /// Main CPU firmware version inquiry
    Qvfw,
    /// General status parameters inquiry
    Qpigs,
    /// Warning status inquiry
    Qpiws,
}

impl Command {
    /// ASCII code sent on the wire
    pub fn code(&self) -> &'static str {
        match self {
            Command::Qpi => "QPI",
            Command::Qid => "QID",
            Command::Qvfw => "QVFW",
            Command::Qpigs => "QPIGS",
            Command::Qpiws => "QPIWS",
        }
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Semantic type of a positional telegram token
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Float,
    Int,
}

/// Parity checking mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    None,
    Odd,
    Even,
}

impl From<Parity> for serialport::Parity {
    fn from(parity: Parity) -> Self {
        match parity {
            Parity::None => serialport::Parity::None,
            Parity::Odd => serialport::Parity::Odd,
            Parity::Even => serialport::Parity::Even,
        }
    }
}

/// Number of stop bits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopBits {
    One,
    Two,
}

impl From<StopBits> for serialport::StopBits {
    fn from(stop_bits: StopBits) -> Self {
        match stop_bits {
            StopBits::One => serialport::StopBits::One,
            StopBits::Two => serialport::StopBits::Two,
        }
    }
}

/// Serial line parameters used for every exchange.
///
/// Timeouts are kept in milliseconds so presets can be written in config files.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SerialPreset {
    pub baud_rate: u32,
    pub data_bits: u8,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub read_timeout_ms: u64,
    pub write_timeout_ms: u64,
    /// Software (XON/XOFF) flow control
    pub xon_xoff: bool,
    /// Hardware RTS/CTS flow control
    pub rts_cts: bool,
    /// Hardware DSR/DTR flow control
    pub dsr_dtr: bool,
}

impl SerialPreset {
    /// 2400 baud, 8-N-1, no flow control, 1s read / 2s write timeout.
    pub const AXPERT: SerialPreset = SerialPreset {
        baud_rate: BAUD_RATE,
        data_bits: 8,
        parity: Parity::None,
        stop_bits: StopBits::One,
        read_timeout_ms: READ_TIMEOUT_MS,
        write_timeout_ms: WRITE_TIMEOUT_MS,
        xon_xoff: false,
        rts_cts: false,
        dsr_dtr: false,
    };

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Map the byte size onto the serial library's enum
    pub fn serial_data_bits(&self) -> Result<serialport::DataBits> {
        match self.data_bits {
            5 => Ok(serialport::DataBits::Five),
            6 => Ok(serialport::DataBits::Six),
            7 => Ok(serialport::DataBits::Seven),
            8 => Ok(serialport::DataBits::Eight),
            other => Err(AxpertError::Config(format!(
                "unsupported data bits: {}",
                other
            ))),
        }
    }

    /// Collapse the three flow-control flags into the single mode the port supports.
    ///
    /// DSR/DTR flow control has no equivalent in the serial backend and is rejected,
    /// as is enabling more than one mode at once.
    pub fn flow_control(&self) -> Result<serialport::FlowControl> {
        if self.dsr_dtr {
            return Err(AxpertError::Config(
                "DSR/DTR flow control is not supported".to_string(),
            ));
        }
        match (self.xon_xoff, self.rts_cts) {
            (false, false) => Ok(serialport::FlowControl::None),
            (true, false) => Ok(serialport::FlowControl::Software),
            (false, true) => Ok(serialport::FlowControl::Hardware),
            (true, true) => Err(AxpertError::Config(
                "only one of xon_xoff and rts_cts may be enabled".to_string(),
            )),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.baud_rate == 0 {
            return Err(AxpertError::Config("baud_rate must be >= 1".to_string()));
        }
        if self.read_timeout_ms == 0 {
            return Err(AxpertError::Config(
                "read_timeout_ms must be >= 1".to_string(),
            ));
        }
        if self.write_timeout_ms == 0 {
            return Err(AxpertError::Config(
                "write_timeout_ms must be >= 1".to_string(),
            ));
        }
        self.serial_data_bits()?;
        self.flow_control()?;
        Ok(())
    }
}

impl Default for SerialPreset {
    fn default() -> Self {
        SerialPreset::AXPERT
    }
}

/// Scalar telemetry value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum TelemetryValue {
    Float(f64),
    Int(i64),
    Text(String),
}

impl TelemetryValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TelemetryValue::Float(v) => Some(*v),
            TelemetryValue::Int(v) => Some(*v as f64),
            TelemetryValue::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            TelemetryValue::Text(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for TelemetryValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryValue::Float(v) => write!(f, "{}", v),
            TelemetryValue::Int(v) => write!(f, "{}", v),
            TelemetryValue::Text(s) => f.write_str(s),
        }
    }
}

impl From<f64> for TelemetryValue {
    fn from(value: f64) -> Self {
        TelemetryValue::Float(value)
    }
}

impl From<i64> for TelemetryValue {
    fn from(value: i64) -> Self {
        TelemetryValue::Int(value)
    }
}

impl From<String> for TelemetryValue {
    fn from(value: String) -> Self {
        TelemetryValue::Text(value)
    }
}

impl From<&str> for TelemetryValue {
    fn from(value: &str) -> Self {
        TelemetryValue::Text(value.to_string())
    }
}

/// Ordered field name → value mapping handed to sinks.
///
/// Insertion order is kept on the wire. Inserting an existing key replaces the value
/// in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TelemetryMapping {
    entries: Vec<(String, TelemetryValue)>,
}

impl TelemetryMapping {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single-field payload, e.g. a host temperature reading
    pub fn single(key: impl Into<String>, value: impl Into<TelemetryValue>) -> Self {
        let mut mapping = Self::new();
        mapping.insert(key, value);
        mapping
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<TelemetryValue>) {
        let key = key.into();
        let value = value.into();
        match self.entries.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.entries.push((key, value)),
        }
    }

    pub fn get(&self, key: &str) -> Option<&TelemetryValue> {
        self.entries.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &TelemetryValue)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }
}

impl Serialize for TelemetryMapping {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (key, value) in &self.entries {
            map.serialize_entry(key, value)?;
        }
        map.end()
    }
}

impl<K: Into<String>, V: Into<TelemetryValue>> FromIterator<(K, V)> for TelemetryMapping {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut mapping = Self::new();
        for (key, value) in iter {
            mapping.insert(key, value);
        }
        mapping
    }
}

/// Decoded 8-bit device status code from a `QPIGS` response (b7 is the first character)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DeviceStatus {
    pub sbu_priority_version: bool,
    pub configuration_changed: bool,
    pub scc_firmware_updated: bool,
    pub load_on: bool,
    pub steady_charging: bool,
    pub charging: bool,
    pub scc_charging: bool,
    pub ac_charging: bool,
}

impl DeviceStatus {
    /// Parse an 8-character `0`/`1` code.
    pub fn from_code(code: &str) -> Result<Self> {
        let bits: Vec<char> = code.chars().collect();
        if bits.len() != DEVICE_STATUS_LEN || !bits.iter().all(|c| *c == '0' || *c == '1') {
            return Err(AxpertError::decode(
                Command::Qpigs.code(),
                format!("device status must be {} binary digits", DEVICE_STATUS_LEN),
                code,
            ));
        }
        let bit = |i: usize| bits[i] == '1';
        Ok(DeviceStatus {
            sbu_priority_version: bit(STATUS_BIT_SBU_PRIORITY_VERSION),
            configuration_changed: bit(STATUS_BIT_CONFIGURATION_CHANGED),
            scc_firmware_updated: bit(STATUS_BIT_SCC_FIRMWARE_UPDATED),
            load_on: bit(STATUS_BIT_LOAD_ON),
            steady_charging: bit(STATUS_BIT_STEADY_CHARGING),
            charging: bit(STATUS_BIT_CHARGING),
            scc_charging: bit(STATUS_BIT_SCC_CHARGING),
            ac_charging: bit(STATUS_BIT_AC_CHARGING),
        })
    }

    /// Add the `status_*` fields in the form dashboards expect
    pub fn append_to(&self, mapping: &mut TelemetryMapping) {
        let flag = |b: bool| if b { "1" } else { "0" };
        mapping.insert(
            "status_add_sbu_priority_version",
            if self.sbu_priority_version { "yes" } else { "no" },
        );
        mapping.insert(
            "status_configuration_status",
            if self.configuration_changed { "changed" } else { "unchanged" },
        );
        mapping.insert(
            "status_scc_firmware_version",
            if self.scc_firmware_updated { "updated" } else { "unchanged" },
        );
        mapping.insert(
            "status_load_status",
            if self.load_on { "load_on" } else { "load_off" },
        );
        mapping.insert(
            "status_battery_voltage_steady_charging",
            flag(self.steady_charging),
        );
        mapping.insert("status_is_charging", flag(self.charging));
        mapping.insert("status_ssc_charging", flag(self.scc_charging));
        mapping.insert("status_ac_charging", flag(self.ac_charging));
    }
}
