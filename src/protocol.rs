use tracing::{debug, warn};

use crate::constants::*;
use crate::error::{AxpertError, Result};
use crate::telegram::Telegram;
use crate::transport::{Connector, SerialConnector, Transport};
use crate::types::*;

/// Main Axpert protocol interface
#[derive(Debug)]
pub struct Axpert<C: Connector = SerialConnector> {
    transport: Transport<C>,
}

impl Axpert<SerialConnector> {
    /// Create an interface for the inverter on `port_name` using the stock preset
    pub fn new(port_name: &str) -> Self {
        Axpert::with_transport(Transport::serial(port_name, SerialPreset::AXPERT))
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        SerialConnector::list_ports()
    }
}

impl<C: Connector> Axpert<C> {
    pub fn with_transport(transport: Transport<C>) -> Self {
        Axpert { transport }
    }

    /// Run one exchange, folding "port unavailable" and "no response" into `None`.
    fn query(&mut self, command: Command) -> Result<Option<String>> {
        match self.transport.exchange(command.code()) {
            Ok(raw) => Ok(Some(raw)),
            Err(e) if e.is_absence() => {
                warn!(command = command.code(), error = %e, "no data from inverter");
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Query and decode general status (`QPIGS`).
    ///
    /// `Ok(None)` means the inverter could not be reached or stayed silent.
    pub fn general_status(&mut self) -> Result<Option<TelemetryMapping>> {
        match self.query(Command::Qpigs)? {
            Some(raw) => decode_general_status(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Query and decode warning status (`QPIWS`).
    pub fn warning_status(&mut self) -> Result<Option<TelemetryMapping>> {
        match self.query(Command::Qpiws)? {
            Some(raw) => decode_warning_status(&raw).map(Some),
            None => Ok(None),
        }
    }

    /// Query protocol id, serial number and firmware version.
    ///
    /// Stops at the first inquiry that yields no data, since the result would be
    /// incomplete anyway.
    pub fn software_info(&mut self) -> Result<Option<TelemetryMapping>> {
        let Some(protocol_id) = self.query(Command::Qpi)? else {
            return Ok(None);
        };
        let Some(serial_number) = self.query(Command::Qid)? else {
            return Ok(None);
        };
        let Some(firmware_version) = self.query(Command::Qvfw)? else {
            return Ok(None);
        };
        decode_software_info(&protocol_id, &serial_number, &firmware_version).map(Some)
    }
}

/// Decode a raw `QPIGS` response.
pub fn decode_general_status(raw: &str) -> Result<TelemetryMapping> {
    let telegram = Telegram::parse(Command::Qpigs.code(), raw);
    telegram.require(GENERAL_STATUS_MIN_TOKENS)?;

    let mut mapping = TelemetryMapping::new();
    for (index, (name, kind)) in GENERAL_STATUS_FIELDS.iter().enumerate() {
        let value = match kind {
            FieldKind::Float => TelemetryValue::Float(telegram.float(index)?),
            FieldKind::Int => TelemetryValue::Int(telegram.int(index)?),
        };
        mapping.insert(*name, value);
    }

    let code = telegram.text(DEVICE_STATUS_TOKEN)?;
    let status = DeviceStatus::from_code(code).map_err(|_| {
        telegram.error(format!("device status {:?} is not an 8-bit code", code))
    })?;
    mapping.insert("device_status", code);
    status.append_to(&mut mapping);

    debug!(fields = mapping.len(), "decoded general status");
    Ok(mapping)
}

/// Decode a raw `QPIWS` response.
///
/// The warning payload is one contiguous digit string; each flag is a single
/// character at a fixed offset.
pub fn decode_warning_status(raw: &str) -> Result<TelemetryMapping> {
    let telegram = Telegram::parse(Command::Qpiws.code(), raw);
    let code: Vec<char> = telegram.text(0)?.chars().collect();
    if code.len() < WARNING_MIN_CHARS {
        return Err(telegram.error(format!(
            "warning code has {} characters, expected at least {}",
            code.len(),
            WARNING_MIN_CHARS
        )));
    }

    let mapping: TelemetryMapping = WARNING_FIELDS
        .iter()
        .map(|(offset, name)| (*name, code[*offset].to_string()))
        .collect();

    debug!(fields = mapping.len(), "decoded warning status");
    Ok(mapping)
}

/// Build software info from the raw `QPI`, `QID` and `QVFW` responses.
pub fn decode_software_info(
    protocol_id_raw: &str,
    serial_number_raw: &str,
    firmware_version_raw: &str,
) -> Result<TelemetryMapping> {
    let mut mapping = TelemetryMapping::new();
    mapping.insert(
        "protocol_id",
        slice_chars(Command::Qpi, protocol_id_raw, PROTOCOL_ID_CHARS)?,
    );
    mapping.insert(
        "serial_number",
        slice_chars(Command::Qid, serial_number_raw, SERIAL_NUMBER_CHARS)?,
    );
    mapping.insert(
        "firmware_version",
        slice_chars(Command::Qvfw, firmware_version_raw, FIRMWARE_VERSION_CHARS)?,
    );
    Ok(mapping)
}

fn slice_chars(command: Command, raw: &str, (start, end): (usize, usize)) -> Result<String> {
    let available = raw.chars().count();
    if available < end {
        return Err(AxpertError::decode(
            command.code(),
            format!("expected at least {} characters, got {}", end, available),
            raw,
        ));
    }
    Ok(raw.chars().skip(start).take(end - start).collect())
}
