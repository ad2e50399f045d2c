//! Serial transport: one request/response exchange per call.
//!
//! The port is opened right before each exchange and dropped right after it, so no
//! handle outlives a call. `exchange` takes `&mut self`; a single `Transport` can
//! never have two exchanges in flight.

use serialport::SerialPort;
use std::io::{self, Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

use crate::constants::{MAX_RESPONSE_LEN, TERMINATOR};
use crate::error::{AxpertError, Result};
use crate::frame::frame;
use crate::types::SerialPreset;

/// An open link to the inverter
pub trait Channel: Read + Write {
    /// Discard anything pending in the input and output buffers
    fn discard_buffers(&mut self) -> io::Result<()>;

    /// Timeout applied to subsequent reads and writes
    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()>;
}

impl Channel for Box<dyn SerialPort> {
    fn discard_buffers(&mut self) -> io::Result<()> {
        self.clear(serialport::ClearBuffer::All)?;
        Ok(())
    }

    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.set_timeout(timeout)?;
        Ok(())
    }
}

/// Opens channels on demand
pub trait Connector {
    type Channel: Channel;

    /// Human-readable endpoint, used in errors and logs
    fn endpoint(&self) -> &str;

    fn open(&self, preset: &SerialPreset) -> Result<Self::Channel>;
}

/// Real serial device at a filesystem path
#[derive(Debug, Clone)]
pub struct SerialConnector {
    path: String,
}

impl SerialConnector {
    pub fn new(path: impl Into<String>) -> Self {
        SerialConnector { path: path.into() }
    }

    /// List available serial ports
    pub fn list_ports() -> Result<Vec<serialport::SerialPortInfo>> {
        Ok(serialport::available_ports()?)
    }
}

impl Connector for SerialConnector {
    type Channel = Box<dyn SerialPort>;

    fn endpoint(&self) -> &str {
        &self.path
    }

    fn open(&self, preset: &SerialPreset) -> Result<Self::Channel> {
        serialport::new(&self.path, preset.baud_rate)
            .data_bits(preset.serial_data_bits()?)
            .parity(preset.parity.into())
            .stop_bits(preset.stop_bits.into())
            .flow_control(preset.flow_control()?)
            .timeout(preset.read_timeout())
            .open()
            .map_err(|source| AxpertError::PortUnavailable {
                port: self.path.clone(),
                source,
            })
    }
}

/// Owns the serial configuration and performs exchanges
#[derive(Debug)]
pub struct Transport<C: Connector = SerialConnector> {
    connector: C,
    preset: SerialPreset,
}

impl Transport<SerialConnector> {
    /// Transport for a serial device path
    pub fn serial(path: impl Into<String>, preset: SerialPreset) -> Self {
        Transport::new(SerialConnector::new(path), preset)
    }
}

impl<C: Connector> Transport<C> {
    pub fn new(connector: C, preset: SerialPreset) -> Self {
        Transport { connector, preset }
    }

    pub fn endpoint(&self) -> &str {
        self.connector.endpoint()
    }

    /// Send one command and return the raw response line.
    ///
    /// Fails with `PortUnavailable` when the port cannot be opened and `NoResponse`
    /// when nothing but terminators arrive before the read timeout.
    pub fn exchange(&mut self, command: &str) -> Result<String> {
        let wire = frame(command);
        debug!(port = self.connector.endpoint(), command, "opening serial port");
        let mut channel = self.connector.open(&self.preset)?;

        // Dropping the channel closes the port, on success and on failure alike.
        let response = self.exchange_on(&mut channel, command, &wire);
        drop(channel);

        let line = response?;
        if line.iter().all(|b| b.is_ascii_whitespace()) {
            debug!(command, "empty response");
            return Err(AxpertError::NoResponse {
                command: command.to_string(),
            });
        }

        let text = String::from_utf8_lossy(&line).into_owned();
        debug!(command, response = %text.trim_end(), "received");
        Ok(text)
    }

    fn exchange_on(
        &self,
        channel: &mut C::Channel,
        command: &str,
        wire: &[u8],
    ) -> Result<Vec<u8>> {
        channel.discard_buffers()?;

        trace!(command, frame = %hex(wire), "sending");
        channel.set_io_timeout(self.preset.write_timeout())?;
        channel.write_all(wire)?;
        channel.flush()?;

        self.read_line(channel)
    }

    /// Read up to and including the first `\r` or `\n`, stopping once the read
    /// timeout has elapsed even if bytes keep trickling in.
    ///
    /// Each read only gets the time left until the deadline.
    fn read_line(&self, channel: &mut C::Channel) -> Result<Vec<u8>> {
        let deadline = Instant::now() + self.preset.read_timeout();
        let mut line = Vec::with_capacity(128);
        let mut buf = [0u8; 64];

        while line.len() < MAX_RESPONSE_LEN {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            channel.set_io_timeout(remaining)?;
            match channel.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    let chunk = &buf[..n];
                    match chunk.iter().position(|b| *b == TERMINATOR || *b == b'\n') {
                        Some(end) => {
                            line.extend_from_slice(&chunk[..=end]);
                            break;
                        }
                        None => line.extend_from_slice(chunk),
                    }
                }
                Err(e) if e.kind() == io::ErrorKind::TimedOut => break,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        trace!(response = %hex(&line), "read line");
        Ok(line)
    }
}

fn hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}
