#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io::{self, Read, Write};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use axpert_monitor::frame::crc16_xmodem;
use axpert_monitor::sink::TelemetrySink;
use axpert_monitor::transport::{Channel, Connector};
use axpert_monitor::{AxpertError, Result, SerialPreset, TelemetryMapping};

pub const QPIGS_RESPONSE: &str = concat!(
    "(000.0 00.0 230.1 49.9 0046 0024 000 371 53.20 000 060 0032 ",
    "0001 090.4 53.13 00000 00110110 00 00 00069 110"
);
pub const QPIWS_RESPONSE: &str = "(00000100000000000000000000000000";
pub const QPI_RESPONSE: &str = "(PI30";
pub const QID_RESPONSE: &str = "(92931509101901";
pub const QVFW_RESPONSE: &str = "(VERFW:00072.70";

/// Response body as the inverter sends it: body, CRC, `\r`
pub fn wire_response(body: &str) -> Vec<u8> {
    let mut bytes = body.as_bytes().to_vec();
    bytes.extend_from_slice(&crc16_xmodem(body.as_bytes()).to_be_bytes());
    bytes.push(b'\r');
    bytes
}

/// Short timeouts so failing reads do not slow the suite down
pub fn fast_preset() -> SerialPreset {
    SerialPreset {
        read_timeout_ms: 300,
        write_timeout_ms: 300,
        ..SerialPreset::AXPERT
    }
}

/// In-memory inverter: answers each framed command with a canned response.
#[derive(Clone, Default)]
pub struct MockInverter {
    responses: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    written: Arc<Mutex<Vec<Vec<u8>>>>,
    open_handles: Arc<AtomicUsize>,
    opens: Arc<AtomicUsize>,
    discards: Arc<AtomicUsize>,
    stale_input: Vec<u8>,
    fail_open: bool,
    trickle: Option<Duration>,
}

impl MockInverter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inverter answering all five supported inquiries
    pub fn answering_all() -> Self {
        MockInverter::new()
            .respond("QPIGS", QPIGS_RESPONSE)
            .respond("QPIWS", QPIWS_RESPONSE)
            .respond("QPI", QPI_RESPONSE)
            .respond("QID", QID_RESPONSE)
            .respond("QVFW", QVFW_RESPONSE)
    }

    pub fn respond(self, command: &str, body: &str) -> Self {
        self.respond_raw(command, wire_response(body))
    }

    pub fn respond_raw(self, command: &str, bytes: Vec<u8>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .insert(command.to_string(), bytes);
        self
    }

    pub fn silence(self, command: &str) -> Self {
        self.responses.lock().unwrap().remove(command);
        self
    }

    pub fn unplugged(mut self) -> Self {
        self.fail_open = true;
        self
    }

    /// Bytes left in the input buffer from an earlier exchange
    pub fn with_stale_input(mut self, bytes: &[u8]) -> Self {
        self.stale_input = bytes.to_vec();
        self
    }

    /// Every read blocks for `delay` and yields one byte, never a terminator
    pub fn trickling(mut self, delay: Duration) -> Self {
        self.trickle = Some(delay);
        self
    }

    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub fn discards(&self) -> usize {
        self.discards.load(Ordering::SeqCst)
    }

    pub fn written(&self) -> Vec<Vec<u8>> {
        self.written.lock().unwrap().clone()
    }
}

impl Connector for MockInverter {
    type Channel = MockChannel;

    fn endpoint(&self) -> &str {
        "mock"
    }

    fn open(&self, preset: &SerialPreset) -> Result<MockChannel> {
        if self.fail_open {
            return Err(AxpertError::PortUnavailable {
                port: self.endpoint().to_string(),
                source: serialport::Error::new(serialport::ErrorKind::NoDevice, "no such device"),
            });
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        self.open_handles.fetch_add(1, Ordering::SeqCst);
        Ok(MockChannel {
            inverter: self.clone(),
            outgoing: Vec::new(),
            pending: self.stale_input.iter().copied().collect(),
            timeout: preset.read_timeout(),
        })
    }
}

pub struct MockChannel {
    inverter: MockInverter,
    outgoing: Vec<u8>,
    pending: VecDeque<u8>,
    timeout: Duration,
}

impl Read for MockChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        // Blocks like a real port: never longer than the configured timeout.
        if let Some(delay) = self.inverter.trickle {
            if delay > self.timeout {
                thread::sleep(self.timeout);
                return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
            }
            thread::sleep(delay);
            buf[0] = b'1';
            return Ok(1);
        }
        if self.pending.is_empty() {
            thread::sleep(self.timeout);
            return Err(io::Error::new(io::ErrorKind::TimedOut, "read timed out"));
        }
        let n = buf.len().min(self.pending.len());
        for slot in buf.iter_mut().take(n) {
            *slot = self.pending.pop_front().unwrap_or_default();
        }
        Ok(n)
    }
}

impl Write for MockChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.outgoing.extend_from_slice(buf);
        if self.outgoing.last() == Some(&b'\r') && self.outgoing.len() > 3 {
            let frame = std::mem::take(&mut self.outgoing);
            let command = String::from_utf8_lossy(&frame[..frame.len() - 3]).into_owned();
            if let Some(response) = self.inverter.responses.lock().unwrap().get(&command) {
                self.pending.extend(response.iter().copied());
            }
            self.inverter.written.lock().unwrap().push(frame);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Channel for MockChannel {
    fn discard_buffers(&mut self) -> io::Result<()> {
        self.inverter.discards.fetch_add(1, Ordering::SeqCst);
        self.pending.clear();
        self.outgoing.clear();
        Ok(())
    }

    fn set_io_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }
}

impl Drop for MockChannel {
    fn drop(&mut self) {
        self.inverter.open_handles.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Sink that keeps every delivered payload
#[derive(Clone, Default)]
pub struct RecordingSink {
    pub delivered: Arc<Mutex<Vec<TelemetryMapping>>>,
}

impl RecordingSink {
    pub fn payloads(&self) -> Vec<TelemetryMapping> {
        self.delivered.lock().unwrap().clone()
    }
}

impl TelemetrySink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    fn deliver(&mut self, telemetry: &TelemetryMapping) -> Result<()> {
        self.delivered.lock().unwrap().push(telemetry.clone());
        Ok(())
    }
}

/// Sink that always fails
pub struct BrokenSink;

impl TelemetrySink for BrokenSink {
    fn name(&self) -> &str {
        "broken"
    }

    fn deliver(&mut self, _telemetry: &TelemetryMapping) -> Result<()> {
        Err(AxpertError::SinkDelivery {
            sink: "broken".to_string(),
            reason: "HTTP 500".to_string(),
        })
    }
}
