//! # Axpert Monitor
//!
//! A Rust library for polling Axpert / Voltronic (PI30 protocol) solar inverters over
//! a serial link and forwarding the decoded telemetry to remote collectors.
//!
//! ## Features
//!
//! - Frame inquiries with the XMODEM CRC-16 the inverter expects
//! - One open/flush/write/read/close exchange per command, with typed failures
//! - Decode general status (`QPIGS`), warning status (`QPIWS`) and software info
//!   (`QPI`, `QID`, `QVFW`) into ordered telemetry mappings
//! - Deliver telemetry to EmonCMS (`emoncms` feature) and MQTT (`mqtt` feature)
//! - Polling rounds where one failing step never blocks the others
//!
//! ## Example
//!
//! ```no_run
//! use axpert_monitor::Axpert;
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut axpert = Axpert::new("/dev/ttyUSB0");
//!     if let Some(status) = axpert.general_status()? {
//!         println!("Battery voltage: {:?}", status.get("battery_voltage"));
//!     }
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod constants;
pub mod error;
pub mod frame;
pub mod monitor;
pub mod protocol;
pub mod sink;
pub mod telegram;
pub mod temperature;
pub mod transport;
pub mod types;

#[cfg(feature = "emoncms")]
pub mod emoncms;

#[cfg(feature = "mqtt")]
pub mod mqtt;

pub use error::{AxpertError, Result};
pub use monitor::{Monitor, RoundReport, Step, StepOutcome, StepStatus};
pub use protocol::Axpert;
pub use transport::{Connector, Transport};
pub use types::*;
