//! Protocol constants for Axpert (PI30) inverter communication.
//!
//! This module defines the serial line parameters, the frame terminator and the
//! fixed field layouts of every supported inquiry. Offsets and field names follow
//! the vendor's PI30 protocol tables.

use crate::types::FieldKind;

/// Frame terminator (carriage return)
pub const TERMINATOR: u8 = 0x0D;

/// Baud rate (2400 bps)
pub const BAUD_RATE: u32 = 2400;

/// Read timeout in milliseconds
pub const READ_TIMEOUT_MS: u64 = 1000;

/// Write timeout in milliseconds
pub const WRITE_TIMEOUT_MS: u64 = 2000;

/// Upper bound on a single response line; longer reads are cut off
pub const MAX_RESPONSE_LEN: usize = 512;

/// Default serial device path
pub const DEFAULT_PORT: &str = "/dev/ttyUSB0";

/// Default interval between polling rounds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 5000;

/// Minimum telegram tokens in a `QPIGS` response
pub const GENERAL_STATUS_MIN_TOKENS: usize = 17;

/// `QPIGS` tokens 0..=15, in wire order.
pub const GENERAL_STATUS_FIELDS: [(&str, FieldKind); 16] = [
    // Grid voltage (V)
    ("grid_voltage", FieldKind::Float),
    // Grid frequency (Hz)
    ("grid_frequency", FieldKind::Float),
    // AC output voltage (V)
    ("output_voltage", FieldKind::Float),
    // AC output frequency (Hz)
    ("output_frequency", FieldKind::Float),
    // AC output apparent power (VA)
    ("output_app_power", FieldKind::Int),
    // AC output active power (W)
    ("output_active_power", FieldKind::Int),
    // Output load (%)
    ("output_load_percent", FieldKind::Int),
    // Bus voltage (V)
    ("bus_voltage", FieldKind::Int),
    // Battery voltage (V)
    ("battery_voltage", FieldKind::Float),
    // Battery charging current (A)
    ("battery_charging_current", FieldKind::Float),
    // Battery capacity (%)
    ("battery_capacity", FieldKind::Int),
    // Inverter heat sink temperature (°C)
    ("inverter_temp", FieldKind::Int),
    // PV input current for battery (A)
    ("pv_battery_current", FieldKind::Int),
    // PV input voltage (V)
    ("pv_voltage", FieldKind::Float),
    // Battery voltage measured by the SCC (V)
    ("battery_voltage_scc", FieldKind::Float),
    // Battery discharge current (A)
    ("battery_current", FieldKind::Int),
];

/// Token index of the 8-character device status code in a `QPIGS` response
pub const DEVICE_STATUS_TOKEN: usize = 16;

/// Length of the device status code
pub const DEVICE_STATUS_LEN: usize = 8;

/// Device status bit positions, counted from the left of the code (b7 first).
pub const STATUS_BIT_SBU_PRIORITY_VERSION: usize = 0;
pub const STATUS_BIT_CONFIGURATION_CHANGED: usize = 1;
pub const STATUS_BIT_SCC_FIRMWARE_UPDATED: usize = 2;
pub const STATUS_BIT_LOAD_ON: usize = 3;
pub const STATUS_BIT_STEADY_CHARGING: usize = 4;
pub const STATUS_BIT_CHARGING: usize = 5;
pub const STATUS_BIT_SCC_CHARGING: usize = 6;
pub const STATUS_BIT_AC_CHARGING: usize = 7;

/// Minimum characters in the `QPIWS` warning code
pub const WARNING_MIN_CHARS: usize = 30;

/// `QPIWS` character offsets. Offsets 0, 13 and 15 are reserved by the protocol
/// and never reported; 30 and 31 are reserved as well and lie past the table.
pub const WARNING_FIELDS: [(usize, &str); 27] = [
    (1, "error_inverter"),
    (2, "error_bus_over"),
    (3, "error_bus_under"),
    (4, "error_bus_soft_fail"),
    (5, "error_line_fail"),
    (6, "error_opv_short"),
    (7, "error_inverter_low_voltage"),
    (8, "error_inverter_high_voltage"),
    (9, "error_inverter_high_temp"),
    (10, "error_inverter_fan_locked"),
    (11, "error_battery_high_voltage"),
    (12, "error_battery_low_alarm"),
    (14, "error_battery_shutdown"),
    (16, "error_overload"),
    (17, "error_eeprom_fault"),
    (18, "error_inverter_over_current"),
    (19, "error_inverter_soft_fail"),
    (20, "error_self_test_fail"),
    (21, "error_op_dc_over_voltage"),
    (22, "error_battery_open"),
    (23, "error_current_sensor_fail"),
    (24, "error_battery_short"),
    (25, "error_power_limit"),
    (26, "error_pv_high_voltage"),
    (27, "error_mppt_overload_fault"),
    (28, "error_mppt_overload_warning"),
    (29, "error_battery_too_low"),
];

/// Reserved `QPIWS` offsets inside the decoded range
pub const WARNING_RESERVED: [usize; 3] = [0, 13, 15];

/// Character range of the protocol id in a `QPI` response, e.g. `(PI30`
pub const PROTOCOL_ID_CHARS: (usize, usize) = (1, 5);

/// Character range of the serial number in a `QID` response
pub const SERIAL_NUMBER_CHARS: (usize, usize) = (1, 15);

/// Character range of the firmware version in a `QVFW` response, e.g. `(VERFW:00072.70`
pub const FIRMWARE_VERSION_CHARS: (usize, usize) = (7, 15);

/// Telemetry field used for the host CPU temperature
pub const TEMPERATURE_FIELD: &str = "rpi_temp";
