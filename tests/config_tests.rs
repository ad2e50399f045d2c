use std::env;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use axpert_monitor::config::MonitorConfig;
use axpert_monitor::{AxpertError, Parity};

static ENV_LOCK: Mutex<()> = Mutex::new(());

const OVERRIDES: [&str; 8] = [
    "AXPERT_PORT",
    "AXPERT_POLL_INTERVAL_MS",
    "AXPERT_EMONCMS_URL",
    "AXPERT_EMONCMS_API_KEY",
    "AXPERT_EMONCMS_NODE",
    "AXPERT_MQTT_HOST",
    "AXPERT_MQTT_PORT",
    "AXPERT_MQTT_TOPIC",
];

fn clear_env() {
    env::remove_var("AXPERT_CONFIG");
    for key in OVERRIDES {
        env::remove_var(key);
    }
}

#[test]
fn toml_config_validates() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    clear_env();
    env::set_var("AXPERT_CONFIG", fixture_path("config-valid.toml"));

    let config = MonitorConfig::load().expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.serial.port, "/dev/ttyUSB1");
    assert_eq!(config.serial.preset.baud_rate, 2400);
    assert_eq!(config.serial.preset.parity, Parity::None);
    assert_eq!(config.serial.preset.read_timeout(), Duration::from_millis(1500));
    assert_eq!(config.poll_interval, Duration::from_millis(10_000));
    let emoncms = config.emoncms.as_ref().expect("emoncms section");
    assert_eq!(emoncms.base_url(), "http://emon.local:80/emoncms/");
    let mqtt = config.mqtt.as_ref().expect("mqtt section");
    assert_eq!(mqtt.port, 1883);
    assert_eq!(mqtt.topic, "solar/axpert");
    assert!(!config.temperature.enabled);

    clear_env();
}

#[test]
fn json_config_validates() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    clear_env();
    env::set_var("AXPERT_CONFIG", fixture_path("config-valid.json"));

    let config = MonitorConfig::load().expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.serial.port, "/dev/ttyS0");
    assert_eq!(config.serial.preset.baud_rate, 2400);
    assert_eq!(config.poll_interval, Duration::from_millis(2000));
    assert_eq!(
        config.emoncms.as_ref().map(|e| e.base_url()),
        Some("https://emon.example.com/emoncms/".to_string())
    );
    assert!(config.mqtt.is_none());

    clear_env();
}

#[test]
fn invalid_config_fails_validation() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    clear_env();
    env::set_var("AXPERT_CONFIG", fixture_path("config-invalid.toml"));

    let config = MonitorConfig::load().expect("load config");
    assert!(matches!(config.validate(), Err(AxpertError::Config(_))));

    clear_env();
}

#[test]
fn explicit_path_wins_over_env() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    clear_env();
    env::set_var("AXPERT_CONFIG", fixture_path("config-invalid.toml"));

    let path = fixture_path("config-valid.json");
    let config = MonitorConfig::load_with_path(Some(&path)).expect("load config");
    config.validate().expect("validate config");

    clear_env();
}

#[test]
fn env_overrides_file_values() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    clear_env();
    env::set_var("AXPERT_CONFIG", fixture_path("config-valid.toml"));
    env::set_var("AXPERT_PORT", "/dev/ttyAMA0");
    env::set_var("AXPERT_POLL_INTERVAL_MS", "3000");
    env::set_var("AXPERT_MQTT_PORT", "8883");
    env::set_var("AXPERT_EMONCMS_NODE", "garage");

    let config = MonitorConfig::load().expect("load config");
    config.validate().expect("validate config");

    assert_eq!(config.serial.port, "/dev/ttyAMA0");
    assert_eq!(config.poll_interval, Duration::from_millis(3000));
    assert_eq!(config.mqtt.as_ref().map(|m| m.port), Some(8883));
    assert_eq!(config.emoncms.as_ref().map(|e| e.node.as_str()), Some("garage"));

    clear_env();
}

#[test]
fn malformed_numeric_overrides_keep_file_values() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    clear_env();
    env::set_var("AXPERT_CONFIG", fixture_path("config-valid.toml"));
    env::set_var("AXPERT_POLL_INTERVAL_MS", "ten seconds");
    env::set_var("AXPERT_MQTT_PORT", "99999");

    let config = MonitorConfig::load().expect("load config");

    assert_eq!(config.poll_interval, Duration::from_millis(10_000));
    assert_eq!(config.mqtt.as_ref().map(|m| m.port), Some(1883));

    clear_env();
}

#[test]
fn env_alone_enables_mqtt() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    clear_env();
    env::set_var("AXPERT_MQTT_HOST", "localhost");
    env::set_var("AXPERT_MQTT_TOPIC", "home/inverter");

    let config = MonitorConfig::load().expect("load config");
    config.validate().expect("validate config");

    let mqtt = config.mqtt.expect("mqtt from env");
    assert_eq!(mqtt.host, "localhost");
    assert_eq!(mqtt.topic, "home/inverter");
    assert!(config.emoncms.is_none());

    clear_env();
}

#[test]
fn unparsable_file_is_config_error() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(file, "[serial\nport = ").expect("write");
    let path = file.path().to_string_lossy().to_string();

    assert!(matches!(
        MonitorConfig::load_with_path(Some(&path)),
        Err(AxpertError::Config(_))
    ));
    assert!(matches!(
        MonitorConfig::load_with_path(Some("/nonexistent/axpert.toml")),
        Err(AxpertError::Config(_))
    ));
}

#[test]
fn conflicting_flow_control_is_rejected() {
    let _guard = ENV_LOCK.lock().expect("env lock");
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp file");
    writeln!(file, "[serial]\nport = \"/dev/ttyUSB0\"\nxon_xoff = true\nrts_cts = true")
        .expect("write");
    let path = file.path().to_string_lossy().to_string();

    let config = MonitorConfig::load_with_path(Some(&path)).expect("load config");
    assert!(matches!(config.validate(), Err(AxpertError::Config(_))));
}

fn fixture_path(name: &str) -> String {
    let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
    path.push("tests");
    path.push("fixtures");
    path.push(name);
    path.to_string_lossy().to_string()
}
