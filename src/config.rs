//! Monitor configuration: defaults, then a TOML/JSON file, then `AXPERT_*` env vars.

use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::warn;

use crate::constants::{DEFAULT_POLL_INTERVAL_MS, DEFAULT_PORT};
use crate::error::{AxpertError, Result};
use crate::temperature::DEFAULT_THERMAL_ZONE;
use crate::types::SerialPreset;

const DEFAULT_EMONCMS_NODE: &str = "axpert";
const DEFAULT_EMONCMS_TIMEOUT_MS: u64 = 5_000;
const DEFAULT_MQTT_PORT: u16 = 1883;
const DEFAULT_MQTT_KEEPALIVE_SECS: u64 = 60;
const DEFAULT_MQTT_CLIENT_ID: &str = "axpert-monitor";
const EMONCMS_API_KEY_LEN: usize = 32;

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorConfig {
    pub serial: SerialConfig,
    pub poll_interval: Duration,
    pub emoncms: Option<EmonCmsConfig>,
    pub mqtt: Option<MqttConfig>,
    pub temperature: TemperatureConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct SerialConfig {
    pub port: String,
    #[serde(flatten)]
    pub preset: SerialPreset,
}

impl Default for SerialConfig {
    fn default() -> Self {
        SerialConfig {
            port: DEFAULT_PORT.to_string(),
            preset: SerialPreset::AXPERT,
        }
    }
}

/// EmonCMS instance. Either `url` or `protocol`/`hostname`/`port`/`path`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct EmonCmsConfig {
    pub url: Option<String>,
    pub protocol: String,
    pub hostname: String,
    pub port: u16,
    pub path: String,
    pub api_key: String,
    pub node: String,
    pub timeout_ms: u64,
}

impl Default for EmonCmsConfig {
    fn default() -> Self {
        EmonCmsConfig {
            url: None,
            protocol: "http".to_string(),
            hostname: String::new(),
            port: 80,
            path: String::new(),
            api_key: String::new(),
            node: DEFAULT_EMONCMS_NODE.to_string(),
            timeout_ms: DEFAULT_EMONCMS_TIMEOUT_MS,
        }
    }
}

impl EmonCmsConfig {
    /// Instance root URL, always ending in `/`
    pub fn base_url(&self) -> String {
        let url = match &self.url {
            Some(url) => url.clone(),
            None => format!(
                "{}://{}:{}/{}",
                self.protocol,
                self.hostname,
                self.port,
                self.path.trim_start_matches('/')
            ),
        };
        if url.ends_with('/') {
            url
        } else {
            format!("{}/", url)
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct MqttConfig {
    pub host: String,
    pub port: u16,
    pub keepalive_secs: u64,
    pub topic: String,
    pub client_id: String,
}

impl Default for MqttConfig {
    fn default() -> Self {
        MqttConfig {
            host: String::new(),
            port: DEFAULT_MQTT_PORT,
            keepalive_secs: DEFAULT_MQTT_KEEPALIVE_SECS,
            topic: String::new(),
            client_id: DEFAULT_MQTT_CLIENT_ID.to_string(),
        }
    }
}

impl MqttConfig {
    pub fn keep_alive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct TemperatureConfig {
    pub enabled: bool,
    pub path: String,
}

impl Default for TemperatureConfig {
    fn default() -> Self {
        TemperatureConfig {
            enabled: true,
            path: DEFAULT_THERMAL_ZONE.to_string(),
        }
    }
}

impl Default for MonitorConfig {
    fn default() -> Self {
        MonitorConfig {
            serial: SerialConfig::default(),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            emoncms: None,
            mqtt: None,
            temperature: TemperatureConfig::default(),
        }
    }
}

impl MonitorConfig {
    pub fn load() -> Result<Self> {
        Self::load_with_path(None)
    }

    pub fn load_with_path(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(file_config) = load_file_config(config_path)? {
            apply_file_config(&mut config, file_config);
        }

        apply_env_overrides(&mut config);
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.serial.port.trim().is_empty() {
            return Err(config_error("serial.port must be non-empty"));
        }
        self.serial.preset.validate()?;
        if self.poll_interval.as_millis() == 0 {
            return Err(config_error("poll.interval_ms must be >= 1"));
        }

        if let Some(emoncms) = &self.emoncms {
            if emoncms.url.is_none() && emoncms.hostname.trim().is_empty() {
                return Err(config_error("emoncms.url or emoncms.hostname must be set"));
            }
            if emoncms.url.is_none() && emoncms.port == 0 {
                return Err(config_error("emoncms.port must be between 1 and 65535"));
            }
            if emoncms.api_key.len() != EMONCMS_API_KEY_LEN {
                return Err(config_error(format!(
                    "emoncms.api_key must be {} characters",
                    EMONCMS_API_KEY_LEN
                )));
            }
            if emoncms.node.trim().is_empty() {
                return Err(config_error("emoncms.node must be non-empty"));
            }
            if emoncms.timeout_ms == 0 {
                return Err(config_error("emoncms.timeout_ms must be >= 1"));
            }
        }

        if let Some(mqtt) = &self.mqtt {
            if mqtt.host.trim().is_empty() {
                return Err(config_error("mqtt.host must be non-empty"));
            }
            if mqtt.port == 0 {
                return Err(config_error("mqtt.port must be between 1 and 65535"));
            }
            if mqtt.keepalive_secs == 0 {
                return Err(config_error("mqtt.keepalive_secs must be >= 1"));
            }
            if mqtt.client_id.trim().is_empty() {
                return Err(config_error("mqtt.client_id must be non-empty"));
            }
        }

        if self.temperature.enabled && self.temperature.path.trim().is_empty() {
            return Err(config_error("temperature.path must be non-empty"));
        }

        Ok(())
    }
}

fn config_error(message: impl Into<String>) -> AxpertError {
    AxpertError::Config(message.into())
}

#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    serial: Option<SerialConfig>,
    poll: Option<FilePollConfig>,
    emoncms: Option<EmonCmsConfig>,
    mqtt: Option<MqttConfig>,
    temperature: Option<TemperatureConfig>,
}

#[derive(Debug, Deserialize)]
struct FilePollConfig {
    interval_ms: Option<u64>,
}

fn load_file_config(config_path: Option<&str>) -> Result<Option<FileConfig>> {
    let path = match config_path {
        Some(path) => path.to_string(),
        None => match env::var("AXPERT_CONFIG") {
            Ok(value) => value,
            Err(_) => return Ok(None),
        },
    };

    let content = fs::read_to_string(&path)
        .map_err(|e| config_error(format!("read config file {}: {}", path, e)))?;
    let ext = Path::new(&path).extension().and_then(|value| value.to_str());

    let config = match ext {
        Some("json") => serde_json::from_str(&content)
            .map_err(|e| config_error(format!("parse json config {}: {}", path, e)))?,
        _ => toml::from_str(&content)
            .map_err(|e| config_error(format!("parse toml config {}: {}", path, e)))?,
    };

    Ok(Some(config))
}

fn apply_file_config(config: &mut MonitorConfig, file: FileConfig) {
    if let Some(serial) = file.serial {
        config.serial = serial;
    }
    if let Some(interval_ms) = file.poll.and_then(|poll| poll.interval_ms) {
        config.poll_interval = Duration::from_millis(interval_ms);
    }
    if file.emoncms.is_some() {
        config.emoncms = file.emoncms;
    }
    if file.mqtt.is_some() {
        config.mqtt = file.mqtt;
    }
    if let Some(temperature) = file.temperature {
        config.temperature = temperature;
    }
}

fn apply_env_overrides(config: &mut MonitorConfig) {
    if let Ok(value) = env::var("AXPERT_PORT") {
        config.serial.port = value;
    }

    if let Some(interval_ms) = parse_env::<u64>("AXPERT_POLL_INTERVAL_MS") {
        config.poll_interval = Duration::from_millis(interval_ms);
    }

    if let Ok(value) = env::var("AXPERT_EMONCMS_URL") {
        config.emoncms.get_or_insert_with(EmonCmsConfig::default).url = Some(value);
    }
    if let Ok(value) = env::var("AXPERT_EMONCMS_API_KEY") {
        config.emoncms.get_or_insert_with(EmonCmsConfig::default).api_key = value;
    }
    if let Ok(value) = env::var("AXPERT_EMONCMS_NODE") {
        config.emoncms.get_or_insert_with(EmonCmsConfig::default).node = value;
    }

    if let Ok(value) = env::var("AXPERT_MQTT_HOST") {
        config.mqtt.get_or_insert_with(MqttConfig::default).host = value;
    }
    if let Some(port) = parse_env::<u16>("AXPERT_MQTT_PORT") {
        config.mqtt.get_or_insert_with(MqttConfig::default).port = port;
    }
    if let Ok(value) = env::var("AXPERT_MQTT_TOPIC") {
        config.mqtt.get_or_insert_with(MqttConfig::default).topic = value;
    }
}

fn parse_env<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|value| parse_override(key, &value))
}

/// Parse a numeric override; a malformed value is logged and ignored.
fn parse_override<T: FromStr>(key: &str, value: &str) -> Option<T> {
    match value.trim().parse() {
        Ok(parsed) => Some(parsed),
        Err(_) => {
            warn!(variable = key, value, "ignoring malformed environment override");
            None
        }
    }
}
