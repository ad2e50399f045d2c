use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use axpert_monitor::config::MonitorConfig;
use axpert_monitor::sink::{LogSink, TelemetrySink};
use axpert_monitor::temperature::{TemperatureSource, ThermalZone};
use axpert_monitor::{Axpert, Monitor, Transport};

/// Poll an Axpert inverter and forward its telemetry
#[derive(Parser, Debug)]
#[command(name = "axpert-monitor", version, about, long_about = None)]
struct Args {
    /// Configuration file (TOML, or JSON by extension); falls back to AXPERT_CONFIG
    #[arg(short, long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// List available serial ports and exit
    #[arg(long)]
    list_ports: bool,

    /// Run a single polling round and exit
    #[arg(long)]
    once: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let args = Args::parse();
    if args.list_ports {
        return list_ports();
    }

    let config_path = args.config.as_ref().map(|path| path.to_string_lossy());
    let config =
        MonitorConfig::load_with_path(config_path.as_deref()).context("load config failed")?;
    config.validate().context("config validation failed")?;

    let sinks = build_sinks(&config)?;
    let temperature = build_temperature_source(&config);

    let transport = Transport::serial(config.serial.port.clone(), config.serial.preset.clone());
    info!(port = %config.serial.port, baud = config.serial.preset.baud_rate, "using inverter port");
    let mut monitor = Monitor::new(Axpert::with_transport(transport), sinks, temperature);

    monitor.announce_identity();

    if args.once {
        monitor.poll_round();
        return Ok(());
    }

    info!(interval_ms = config.poll_interval.as_millis() as u64, "starting polling loop");
    monitor.run(config.poll_interval)
}

fn build_sinks(config: &MonitorConfig) -> Result<Vec<Box<dyn TelemetrySink>>> {
    let mut sinks: Vec<Box<dyn TelemetrySink>> = Vec::new();

    if let Some(emoncms) = &config.emoncms {
        #[cfg(feature = "emoncms")]
        {
            let sink = axpert_monitor::emoncms::EmonCmsSink::new(
                &emoncms.base_url(),
                &emoncms.api_key,
                &emoncms.node,
                emoncms.timeout(),
            )
            .context("emoncms sink init failed")?;
            info!(endpoint = sink.endpoint(), node = %emoncms.node, "EmonCMS enabled");
            sinks.push(Box::new(sink));
        }
        #[cfg(not(feature = "emoncms"))]
        warn!(
            url = %emoncms.base_url(),
            "emoncms configured but the emoncms feature is disabled"
        );
    }

    match &config.mqtt {
        Some(mqtt) => {
            #[cfg(feature = "mqtt")]
            {
                let sink = axpert_monitor::mqtt::MqttSink::connect(
                    &mqtt.host,
                    mqtt.port,
                    &mqtt.client_id,
                    mqtt.keep_alive(),
                    &mqtt.topic,
                )
                .context("mqtt sink init failed")?;
                info!(host = %mqtt.host, port = mqtt.port, topic = %mqtt.topic, "MQTT enabled");
                sinks.push(Box::new(sink));
            }
            #[cfg(not(feature = "mqtt"))]
            warn!(host = %mqtt.host, "mqtt configured but the mqtt feature is disabled");
        }
        None => info!("MQTT is disabled."),
    }

    if sinks.is_empty() {
        warn!("no remote sinks configured, telemetry will only be logged");
        sinks.push(Box::new(LogSink));
    }
    Ok(sinks)
}

fn build_temperature_source(config: &MonitorConfig) -> Option<Box<dyn TemperatureSource>> {
    if !config.temperature.enabled {
        info!("host temperature disabled");
        return None;
    }
    Some(Box::new(ThermalZone::new(config.temperature.path.clone())))
}

fn list_ports() -> Result<()> {
    let ports = Axpert::list_ports().context("list serial ports failed")?;
    if ports.is_empty() {
        println!("No serial ports found!");
    }
    for port in ports {
        println!("{} - {:?}", port.port_name, port.port_type);
    }
    Ok(())
}
