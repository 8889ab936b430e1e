mod bus;
mod config;
mod database;
mod error;
mod logging;
mod models;
mod sensors;
mod sinks;
mod station;
mod utils;

use std::error::Error;
use std::sync::Arc;

use linux_embedded_hal::spidev::{SpiModeFlags, SpidevOptions};
use linux_embedded_hal::{Delay, I2cdev, SpidevDevice};
use log::{error, info, warn};
use tokio::sync::mpsc::unbounded_channel;
use tokio::time::Duration;

use bus::{watch_line, DeviceRegistry, Edge};
use config::{SensorKind, StationConfig};
use database::PostgresSink;
use logging::{ConsoleEventLogger, EventLogger};
use sensors::mcp3008::Mcp3008;
use sensors::pulse::spawn_edge_actor;
use sensors::{bme280, ccs811, veml6075};
use sensors::{Anemometer, Bme280, Ccs811, Ds18b20, RainGauge, Veml6075, Windvane};
use sinks::LogSink;
use station::WeatherStation;

const WINDVANE_ADC_CHANNEL: u8 = 0;
const MCP3008_MAX_SPEED_HZ: u32 = 1_000_000;

/// Build the drivers that share the I2C bus
///
/// A bus that cannot be opened leaves every I2C driver out of the station.
fn add_i2c_sensors(config: &StationConfig, station: &mut WeatherStation) {
    let wanted = [SensorKind::Bme280, SensorKind::Ccs811, SensorKind::Veml6075];
    if !wanted.iter().any(|kind| config.is_enabled(*kind)) {
        return;
    }

    let bus = match I2cdev::new(&config.i2c_bus) {
        Ok(bus) => bus,
        Err(e) => {
            error!("Failed to open I2C bus {}: {:?}", config.i2c_bus, e);
            return;
        }
    };
    let mut registry = DeviceRegistry::new(bus);

    if config.is_enabled(SensorKind::Bme280) {
        station.add_sensor(Box::new(Bme280::new(
            &mut registry,
            bme280::DEFAULT_ADDRESS,
            Delay,
            config.altitude_m,
            config.temperature_correction,
        )));
    }
    if config.is_enabled(SensorKind::Ccs811) {
        station.add_sensor(Box::new(Ccs811::new(
            &mut registry,
            ccs811::DEFAULT_ADDRESS,
            Delay,
            config.ccs811_warmup_reads,
        )));
    }
    if config.is_enabled(SensorKind::Veml6075) {
        station.add_sensor(Box::new(Veml6075::new(
            &mut registry,
            veml6075::DEFAULT_ADDRESS,
            Delay,
        )));
    }

    let addresses: Vec<String> = registry
        .addresses()
        .iter()
        .map(|address| format!("{:#04x}", address))
        .collect();
    info!("I2C devices on {}: {}", config.i2c_bus, addresses.join(", "));
}

/// Wire the anemometer and rain gauge to their GPIO lines through counter actors
fn add_pulse_sensors(config: &StationConfig, station: &mut WeatherStation) {
    if config.is_enabled(SensorKind::Anemometer) {
        let anemometer = Anemometer::new(config.anemometer_pin);
        let (events, receiver) = unbounded_channel();
        match watch_line(
            &config.gpio_chip,
            config.anemometer_pin,
            Edge::Rising,
            "anemometer",
            events,
        ) {
            Ok(_) => {
                spawn_edge_actor("anemometer", receiver, anemometer.edge_handler());
                station.add_sensor(Box::new(anemometer));
            }
            Err(e) => error!(
                "Failed to watch anemometer line {}: {}",
                config.anemometer_pin, e
            ),
        }
    }

    if config.is_enabled(SensorKind::RainGauge) {
        let rain_gauge = RainGauge::new(config.rain_gauge_pin);
        let (events, receiver) = unbounded_channel();
        match watch_line(
            &config.gpio_chip,
            config.rain_gauge_pin,
            Edge::Falling,
            "rain_gauge",
            events,
        ) {
            Ok(_) => {
                spawn_edge_actor("rain_gauge", receiver, rain_gauge.edge_handler());
                station.add_sensor(Box::new(rain_gauge));
            }
            Err(e) => error!(
                "Failed to watch rain gauge line {}: {}",
                config.rain_gauge_pin, e
            ),
        }
    }
}

fn open_adc(path: &str) -> Result<Mcp3008<SpidevDevice>, String> {
    let mut spi = SpidevDevice::open(path).map_err(|e| format!("{:?}", e))?;
    let options = SpidevOptions::new()
        .bits_per_word(8)
        .max_speed_hz(MCP3008_MAX_SPEED_HZ)
        .mode(SpiModeFlags::SPI_MODE_0)
        .build();
    spi.0
        .configure(&options)
        .map_err(|e| format!("SPI configuration error: {}", e))?;

    Ok(Mcp3008::new(spi))
}

fn add_windvane(config: &StationConfig, station: &mut WeatherStation) {
    if !config.is_enabled(SensorKind::Windvane) {
        return;
    }

    match open_adc(&config.spi_device) {
        Ok(adc) => station.add_sensor(Box::new(Windvane::new(
            adc,
            WINDVANE_ADC_CHANNEL,
            config.windvane_vin,
        ))),
        Err(e) => error!("Failed to open ADC on {}: {}", config.spi_device, e),
    }
}

fn build_station(config: &StationConfig) -> WeatherStation {
    let logger: Arc<dyn EventLogger> = Arc::new(ConsoleEventLogger);
    let mut station = WeatherStation::new(logger);

    add_i2c_sensors(config, &mut station);
    if config.is_enabled(SensorKind::Ds18b20) {
        station.add_sensor(Box::new(Ds18b20::new(&config.w1_devices_dir)));
    }
    add_pulse_sensors(config, &mut station);
    add_windvane(config, &mut station);

    station.add_sink(Box::new(LogSink));
    match &config.database_url {
        Some(database_url) => {
            let (sink, _publisher) = PostgresSink::spawn(
                database_url.clone(),
                Duration::from_secs(config.publish_interval_mins * 60),
            );
            station.add_sink(Box::new(sink));
        }
        None => info!("DATABASE_URL not set, observations are only logged"),
    }

    station
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match StationConfig::new() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e);
        }
    };

    info!(
        "Starting {} with sensors: {}",
        config.name,
        config
            .sensors
            .iter()
            .map(|kind| kind.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let station = build_station(&config);
    if station.sensor_count() == 0 {
        warn!("No sensors could be set up, observations will stay empty");
    }
    let station = Arc::new(station);

    // Handle Ctrl+C gracefully
    let (tx, mut rx) = tokio::sync::oneshot::channel();
    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to listen for Ctrl+C");
        let _ = tx.send(());
    });

    tokio::select! {
        _ = station.run(Duration::from_secs(config.interval_secs)) => {
            info!("Sampling loop stopped");
        }
        _ = &mut rx => {
            info!("Station stopped by user. Exiting gracefully.");
        }
    }

    Ok(())
}
