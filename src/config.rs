use std::env;
use std::error::Error;
use std::fmt;
use std::str::FromStr;

/// Drivers the station knows how to build
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorKind {
    Bme280,
    Ccs811,
    Veml6075,
    Ds18b20,
    Anemometer,
    RainGauge,
    Windvane,
}

impl SensorKind {
    pub const ALL: [SensorKind; 7] = [
        SensorKind::Bme280,
        SensorKind::Ccs811,
        SensorKind::Veml6075,
        SensorKind::Ds18b20,
        SensorKind::Anemometer,
        SensorKind::RainGauge,
        SensorKind::Windvane,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SensorKind::Bme280 => "bme280",
            SensorKind::Ccs811 => "ccs811",
            SensorKind::Veml6075 => "veml6075",
            SensorKind::Ds18b20 => "ds18b20",
            SensorKind::Anemometer => "anemometer",
            SensorKind::RainGauge => "rain_gauge",
            SensorKind::Windvane => "windvane",
        }
    }
}

impl fmt::Display for SensorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SensorKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let name = s.trim().to_ascii_lowercase();
        SensorKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == name)
            .ok_or_else(|| format!("unknown sensor '{}'", s.trim()))
    }
}

/// Parse a comma separated sensor list. `all` enables every driver; repeated
/// names are kept once, in first-seen order.
pub fn parse_sensor_list(list: &str) -> Result<Vec<SensorKind>, String> {
    if list.trim().eq_ignore_ascii_case("all") {
        return Ok(SensorKind::ALL.to_vec());
    }

    let mut sensors = Vec::new();
    for name in list.split(',').filter(|n| !n.trim().is_empty()) {
        let kind = name.parse::<SensorKind>()?;
        if !sensors.contains(&kind) {
            sensors.push(kind);
        }
    }

    if sensors.is_empty() {
        return Err("no sensors enabled".into());
    }
    Ok(sensors)
}

/// Parse `value` read from `key`, naming the variable in the error
fn parse_value<T>(key: &str, value: &str) -> Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e| format!("invalid {} '{}': {}", key, value, e))
}

fn env_or<T>(key: &str, default: T) -> Result<T, String>
where
    T: FromStr,
    T::Err: fmt::Display,
{
    match env::var(key) {
        Ok(value) => parse_value(key, &value),
        Err(_) => Ok(default),
    }
}

fn env_string_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

#[derive(Debug, Clone)]
pub struct StationConfig {
    pub name: String,
    pub interval_secs: u64,
    pub altitude_m: f64,
    pub temperature_correction: f64,
    pub sensors: Vec<SensorKind>,
    pub i2c_bus: String,
    pub spi_device: String,
    pub gpio_chip: String,
    pub anemometer_pin: u32,
    pub rain_gauge_pin: u32,
    pub windvane_vin: f64,
    pub ccs811_warmup_reads: u32,
    pub w1_devices_dir: String,
    pub database_url: Option<String>,
    pub publish_interval_mins: u64,
}

impl StationConfig {
    pub fn new() -> Result<Self, Box<dyn Error>> {
        // Load environment variables
        dotenv::dotenv().ok();

        let sensors = parse_sensor_list(&env_string_or("STATION_SENSORS", "all"))?;

        let interval_secs = env_or("STATION_INTERVAL_SECS", 60)?;
        if interval_secs == 0 {
            return Err("STATION_INTERVAL_SECS must be greater than zero".into());
        }

        let publish_interval_mins = env_or("DATABASE_PUBLISH_INTERVAL_MINS", 5)?;
        let database_url = env::var("DATABASE_URL")
            .ok()
            .filter(|url| !url.trim().is_empty());

        Ok(StationConfig {
            name: env_string_or("STATION_NAME", "hollow-weather"),
            interval_secs,
            altitude_m: env_or("STATION_ALTITUDE_M", 85.0)?,
            temperature_correction: env_or("STATION_TEMPERATURE_CORRECTION", -5.02)?,
            sensors,
            i2c_bus: env_string_or("I2C_BUS", "/dev/i2c-1"),
            spi_device: env_string_or("SPI_DEVICE", "/dev/spidev0.0"),
            gpio_chip: env_string_or("GPIO_CHIP", "/dev/gpiochip0"),
            anemometer_pin: env_or("ANEMOMETER_PIN", 5)?,
            rain_gauge_pin: env_or("RAIN_GAUGE_PIN", 6)?,
            windvane_vin: env_or("WINDVANE_VIN", 3.3)?,
            ccs811_warmup_reads: env_or("CCS811_WARMUP_READS", 3)?,
            w1_devices_dir: env_string_or("W1_DEVICES_DIR", "/sys/bus/w1/devices"),
            database_url,
            publish_interval_mins,
        })
    }

    pub fn is_enabled(&self, kind: SensorKind) -> bool {
        self.sensors.contains(&kind)
    }
}
