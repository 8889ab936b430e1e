/// Bosch BME280 combined temperature, pressure and humidity sensor on I2C
pub mod calibration;
pub mod compensation;
pub mod weather;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::bus::{DeviceRegistry, ReadMode, RegisterChannel};
use crate::error::SensorError;
use crate::logging::EventLogger;
use crate::models::{Metric, SensorSample, Unit};
use crate::sensors::Sensor;
use crate::utils::print_byte_array;

use calibration::{Calibration, BLOCK_1_LEN, BLOCK_2_LEN, BLOCK_3_LEN};
use compensation::RawMeasurement;

pub const DEFAULT_ADDRESS: u8 = 0x77;
const CHIP_ID: u8 = 0x60;

const REG_ID: u8 = 0xD0;
const REG_CONTROL_HUM: u8 = 0xF2;
const REG_CONTROL: u8 = 0xF4;
const REG_DATA: u8 = 0xF7;
const REG_CALIBRATION_1: u8 = 0x88;
const REG_CALIBRATION_2: u8 = 0xA1;
const REG_CALIBRATION_3: u8 = 0xE1;
const DATA_LEN: usize = 8;

const OVERSAMPLE_TEMP: u8 = 2;
const OVERSAMPLE_PRES: u8 = 2;
const OVERSAMPLE_HUM: u8 = 2;
const MODE_FORCED: u8 = 1;

const NAME: &str = "BME280";

const METRICS: &[Metric] = &[
    Metric::Temperature1,
    Metric::Pressure,
    Metric::BarometricPressure,
    Metric::SeaLevelPressure,
    Metric::OverIcePressure,
    Metric::OverWaterPressure,
    Metric::RelativeHumidity,
    Metric::AbsoluteHumidity,
    Metric::VapourPressure,
    Metric::CalculatedAltitude,
    Metric::ActualAltitude,
    Metric::HeatIndex,
    Metric::DewPoint,
];

/// Forced-mode control word for `ctrl_meas`
pub fn control_code() -> u8 {
    OVERSAMPLE_TEMP << 5 | OVERSAMPLE_PRES << 2 | MODE_FORCED
}

/// Maximum measurement time in milliseconds for the configured oversampling
pub fn wait_time_ms() -> f64 {
    1.25 + 2.3 * OVERSAMPLE_TEMP as f64
        + (2.3 * OVERSAMPLE_PRES as f64 + 0.575)
        + (2.3 * OVERSAMPLE_HUM as f64 + 0.575)
}

pub struct Bme280<B, D> {
    channel: RegisterChannel<B>,
    delay: D,
    altitude: f64,
    temperature_correction: f64,
}

impl<B: I2c, D: DelayNs> Bme280<B, D> {
    /// # Arguments
    /// * `altitude` - Site altitude in metres, used for the sea level reductions
    /// * `temperature_correction` - Self-heating offset added to the measured temperature
    pub fn new(
        registry: &mut DeviceRegistry<B>,
        address: u8,
        delay: D,
        altitude: f64,
        temperature_correction: f64,
    ) -> Self {
        Bme280 {
            channel: registry.register(address),
            delay,
            altitude,
            temperature_correction,
        }
    }

    fn read_calibration(&self, sample: &mut SensorSample) -> Result<Calibration, SensorError> {
        let block1 = self
            .channel
            .read(REG_CALIBRATION_1, BLOCK_1_LEN, ReadMode::SetReadBit)?;
        let block2 = self
            .channel
            .read(REG_CALIBRATION_2, BLOCK_2_LEN, ReadMode::SetReadBit)?;
        let block3 = self
            .channel
            .read(REG_CALIBRATION_3, BLOCK_3_LEN, ReadMode::SetReadBit)?;

        sample.add_diagnostic("Calibration data (1/2/3)");
        sample.add_diagnostic(print_byte_array(&block1));
        sample.add_diagnostic(print_byte_array(&block2));
        sample.add_diagnostic(print_byte_array(&block3));

        Ok(Calibration::extract(&block1, &block2, &block3))
    }
}

impl<B, D> Sensor for Bme280<B, D>
where
    B: I2c + Send,
    D: DelayNs + Send,
{
    fn name(&self) -> &'static str {
        NAME
    }

    fn metrics(&self) -> &'static [Metric] {
        METRICS
    }

    fn initialize(&mut self, logger: &dyn EventLogger) -> Result<(), SensorError> {
        logger.notify_start(NAME);

        let id = self.channel.read_byte(REG_ID, ReadMode::SetReadBit)?;
        if id != CHIP_ID {
            return Err(SensorError::Protocol {
                sensor: NAME,
                details: format!("unexpected chip id {:#04x}, expected {:#04x}", id, CHIP_ID),
            });
        }

        logger.notify_success(NAME);
        Ok(())
    }

    fn take_reading(&mut self, logger: &dyn EventLogger) -> Result<SensorSample, SensorError> {
        logger.notify_message("taking reading", NAME);
        let mut sample = SensorSample::new(NAME);

        self.channel.write_byte(REG_CONTROL_HUM, OVERSAMPLE_HUM)?;
        self.channel.write_byte(REG_CONTROL, control_code())?;

        let calibration = self.read_calibration(&mut sample)?;

        self.delay.delay_us((wait_time_ms() * 1000.0).ceil() as u32);

        let data = self.channel.read(REG_DATA, DATA_LEN, ReadMode::SetReadBit)?;
        sample.add_diagnostic("Raw data");
        sample.add_diagnostic(print_byte_array(&data));

        let raw = RawMeasurement::from_block(&data);
        sample.add_diagnostic(format!("{}:{}:{}", raw.pressure, raw.temperature, raw.humidity));
        sample.add_raw("RAW TEMPERATURE", raw.temperature as f64, Unit::DegreesCelsius);
        sample.add_raw("RAW PRESSURE", raw.pressure as f64, Unit::HectoPascal);
        sample.add_raw("RAW HUMIDITY", raw.humidity as f64, Unit::Percentage);

        let t_fine = compensation::t_fine(&calibration, raw.temperature);
        sample.add_diagnostic(format!("tfine: {}", t_fine));

        let temperature = compensation::temperature(t_fine) + self.temperature_correction;
        let pressure = compensation::pressure(&calibration, t_fine, raw.pressure);
        let humidity = compensation::humidity(&calibration, t_fine, raw.humidity);

        if !(temperature.is_finite() && pressure.is_finite() && humidity.is_finite()) {
            return Err(SensorError::Arithmetic {
                sensor: NAME,
                details: format!(
                    "non-finite compensation result (t={}, p={}, h={})",
                    temperature, pressure, humidity
                ),
            });
        }

        let vapour_pressure = weather::actual_vapour_pressure(temperature, humidity);
        let values = [
            (Metric::Temperature1, temperature),
            (Metric::Pressure, pressure),
            (
                Metric::BarometricPressure,
                weather::barometric_pressure(pressure, temperature, self.altitude, vapour_pressure),
            ),
            (
                Metric::SeaLevelPressure,
                weather::sea_level_pressure(pressure, temperature, self.altitude),
            ),
            (
                Metric::OverIcePressure,
                weather::saturation_vapour_pressure_ice(temperature),
            ),
            (
                Metric::OverWaterPressure,
                weather::saturation_vapour_pressure_water(temperature),
            ),
            (Metric::RelativeHumidity, humidity),
            (
                Metric::AbsoluteHumidity,
                weather::absolute_humidity(temperature, humidity),
            ),
            (Metric::VapourPressure, vapour_pressure),
            (Metric::CalculatedAltitude, weather::altitude(pressure)),
            (Metric::ActualAltitude, self.altitude),
            (Metric::HeatIndex, weather::heat_index(temperature, humidity)),
            (Metric::DewPoint, weather::dew_point(temperature, humidity)),
        ];

        // Nothing is recorded unless every derived value is usable
        if let Some((metric, value)) = values.iter().find(|(_, v)| !v.is_finite()) {
            return Err(SensorError::Arithmetic {
                sensor: NAME,
                details: format!(
                    "{} is {} (t={}, p={}, h={})",
                    metric, value, temperature, pressure, humidity
                ),
            });
        }

        for (metric, value) in values {
            sample.record(metric, value);
        }

        Ok(sample)
    }

    fn describe(&self) -> String {
        format!(
            "BME280 on I2C address {:#04x}, altitude {} m, temperature correction {} °C",
            self.channel.address(),
            self.altitude,
            self.temperature_correction
        )
    }
}
