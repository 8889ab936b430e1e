/// Resistor-divider wind vane read through the MCP3008
use embedded_hal::spi::SpiDevice;

use crate::error::SensorError;
use crate::logging::EventLogger;
use crate::models::{Metric, SensorSample, Unit};
use crate::sensors::mcp3008::Mcp3008;
use crate::sensors::Sensor;

const NAME: &str = "Windvane";
const METRICS: &[Metric] = &[Metric::WindDirection];

/// One vane position
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindDirection {
    pub label: &'static str,
    pub degrees: f64,
    pub ohms: u32,
}

// Expected voltage in tenths of a volt at 3.3 V supply, label, bearing, divider resistance
const DIRECTIONS: [(i64, &str, f64, u32); 16] = [
    (4, "N", 0.0, 33000),
    (14, "NNE", 22.5, 6570),
    (12, "NE", 45.0, 8200),
    (28, "ENE", 67.5, 891),
    (27, "E", 90.0, 1000),
    (29, "ESE", 112.5, 688),
    (22, "SE", 135.0, 2200),
    (25, "SSE", 157.5, 1410),
    (18, "S", 180.0, 3900),
    (20, "SSW", 202.5, 3140),
    (7, "SW", 225.0, 16000),
    (8, "WSW", 247.5, 14120),
    (1, "W", 270.0, 120000),
    (3, "WNW", 292.5, 42120),
    (2, "NW", 315.0, 64900),
    (6, "NNW", 337.5, 21880),
];

// Readings that land between table entries because of resistor tolerance
const SNAPS: [(i64, i64); 5] = [(5, 4), (13, 12), (19, 18), (26, 27), (23, 22)];

fn decivolts(voltage: f64) -> i64 {
    (voltage * 10.0).round() as i64
}

fn snap(decivolts: i64) -> i64 {
    SNAPS
        .iter()
        .find(|(from, _)| *from == decivolts)
        .map(|(_, to)| *to)
        .unwrap_or(decivolts)
}

/// Vane position for a measured voltage, after rounding to one decimal and
/// snapping known misreads. Exact match only.
pub fn resolve_direction(voltage: f64) -> Option<WindDirection> {
    let key = snap(decivolts(voltage));
    DIRECTIONS
        .iter()
        .find(|(expected, ..)| *expected == key)
        .map(|&(_, label, degrees, ohms)| WindDirection {
            label,
            degrees,
            ohms,
        })
}

pub struct Windvane<S> {
    adc: Mcp3008<S>,
    channel: u8,
    vin: f64,
}

impl<S: SpiDevice> Windvane<S> {
    /// # Arguments
    /// * `vin` - Reference voltage of the ADC and the vane divider
    pub fn new(adc: Mcp3008<S>, channel: u8, vin: f64) -> Self {
        Windvane { adc, channel, vin }
    }
}

impl<S: SpiDevice + Send> Sensor for Windvane<S> {
    fn name(&self) -> &'static str {
        NAME
    }

    fn metrics(&self) -> &'static [Metric] {
        METRICS
    }

    fn initialize(&mut self, logger: &dyn EventLogger) -> Result<(), SensorError> {
        logger.notify_start(NAME);
        logger.notify_success(NAME);
        Ok(())
    }

    fn take_reading(&mut self, logger: &dyn EventLogger) -> Result<SensorSample, SensorError> {
        let mut sample = SensorSample::new(NAME);

        let fraction = self.adc.read_fraction(self.channel)?;
        let voltage = decivolts(fraction * self.vin) as f64 / 10.0;
        sample.add_raw("ADC", fraction, Unit::Dimensionless);
        logger.notify_message(&format!("adc raw: {}", fraction), NAME);
        logger.notify_message(&format!("adc corrected reading: {}", voltage), NAME);

        let direction =
            resolve_direction(voltage).ok_or(SensorError::DirectionLookup { voltage })?;
        logger.notify_message(
            &format!("wind direction: {} ({})", direction.label, direction.degrees),
            NAME,
        );

        sample.add_diagnostic(format!("{} ({} Ω)", direction.label, direction.ohms));
        sample.record(Metric::WindDirection, direction.degrees);
        Ok(sample)
    }

    fn describe(&self) -> String {
        format!("Wind vane on MCP3008 channel {}, vin {} V", self.channel, self.vin)
    }
}
