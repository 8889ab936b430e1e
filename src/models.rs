use std::fmt;

use time::OffsetDateTime;

use crate::error::ObservationError;

/// Physical unit attached to a reading. Display only, no conversions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unit {
    Dimensionless,
    KmPerHour,
    DegreesCelsius,
    HectoPascal,
    Meters,
    GramsPerCubicMeter,
    PartsPerMillion,
    PartsPerBillion,
    Percentage,
    Millimeter,
    Degrees,
}

impl Unit {
    pub fn symbol(self) -> &'static str {
        match self {
            Unit::Dimensionless => "",
            Unit::KmPerHour => "km/h",
            Unit::DegreesCelsius => "°C",
            Unit::HectoPascal => "hPa",
            Unit::Meters => "m",
            Unit::GramsPerCubicMeter => "g/m³",
            Unit::PartsPerMillion => "ppm",
            Unit::PartsPerBillion => "ppb",
            Unit::Percentage => "%",
            Unit::Millimeter => "mm",
            Unit::Degrees => "°",
        }
    }
}

/// One field of a [`WeatherObservation`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Temperature1,
    Temperature2,
    UvA,
    UvB,
    UvIndex,
    Tvoc,
    Co2,
    Pressure,
    BarometricPressure,
    SeaLevelPressure,
    OverIcePressure,
    OverWaterPressure,
    RelativeHumidity,
    AbsoluteHumidity,
    VapourPressure,
    CalculatedAltitude,
    ActualAltitude,
    HeatIndex,
    DewPoint,
    WindGust,
    WindAverage,
    WindDirection,
    Precipitation,
}

impl Metric {
    pub const ALL: [Metric; 23] = [
        Metric::Temperature1,
        Metric::Temperature2,
        Metric::UvA,
        Metric::UvB,
        Metric::UvIndex,
        Metric::Tvoc,
        Metric::Co2,
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
        Metric::WindGust,
        Metric::WindAverage,
        Metric::WindDirection,
        Metric::Precipitation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Metric::Temperature1 => "TEMPERATURE",
            Metric::Temperature2 => "TEMPERATURE2",
            Metric::UvA => "UVA",
            Metric::UvB => "UVB",
            Metric::UvIndex => "UVI",
            Metric::Tvoc => "TVOC",
            Metric::Co2 => "CO2",
            Metric::Pressure => "PRESSURE",
            Metric::BarometricPressure => "BAROMETRIC PRESSURE",
            Metric::SeaLevelPressure => "SEA LEVEL PRESSURE",
            Metric::OverIcePressure => "OVER ICE PRESSURE",
            Metric::OverWaterPressure => "OVER WATER PRESSURE",
            Metric::RelativeHumidity => "RELATIVE HUMIDITY",
            Metric::AbsoluteHumidity => "ABSOLUTE HUMIDITY",
            Metric::VapourPressure => "VAPOUR PRESSURE",
            Metric::CalculatedAltitude => "CALCULATED ALTITUDE",
            Metric::ActualAltitude => "ACTUAL ALTITUDE",
            Metric::HeatIndex => "HEAT INDEX",
            Metric::DewPoint => "DEW POINT",
            Metric::WindGust => "WIND GUST",
            Metric::WindAverage => "WIND AVERAGE",
            Metric::WindDirection => "WIND DIRECTION",
            Metric::Precipitation => "PRECIPITATION",
        }
    }

    pub fn unit(self) -> Unit {
        match self {
            Metric::Temperature1
            | Metric::Temperature2
            | Metric::HeatIndex
            | Metric::DewPoint => Unit::DegreesCelsius,
            Metric::UvA | Metric::UvB | Metric::UvIndex => Unit::Dimensionless,
            Metric::Tvoc => Unit::PartsPerBillion,
            Metric::Co2 => Unit::PartsPerMillion,
            Metric::Pressure
            | Metric::BarometricPressure
            | Metric::SeaLevelPressure
            | Metric::OverIcePressure
            | Metric::OverWaterPressure
            | Metric::VapourPressure => Unit::HectoPascal,
            Metric::RelativeHumidity => Unit::Percentage,
            Metric::AbsoluteHumidity => Unit::GramsPerCubicMeter,
            Metric::CalculatedAltitude | Metric::ActualAltitude => Unit::Meters,
            Metric::WindGust | Metric::WindAverage => Unit::KmPerHour,
            Metric::WindDirection => Unit::Degrees,
            Metric::Precipitation => Unit::Millimeter,
        }
    }

    fn bit(self) -> u32 {
        1 << (self as u32)
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One completed sampling pass. Every field stays at zero unless the owning
/// driver wrote it.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherObservation {
    pub timestamp: OffsetDateTime,
    pub temperature1: f64,
    pub temperature2: f64,
    pub uv_a: f64,
    pub uv_b: f64,
    pub uv_index: f64,
    pub tvoc: f64,
    pub co2: f64,
    pub pressure: f64,
    pub barometric_pressure: f64,
    pub sea_level_pressure: f64,
    pub over_ice_pressure: f64,
    pub over_water_pressure: f64,
    pub relative_humidity: f64,
    pub absolute_humidity: f64,
    pub vapour_pressure: f64,
    pub calculated_altitude: f64,
    pub actual_altitude: f64,
    pub heat_index: f64,
    pub dew_point: f64,
    pub wind_gust: f64,
    pub wind_average: f64,
    pub wind_direction: f64,
    pub precipitation: f64,
}

impl WeatherObservation {
    fn empty(timestamp: OffsetDateTime) -> Self {
        WeatherObservation {
            timestamp,
            temperature1: 0.0,
            temperature2: 0.0,
            uv_a: 0.0,
            uv_b: 0.0,
            uv_index: 0.0,
            tvoc: 0.0,
            co2: 0.0,
            pressure: 0.0,
            barometric_pressure: 0.0,
            sea_level_pressure: 0.0,
            over_ice_pressure: 0.0,
            over_water_pressure: 0.0,
            relative_humidity: 0.0,
            absolute_humidity: 0.0,
            vapour_pressure: 0.0,
            calculated_altitude: 0.0,
            actual_altitude: 0.0,
            heat_index: 0.0,
            dew_point: 0.0,
            wind_gust: 0.0,
            wind_average: 0.0,
            wind_direction: 0.0,
            precipitation: 0.0,
        }
    }

    pub fn get(&self, metric: Metric) -> f64 {
        match metric {
            Metric::Temperature1 => self.temperature1,
            Metric::Temperature2 => self.temperature2,
            Metric::UvA => self.uv_a,
            Metric::UvB => self.uv_b,
            Metric::UvIndex => self.uv_index,
            Metric::Tvoc => self.tvoc,
            Metric::Co2 => self.co2,
            Metric::Pressure => self.pressure,
            Metric::BarometricPressure => self.barometric_pressure,
            Metric::SeaLevelPressure => self.sea_level_pressure,
            Metric::OverIcePressure => self.over_ice_pressure,
            Metric::OverWaterPressure => self.over_water_pressure,
            Metric::RelativeHumidity => self.relative_humidity,
            Metric::AbsoluteHumidity => self.absolute_humidity,
            Metric::VapourPressure => self.vapour_pressure,
            Metric::CalculatedAltitude => self.calculated_altitude,
            Metric::ActualAltitude => self.actual_altitude,
            Metric::HeatIndex => self.heat_index,
            Metric::DewPoint => self.dew_point,
            Metric::WindGust => self.wind_gust,
            Metric::WindAverage => self.wind_average,
            Metric::WindDirection => self.wind_direction,
            Metric::Precipitation => self.precipitation,
        }
    }

    fn slot(&mut self, metric: Metric) -> &mut f64 {
        match metric {
            Metric::Temperature1 => &mut self.temperature1,
            Metric::Temperature2 => &mut self.temperature2,
            Metric::UvA => &mut self.uv_a,
            Metric::UvB => &mut self.uv_b,
            Metric::UvIndex => &mut self.uv_index,
            Metric::Tvoc => &mut self.tvoc,
            Metric::Co2 => &mut self.co2,
            Metric::Pressure => &mut self.pressure,
            Metric::BarometricPressure => &mut self.barometric_pressure,
            Metric::SeaLevelPressure => &mut self.sea_level_pressure,
            Metric::OverIcePressure => &mut self.over_ice_pressure,
            Metric::OverWaterPressure => &mut self.over_water_pressure,
            Metric::RelativeHumidity => &mut self.relative_humidity,
            Metric::AbsoluteHumidity => &mut self.absolute_humidity,
            Metric::VapourPressure => &mut self.vapour_pressure,
            Metric::CalculatedAltitude => &mut self.calculated_altitude,
            Metric::ActualAltitude => &mut self.actual_altitude,
            Metric::HeatIndex => &mut self.heat_index,
            Metric::DewPoint => &mut self.dew_point,
            Metric::WindGust => &mut self.wind_gust,
            Metric::WindAverage => &mut self.wind_average,
            Metric::WindDirection => &mut self.wind_direction,
            Metric::Precipitation => &mut self.precipitation,
        }
    }
}

/// Collects driver output during a pass. Each metric accepts exactly one write.
#[derive(Debug)]
pub struct ObservationBuilder {
    observation: WeatherObservation,
    written: u32,
}

impl ObservationBuilder {
    pub fn new() -> Self {
        Self::at(OffsetDateTime::now_utc())
    }

    pub fn at(timestamp: OffsetDateTime) -> Self {
        ObservationBuilder {
            observation: WeatherObservation::empty(timestamp),
            written: 0,
        }
    }

    pub fn set(&mut self, metric: Metric, value: f64) -> Result<(), ObservationError> {
        if self.is_written(metric) {
            return Err(ObservationError::AlreadyWritten(metric));
        }
        *self.observation.slot(metric) = value;
        self.written |= metric.bit();
        Ok(())
    }

    pub fn is_written(&self, metric: Metric) -> bool {
        self.written & metric.bit() != 0
    }

    pub fn build(self) -> WeatherObservation {
        self.observation
    }
}

impl Default for ObservationBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// RAW readings are pre-calibration register values, CALIBRATED ones are final.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadingKind {
    Raw,
    Calibrated,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub name: String,
    pub value: f64,
    pub unit: Unit,
    pub kind: ReadingKind,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} {}", self.name, self.value, self.unit.symbol())
    }
}

/// What one driver produced during one pass: diagnostics for the log, readings
/// for display, and the observation fields it wants to write.
#[derive(Debug, Clone)]
pub struct SensorSample {
    pub sensor: &'static str,
    pub diagnostics: Vec<String>,
    pub readings: Vec<Reading>,
    writes: Vec<(Metric, f64)>,
}

impl SensorSample {
    pub fn new(sensor: &'static str) -> Self {
        SensorSample {
            sensor,
            diagnostics: Vec::new(),
            readings: Vec::new(),
            writes: Vec::new(),
        }
    }

    pub fn add_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics.push(message.into());
    }

    pub fn add_raw(&mut self, name: &str, value: f64, unit: Unit) {
        self.readings.push(Reading {
            name: name.to_string(),
            value,
            unit,
            kind: ReadingKind::Raw,
        });
    }

    pub fn add_calibrated(&mut self, name: &str, value: f64, unit: Unit) {
        self.readings.push(Reading {
            name: name.to_string(),
            value,
            unit,
            kind: ReadingKind::Calibrated,
        });
    }

    /// Add a calibrated reading and stage it for the observation.
    pub fn record(&mut self, metric: Metric, value: f64) {
        self.add_calibrated(metric.label(), value, metric.unit());
        self.writes.push((metric, value));
    }

    pub fn writes(&self) -> &[(Metric, f64)] {
        &self.writes
    }
}

/// Averaged observations ready for the database, one row per publish window.
#[derive(Debug, Clone)]
pub struct ObservationSummary {
    pub temperature1: f64,
    pub temperature2: f64,
    pub relative_humidity: f64,
    pub barometric_pressure: f64,
    pub co2: f64,
    pub tvoc: f64,
    pub wind_gust: f64,
    pub wind_average: f64,
    pub precipitation: f64,
    pub time: OffsetDateTime,
    pub samples: i32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metric_table_covers_every_field_once() {
        let mut builder = ObservationBuilder::new();
        for (i, metric) in Metric::ALL.iter().enumerate() {
            builder.set(*metric, i as f64 + 0.5).unwrap();
        }
        let observation = builder.build();
        for (i, metric) in Metric::ALL.iter().enumerate() {
            assert_eq!(observation.get(*metric), i as f64 + 0.5, "{metric}");
        }
    }

    #[test]
    fn second_write_is_rejected_and_keeps_first_value() {
        let mut builder = ObservationBuilder::new();
        builder.set(Metric::Co2, 412.0).unwrap();
        assert_eq!(
            builder.set(Metric::Co2, 999.0),
            Err(ObservationError::AlreadyWritten(Metric::Co2))
        );
        assert_eq!(builder.build().co2, 412.0);
    }

    #[test]
    fn unwritten_fields_default_to_zero() {
        let mut builder = ObservationBuilder::new();
        builder.set(Metric::Precipitation, 0.2794).unwrap();
        let observation = builder.build();
        assert_eq!(observation.precipitation, 0.2794);
        assert_eq!(observation.temperature1, 0.0);
        assert_eq!(observation.wind_direction, 0.0);
    }

    #[test]
    fn record_stages_write_and_calibrated_reading() {
        let mut sample = SensorSample::new("test");
        sample.add_raw("RAW TEMPERATURE", 519888.0, Unit::DegreesCelsius);
        sample.record(Metric::Temperature1, 21.5);

        assert_eq!(sample.writes(), &[(Metric::Temperature1, 21.5)]);
        assert_eq!(sample.readings.len(), 2);
        assert_eq!(sample.readings[0].kind, ReadingKind::Raw);
        assert_eq!(sample.readings[1].kind, ReadingKind::Calibrated);
        assert_eq!(sample.readings[1].to_string(), "TEMPERATURE: 21.5 °C");
    }
}
