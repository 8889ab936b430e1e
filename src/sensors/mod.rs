pub mod anemometer;
pub mod bme280;
pub mod ccs811;
pub mod ds18b20;
pub mod mcp3008;
pub mod pulse;
pub mod rain_gauge;
pub mod veml6075;
pub mod windvane;

use crate::error::SensorError;
use crate::logging::EventLogger;
use crate::models::{Metric, SensorSample};

pub use anemometer::Anemometer;
pub use bme280::Bme280;
pub use ccs811::Ccs811;
pub use ds18b20::Ds18b20;
pub use rain_gauge::RainGauge;
pub use veml6075::Veml6075;
pub use windvane::Windvane;

/// A driver the sampling loop can poll.
///
/// `initialize` runs once before the first reading. `take_reading` returns a
/// sample whose recorded metrics the loop copies into the pass observation;
/// a driver may only record the metrics listed by `metrics`.
pub trait Sensor: Send {
    fn name(&self) -> &'static str;

    /// Observation fields this driver owns
    fn metrics(&self) -> &'static [Metric];

    fn initialize(&mut self, logger: &dyn EventLogger) -> Result<(), SensorError>;

    fn take_reading(&mut self, logger: &dyn EventLogger) -> Result<SensorSample, SensorError>;

    /// Human readable description of the hardware binding
    fn describe(&self) -> String;
}
