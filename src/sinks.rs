/// Consumers of completed observations
use log::info;

use crate::error::SinkError;
use crate::models::{Metric, WeatherObservation};
use crate::utils::format_datetime;

/// Receives every completed observation, in registration order. Implementations
/// may batch or forward elsewhere but must return promptly.
pub trait ObservationSink: Send {
    fn name(&self) -> &'static str;

    fn record(&mut self, observation: &WeatherObservation) -> Result<(), SinkError>;
}

/// Writes each observation to the log, one metric per line
#[derive(Debug, Default)]
pub struct LogSink;

impl ObservationSink for LogSink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn record(&mut self, observation: &WeatherObservation) -> Result<(), SinkError> {
        info!("Observation at {}:", format_datetime(&observation.timestamp));
        for metric in Metric::ALL {
            info!(
                "  {}: {:.2} {}",
                metric.label(),
                observation.get(metric),
                metric.unit().symbol()
            );
        }
        Ok(())
    }
}
