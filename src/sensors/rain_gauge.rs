/// Tipping bucket rain gauge
use std::sync::Arc;

use crate::error::SensorError;
use crate::logging::EventLogger;
use crate::models::{Metric, SensorSample};
use crate::sensors::pulse::PulseCounter;
use crate::sensors::Sensor;

/// Millimetres of rain per bucket tip
pub const BUCKET_SIZE_MM: f64 = 0.2794;

const NAME: &str = "RainGauge";
const METRICS: &[Metric] = &[Metric::Precipitation];

pub struct RainGauge {
    pin: u32,
    tips: Arc<PulseCounter>,
}

impl RainGauge {
    pub fn new(pin: u32) -> Self {
        RainGauge {
            pin,
            tips: Arc::new(PulseCounter::new()),
        }
    }

    /// Counter to move into the actor fed by the gauge's GPIO line
    pub fn edge_handler(&self) -> Arc<PulseCounter> {
        Arc::clone(&self.tips)
    }
}

impl Sensor for RainGauge {
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
        let count = self.tips.get_and_reset();
        logger.notify_message(&format!("Tick Count: {}", count), NAME);

        sample.record(Metric::Precipitation, count as f64 * BUCKET_SIZE_MM);
        Ok(sample)
    }

    fn describe(&self) -> String {
        format!("Rain gauge on GPIO line {} (falling edge)", self.pin)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::recording::RecordingLogger;
    use crate::sensors::pulse::EdgeHandler;
    use std::time::Instant;

    #[test]
    fn tips_convert_to_millimetres_and_reset() {
        let mut gauge = RainGauge::new(6);
        let mut handler = gauge.edge_handler();
        let logger = RecordingLogger::default();

        for _ in 0..4 {
            handler.on_edge(Instant::now());
        }

        let sample = gauge.take_reading(&logger).unwrap();
        let (metric, mm) = sample.writes()[0];
        assert_eq!(metric, Metric::Precipitation);
        assert!((mm - 1.1176).abs() < 1e-9);

        let dry = gauge.take_reading(&logger).unwrap();
        assert_eq!(dry.writes()[0].1, 0.0);
    }
}
