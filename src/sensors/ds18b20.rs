/// Maxim DS18B20 temperature probe read through the kernel 1-wire sysfs interface
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::SensorError;
use crate::logging::EventLogger;
use crate::models::{Metric, SensorSample};
use crate::sensors::Sensor;

// 1-wire family code of the DS18B20
const FAMILY_PREFIX: &str = "28";
const SLAVE_FILE: &str = "w1_slave";
const ATTEMPTS: usize = 3;

const NAME: &str = "DS18B20";
const METRICS: &[Metric] = &[Metric::Temperature2];

/// Temperature in °C from a `w1_slave` report, e.g.
///
/// ```text
/// 72 01 4b 46 7f ff 0e 10 57 : crc=57 YES
/// 72 01 4b 46 7f ff 0e 10 57 t=23125
/// ```
///
/// # Returns
/// Err with a description when the CRC line does not say `YES` or the value is missing
pub fn parse_report(report: &str) -> Result<f64, String> {
    let mut lines = report.lines();
    let crc_line = lines.next().unwrap_or_default();
    if !crc_line.contains("YES") {
        return Err(format!("CRC check failed: {}", crc_line.trim()));
    }

    let data_line = lines.next().unwrap_or_default();
    let millidegrees = data_line
        .rsplit_once("t=")
        .map(|(_, value)| value.trim())
        .ok_or_else(|| format!("no temperature in {}", data_line.trim()))?;

    millidegrees
        .parse::<f64>()
        .map(|value| value / 1000.0)
        .map_err(|e| format!("invalid temperature {:?}: {}", millidegrees, e))
}

pub struct Ds18b20 {
    devices_dir: PathBuf,
    slave_file: Option<PathBuf>,
}

impl Ds18b20 {
    pub fn new(devices_dir: impl Into<PathBuf>) -> Self {
        Ds18b20 {
            devices_dir: devices_dir.into(),
            slave_file: None,
        }
    }

    fn find_device(&self) -> Result<Option<PathBuf>, SensorError> {
        let io_error = |source| SensorError::Io {
            sensor: NAME,
            source,
        };

        let mut candidates = Vec::new();
        for entry in fs::read_dir(&self.devices_dir).map_err(io_error)? {
            let entry = entry.map_err(io_error)?;
            if entry.file_name().to_string_lossy().starts_with(FAMILY_PREFIX) {
                candidates.push(entry.path());
            }
        }
        candidates.sort();

        Ok(candidates.into_iter().next().map(|dir| dir.join(SLAVE_FILE)))
    }

    fn read_report(path: &Path) -> Result<String, SensorError> {
        fs::read_to_string(path).map_err(|source| SensorError::Io {
            sensor: NAME,
            source,
        })
    }
}

impl Sensor for Ds18b20 {
    fn name(&self) -> &'static str {
        NAME
    }

    fn metrics(&self) -> &'static [Metric] {
        METRICS
    }

    fn initialize(&mut self, logger: &dyn EventLogger) -> Result<(), SensorError> {
        logger.notify_start(NAME);

        let slave_file = self.find_device()?.ok_or_else(|| SensorError::Protocol {
            sensor: NAME,
            details: format!("no 1-wire device found in {}", self.devices_dir.display()),
        })?;
        logger.notify_message(&format!("Using {}", slave_file.display()), NAME);
        self.slave_file = Some(slave_file);

        logger.notify_success(NAME);
        Ok(())
    }

    fn take_reading(&mut self, logger: &dyn EventLogger) -> Result<SensorSample, SensorError> {
        let path = self.slave_file.as_deref().ok_or(SensorError::Unavailable {
            sensor: NAME,
            details: "device not initialized".to_string(),
        })?;

        let mut last_failure = String::new();
        for attempt in 1..=ATTEMPTS {
            let report = Self::read_report(path)?;
            match parse_report(&report) {
                Ok(temperature) => {
                    let mut sample = SensorSample::new(NAME);
                    for line in report.lines() {
                        sample.add_diagnostic(line);
                    }
                    sample.record(Metric::Temperature2, temperature);
                    return Ok(sample);
                }
                Err(reason) => {
                    logger.notify_warning(&format!("attempt {}: {}", attempt, reason), NAME);
                    last_failure = reason;
                }
            }
        }

        Err(SensorError::Unavailable {
            sensor: NAME,
            details: format!("no valid reading after {} attempts: {}", ATTEMPTS, last_failure),
        })
    }

    fn describe(&self) -> String {
        match &self.slave_file {
            Some(path) => format!("DS18B20 at {}", path.display()),
            None => format!("DS18B20 under {}", self.devices_dir.display()),
        }
    }
}
