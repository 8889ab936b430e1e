/// Event notifications emitted by the drivers and the sampling loop
use log::{debug, error, info, warn};

use crate::models::{ReadingKind, SensorSample};

const START: &str = "BEG";
const SUCCESS: &str = "SUC";
const WARNING: &str = "WRN";
const ERROR: &str = "ERR";
const MESSAGE: &str = "MSG";
const OBSERVATION: &str = "OBS";
const DIAGNOSTICS: &str = "DGN";

/// Component name used for notifications from the sampling loop itself
pub const SYSTEM: &str = "SYS";

/// Sink for lifecycle and diagnostic notifications, keyed by component name.
///
/// Implementations must never fail or panic; a broken logger cannot be
/// allowed to take a sampling pass down with it.
pub trait EventLogger: Send + Sync {
    fn notify_start(&self, component: &str);
    fn notify_success(&self, component: &str);
    fn notify_error(&self, message: &str, component: &str);
    fn notify_warning(&self, message: &str, component: &str);
    fn notify_message(&self, message: &str, component: &str);
    fn notify_observation(&self, sample: &SensorSample);
}

/// Routes notifications to the `log` facade, configured by env_logger in main
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleEventLogger;

impl EventLogger for ConsoleEventLogger {
    fn notify_start(&self, component: &str) {
        info!("{}\t{}: starting", START, component);
    }

    fn notify_success(&self, component: &str) {
        info!("{}\t{}: done", SUCCESS, component);
    }

    fn notify_error(&self, message: &str, component: &str) {
        error!("{}\t{}: {}", ERROR, component, message);
    }

    fn notify_warning(&self, message: &str, component: &str) {
        warn!("{}\t{}: {}", WARNING, component, message);
    }

    fn notify_message(&self, message: &str, component: &str) {
        debug!("{}\t{}: {}", MESSAGE, component, message);
    }

    fn notify_observation(&self, sample: &SensorSample) {
        for diagnostic in &sample.diagnostics {
            debug!("{}\t{}: {}", DIAGNOSTICS, sample.sensor, diagnostic);
        }

        for reading in &sample.readings {
            match reading.kind {
                ReadingKind::Raw => debug!("{}\t{}: {}", OBSERVATION, sample.sensor, reading),
                ReadingKind::Calibrated => info!("{}\t{}: {}", OBSERVATION, sample.sensor, reading),
            }
        }
    }
}
