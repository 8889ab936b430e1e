/// The sampling coordinator: one pass at a time over every registered driver and sink
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};

use log::{debug, info, warn};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::error::{ObservationError, SensorError};
use crate::logging::{EventLogger, SYSTEM};
use crate::models::{ObservationBuilder, SensorSample, WeatherObservation};
use crate::sensors::Sensor;
use crate::sinks::ObservationSink;
use crate::utils::format_datetime;

// Delay before the first scheduled pass
const FIRST_PASS_DELAY_SECS: u64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    /// `initialize` has not succeeded yet and is attempted on the next pass
    Uninitialized,
    Ready,
    /// A protocol error took the driver out of every later pass
    Disabled,
}

/// Result of one attempt to run a pass
#[derive(Debug)]
pub enum PassOutcome {
    Completed(WeatherObservation),
    /// Another pass was still in flight; nothing was read or delivered
    Skipped,
}

struct Driver {
    sensor: Box<dyn Sensor>,
    status: DriverStatus,
}

#[derive(Default)]
struct Registry {
    drivers: Vec<Driver>,
    sinks: Vec<Box<dyn ObservationSink>>,
}

/// Owns the drivers and sinks. Holding the registry lock is what "a pass is
/// in flight" means; `try_pass` never waits for it.
pub struct WeatherStation {
    registry: Mutex<Registry>,
    logger: Arc<dyn EventLogger>,
}

impl WeatherStation {
    pub fn new(logger: Arc<dyn EventLogger>) -> Self {
        WeatherStation {
            registry: Mutex::new(Registry::default()),
            logger,
        }
    }

    /// Drivers are read in the order they are added
    pub fn add_sensor(&mut self, sensor: Box<dyn Sensor>) {
        info!("Registered sensor: {}", sensor.describe());
        self.registry_mut().drivers.push(Driver {
            sensor,
            status: DriverStatus::Uninitialized,
        });
    }

    /// Sinks receive each observation in the order they are added
    pub fn add_sink(&mut self, sink: Box<dyn ObservationSink>) {
        info!("Registered observation sink: {}", sink.name());
        self.registry_mut().sinks.push(sink);
    }

    pub fn sensor_count(&self) -> usize {
        self.lock_registry().drivers.len()
    }

    /// Status of every driver by name, in registration order
    #[cfg(test)]
    pub fn driver_statuses(&self) -> Vec<(&'static str, DriverStatus)> {
        self.lock_registry()
            .drivers
            .iter()
            .map(|d| (d.sensor.name(), d.status))
            .collect()
    }

    /// Run one full pass unless one is already running
    ///
    /// Blocking: performs bus transactions on the calling thread. Every driver
    /// and sink failure, panics included, is reported through the logger and
    /// contained to that driver or sink.
    ///
    /// # Returns
    /// The completed observation, or `Skipped` when another pass holds the station
    pub fn try_pass(&self) -> PassOutcome {
        let mut registry = match self.registry.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => return PassOutcome::Skipped,
            Err(TryLockError::Poisoned(poisoned)) => {
                warn!("Recovering station state after a panic in an earlier pass");
                poisoned.into_inner()
            }
        };
        let Registry { drivers, sinks } = &mut *registry;
        let logger = self.logger.as_ref();

        logger.notify_start(SYSTEM);
        let mut builder = ObservationBuilder::new();

        for driver in drivers.iter_mut() {
            self.run_driver(driver, &mut builder);
        }

        let observation = builder.build();
        for sink in sinks.iter_mut() {
            let delivered = catch_unwind(AssertUnwindSafe(|| sink.record(&observation)));
            match delivered {
                Ok(Ok(())) => {}
                Ok(Err(e)) => logger.notify_error(&format!("sink failed: {}", e), sink.name()),
                Err(panic) => logger.notify_error(
                    &format!("sink panicked: {}", panic_message(panic.as_ref())),
                    sink.name(),
                ),
            }
        }

        logger.notify_success(SYSTEM);
        PassOutcome::Completed(observation)
    }

    /// Schedule passes every `period` until the task is dropped. Each tick
    /// runs on the blocking pool; ticks that arrive while a pass is still in
    /// flight are dropped, never queued.
    pub async fn run(self: Arc<Self>, period: Duration) {
        let mut ticker = interval_at(
            Instant::now() + Duration::from_secs(FIRST_PASS_DELAY_SECS),
            period,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        info!(
            "Sampling {} sensors every {} seconds",
            self.sensor_count(),
            period.as_secs()
        );

        loop {
            ticker.tick().await;
            let station = Arc::clone(&self);
            tokio::task::spawn_blocking(move || match station.try_pass() {
                PassOutcome::Completed(observation) => debug!(
                    "Pass completed for observation at {}",
                    format_datetime(&observation.timestamp)
                ),
                PassOutcome::Skipped => debug!("Previous pass still running, tick skipped"),
            });
        }
    }

    fn run_driver(&self, driver: &mut Driver, builder: &mut ObservationBuilder) {
        let logger = self.logger.as_ref();
        let name = driver.sensor.name();

        match driver.status {
            DriverStatus::Disabled => return,
            DriverStatus::Ready => {}
            DriverStatus::Uninitialized => {
                let sensor = &mut driver.sensor;
                match catch_unwind(AssertUnwindSafe(|| sensor.initialize(logger))) {
                    Ok(Ok(())) => driver.status = DriverStatus::Ready,
                    Ok(Err(e)) => {
                        self.report_failure(driver, "initialization failed", &e);
                        return;
                    }
                    Err(panic) => {
                        logger.notify_error(
                            &format!("initialization panicked: {}", panic_message(panic.as_ref())),
                            name,
                        );
                        return;
                    }
                }
            }
        }

        let sensor = &mut driver.sensor;
        match catch_unwind(AssertUnwindSafe(|| sensor.take_reading(logger))) {
            Ok(Ok(sample)) => {
                logger.notify_observation(&sample);
                self.merge(&*driver.sensor, &sample, builder);
            }
            Ok(Err(e)) => self.report_failure(driver, "reading failed", &e),
            Err(panic) => logger.notify_error(
                &format!("reading panicked: {}", panic_message(panic.as_ref())),
                name,
            ),
        }
    }

    fn report_failure(&self, driver: &mut Driver, stage: &str, error: &SensorError) {
        let name = driver.sensor.name();
        self.logger
            .notify_error(&format!("{}: {}", stage, error), name);

        if error.disables_driver() {
            driver.status = DriverStatus::Disabled;
            self.logger
                .notify_warning("driver disabled for the rest of the run", name);
        }
    }

    /// Copy the sample's staged values into the observation. Values for
    /// metrics the driver does not own, or that were already written this
    /// pass, are dropped and reported.
    fn merge(&self, sensor: &dyn Sensor, sample: &SensorSample, builder: &mut ObservationBuilder) {
        let owned = sensor.metrics();

        for &(metric, value) in sample.writes() {
            let result = if owned.contains(&metric) {
                builder.set(metric, value)
            } else {
                Err(ObservationError::NotOwned {
                    sensor: sensor.name(),
                    metric,
                })
            };

            if let Err(e) = result {
                self.logger.notify_error(&e.to_string(), sensor.name());
            }
        }
    }

    fn registry_mut(&mut self) -> &mut Registry {
        self.registry
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn lock_registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
