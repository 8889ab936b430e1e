/// Reed switch anemometer: average wind speed per pass and the strongest gust
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::SensorError;
use crate::logging::EventLogger;
use crate::models::{Metric, SensorSample};
use crate::sensors::pulse::{EdgeHandler, PulseCounter};
use crate::sensors::Sensor;

const CIRCUMFERENCE_KM: f64 = 9.0 / 1000.0;
const CALIBRATION: f64 = 2.36;
const GUST_WINDOW: Duration = Duration::from_secs(5);
// Two reed closures per rotation
const PULSES_PER_ROTATION: f64 = 2.0;

/// Stored in [`GustMax`] while no gust window has closed since the last read
pub const NO_GUST: f64 = -1.0;

const NAME: &str = "Anemometer";
const METRICS: &[Metric] = &[Metric::WindGust, Metric::WindAverage];

/// Speed in km/h for `pulses` counted over `seconds`. Zero for an empty interval.
pub fn wind_speed(pulses: u64, seconds: f64) -> f64 {
    if seconds <= 0.0 {
        return 0.0;
    }
    let rotations = pulses as f64 / PULSES_PER_ROTATION;
    let distance = CIRCUMFERENCE_KM * rotations / seconds;
    distance * 3600.0 * CALIBRATION
}

/// Running maximum of gust candidates, raised by the counter actor and taken
/// by the sampling loop. Holds the bits of an `f64`.
#[derive(Debug)]
pub struct GustMax {
    bits: AtomicU64,
}

impl GustMax {
    pub fn new() -> Self {
        GustMax {
            bits: AtomicU64::new(NO_GUST.to_bits()),
        }
    }

    /// Keep `candidate` if it beats the current maximum
    pub fn offer(&self, candidate: f64) {
        let mut current = self.bits.load(Ordering::Acquire);
        while candidate > f64::from_bits(current) {
            match self.bits.compare_exchange_weak(
                current,
                candidate.to_bits(),
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(actual) => current = actual,
            }
        }
    }

    /// Current maximum, resetting to [`NO_GUST`]
    pub fn take(&self) -> f64 {
        f64::from_bits(self.bits.swap(NO_GUST.to_bits(), Ordering::AcqRel))
    }
}

impl Default for GustMax {
    fn default() -> Self {
        Self::new()
    }
}

/// Runs inside the anemometer's counter actor. Every pulse feeds the pass
/// counter; pulses are also grouped into gust windows of at least five
/// seconds, and each closed window offers its speed to the gust maximum.
pub struct WindEdgeHandler {
    counter: Arc<PulseCounter>,
    gust: Arc<GustMax>,
    window_start: Instant,
    window_pulses: u64,
}

impl EdgeHandler for WindEdgeHandler {
    fn on_edge(&mut self, at: Instant) {
        self.counter.increment();
        self.window_pulses += 1;

        let elapsed = at.saturating_duration_since(self.window_start);
        if elapsed >= GUST_WINDOW {
            self.gust
                .offer(wind_speed(self.window_pulses, elapsed.as_secs_f64()));
            self.window_start = at;
            self.window_pulses = 0;
        }
    }
}

pub struct Anemometer {
    pin: u32,
    counter: Arc<PulseCounter>,
    gust: Arc<GustMax>,
    started: Instant,
    last_read: Instant,
}

impl Anemometer {
    pub fn new(pin: u32) -> Self {
        Self::started_at(pin, Instant::now())
    }

    pub fn started_at(pin: u32, started: Instant) -> Self {
        Anemometer {
            pin,
            counter: Arc::new(PulseCounter::new()),
            gust: Arc::new(GustMax::new()),
            started,
            last_read: started,
        }
    }

    /// Handler to move into the counter actor fed by the anemometer's GPIO line
    pub fn edge_handler(&self) -> WindEdgeHandler {
        WindEdgeHandler {
            counter: Arc::clone(&self.counter),
            gust: Arc::clone(&self.gust),
            window_start: self.started,
            window_pulses: 0,
        }
    }

    /// Drain the counters as of `now`
    pub fn take_reading_at(&mut self, now: Instant, logger: &dyn EventLogger) -> SensorSample {
        let mut sample = SensorSample::new(NAME);

        let elapsed = now.saturating_duration_since(self.last_read).as_secs_f64();
        let count = self.counter.get_and_reset();
        logger.notify_message(&format!("Elapsed: {}", elapsed), NAME);
        logger.notify_message(&format!("Tick Count: {}", count), NAME);
        sample.add_diagnostic(format!("elapsed {:.3} s, {} pulses", elapsed, count));

        let average = wind_speed(count, elapsed);
        let gust = self.gust.take();
        // Sentinel means no gust window closed since the last read
        let gust = if gust == NO_GUST { average } else { gust };

        sample.record(Metric::WindGust, gust);
        sample.record(Metric::WindAverage, average);

        self.last_read = now;
        sample
    }
}

impl Sensor for Anemometer {
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
        Ok(self.take_reading_at(Instant::now(), logger))
    }

    fn describe(&self) -> String {
        format!("Anemometer on GPIO line {} (rising edge)", self.pin)
    }
}
