/// ams CCS811 metal-oxide air quality sensor (eCO2 and TVOC) on I2C
use std::fmt;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::bus::{DeviceRegistry, ReadMode, RegisterChannel};
use crate::error::SensorError;
use crate::logging::EventLogger;
use crate::models::{Metric, SensorSample};
use crate::sensors::Sensor;
use crate::utils::print_byte_array;

pub const DEFAULT_ADDRESS: u8 = 0x5B;
const HARDWARE_ID: u8 = 0x81;

const REG_STATUS: u8 = 0x00;
const REG_MEAS_MODE: u8 = 0x01;
const REG_ALG_RESULT_DATA: u8 = 0x02;
const REG_BASELINE: u8 = 0x11;
const REG_HW_ID: u8 = 0x20;
const REG_ERROR_ID: u8 = 0xE0;
const REG_APP_START: u8 = 0xF4;
const REG_SW_RESET: u8 = 0xFF;

const RESET_SEQUENCE: [u8; 4] = [0x11, 0xE5, 0x72, 0x8A];
// Constant power mode, one measurement per second
const MEAS_MODE_1S: u8 = 0x10;
const STATUS_ERROR: u8 = 0x01;

const RESET_DELAY_MS: u32 = 100;
const APP_START_DELAY_MS: u32 = 100;
const FIRST_RESULT_DELAY_MS: u32 = 1500;
const WARMUP_DELAY_MS: u32 = 5000;

const NAME: &str = "CCS811";
const METRICS: &[Metric] = &[Metric::Co2, Metric::Tvoc];

/// Fault reported in the `ERROR_ID` register
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fault {
    HeaterSupply,
    HeaterFault,
    MaxResistance,
    MeasModeInvalid,
    ReadRegInvalid,
    MsgInvalid,
    Unknown,
}

impl Fault {
    /// Most severe fault flagged in `error_id`
    pub fn decode(error_id: u8) -> Self {
        const BITS: [(u8, Fault); 6] = [
            (5, Fault::HeaterSupply),
            (4, Fault::HeaterFault),
            (3, Fault::MaxResistance),
            (2, Fault::MeasModeInvalid),
            (1, Fault::ReadRegInvalid),
            (0, Fault::MsgInvalid),
        ];

        BITS.iter()
            .find(|(bit, _)| error_id & (1 << bit) != 0)
            .map(|(_, fault)| *fault)
            .unwrap_or(Fault::Unknown)
    }
}

impl fmt::Display for Fault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

pub struct Ccs811<B, D> {
    channel: RegisterChannel<B>,
    delay: D,
    warmup_reads: u32,
}

impl<B: I2c, D: DelayNs> Ccs811<B, D> {
    /// # Arguments
    /// * `warmup_reads` - Results read and discarded at the end of initialization
    pub fn new(registry: &mut DeviceRegistry<B>, address: u8, delay: D, warmup_reads: u32) -> Self {
        Ccs811 {
            channel: registry.register(address),
            delay,
            warmup_reads,
        }
    }

    fn read(&self, register: u8, length: usize) -> Result<Vec<u8>, SensorError> {
        Ok(self.channel.read(register, length, ReadMode::Raw)?)
    }

    /// Log a decoded fault if the status register flags one. Faults are
    /// reported but do not fail the caller.
    fn check_status(&self, stage: &str, logger: &dyn EventLogger) -> Result<u8, SensorError> {
        let status = self.channel.read_byte(REG_STATUS, ReadMode::Raw)?;
        if status & STATUS_ERROR != 0 {
            let error_id = self.channel.read_byte(REG_ERROR_ID, ReadMode::Raw)?;
            logger.notify_error(
                &format!(
                    "{} status {:#04x}: ERROR: {} [{:#04x}]",
                    stage,
                    status,
                    Fault::decode(error_id),
                    error_id
                ),
                NAME,
            );
        }
        logger.notify_message(&format!("Status {:#04x} after {}", status, stage), NAME);
        Ok(status)
    }
}

impl<B, D> Sensor for Ccs811<B, D>
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

        self.channel.write(REG_SW_RESET, &RESET_SEQUENCE)?;
        self.delay.delay_ms(RESET_DELAY_MS);

        let hw_id = self.channel.read_byte(REG_HW_ID, ReadMode::Raw)?;
        if hw_id != HARDWARE_ID {
            return Err(SensorError::Protocol {
                sensor: NAME,
                details: format!("incorrect hardware id {:#04x}, expected {:#04x}", hw_id, HARDWARE_ID),
            });
        }
        self.check_status("Init", logger)?;

        self.channel.write(REG_APP_START, &[])?;
        self.delay.delay_ms(APP_START_DELAY_MS);
        self.check_status("Start", logger)?;

        self.channel.write_byte(REG_MEAS_MODE, MEAS_MODE_1S)?;
        self.check_status("MEAS", logger)?;

        self.delay.delay_ms(FIRST_RESULT_DELAY_MS);
        let baseline = self.read(REG_BASELINE, 2)?;
        logger.notify_message(
            &format!("Baseline: {}", u16::from_be_bytes([baseline[0], baseline[1]])),
            NAME,
        );

        logger.notify_message("Warm up", NAME);
        for _ in 0..self.warmup_reads {
            let data = self.read(REG_ALG_RESULT_DATA, 4)?;
            logger.notify_message(&format!("RawBytes: {}", print_byte_array(&data)), NAME);
            self.delay.delay_ms(WARMUP_DELAY_MS);
        }
        self.check_status("WARMUP", logger)?;

        logger.notify_success(NAME);
        Ok(())
    }

    fn take_reading(&mut self, _logger: &dyn EventLogger) -> Result<SensorSample, SensorError> {
        let mut sample = SensorSample::new(NAME);

        let data = self.read(REG_ALG_RESULT_DATA, 4)?;
        sample.add_diagnostic(print_byte_array(&data));

        let co2 = u16::from_be_bytes([data[0], data[1]]);
        let tvoc = u16::from_be_bytes([data[2], data[3]]);
        sample.record(Metric::Co2, co2 as f64);
        sample.record(Metric::Tvoc, tvoc as f64);

        Ok(sample)
    }

    fn describe(&self) -> String {
        format!(
            "CCS811 on I2C address {:#04x}, {} warm-up reads",
            self.channel.address(),
            self.warmup_reads
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{MockBus, NoDelay};
    use crate::logging::recording::RecordingLogger;

    fn device(bus: &MockBus, warmup_reads: u32) -> Ccs811<MockBus, NoDelay> {
        bus.set_registers(DEFAULT_ADDRESS, REG_STATUS, &[0x90]);
        bus.set_registers(DEFAULT_ADDRESS, REG_ALG_RESULT_DATA, &[0x01, 0x90, 0x00, 0x2A]);
        bus.set_registers(DEFAULT_ADDRESS, REG_BASELINE, &[0x84, 0x7B]);
        bus.set_registers(DEFAULT_ADDRESS, REG_HW_ID, &[HARDWARE_ID]);

        let mut registry = DeviceRegistry::new(bus.clone());
        Ccs811::new(&mut registry, DEFAULT_ADDRESS, NoDelay, warmup_reads)
    }

    #[test]
    fn fault_decoding_prefers_most_severe_bit() {
        assert_eq!(Fault::decode(0b0010_0000), Fault::HeaterSupply);
        assert_eq!(Fault::decode(0b0001_0100), Fault::HeaterFault);
        assert_eq!(Fault::decode(0b0000_0001), Fault::MsgInvalid);
        assert_eq!(Fault::decode(0b0000_0100), Fault::MeasModeInvalid);
        assert_eq!(Fault::decode(0), Fault::Unknown);
    }

    #[test]
    fn initialize_runs_start_sequence_and_warm_up() {
        let bus = MockBus::default();
        let mut sensor = device(&bus, 3);
        let logger = RecordingLogger::default();

        sensor.initialize(&logger).unwrap();

        let writes = bus.writes();
        assert_eq!(writes[0], (DEFAULT_ADDRESS, vec![REG_SW_RESET, 0x11, 0xE5, 0x72, 0x8A]));
        assert!(writes.contains(&(DEFAULT_ADDRESS, vec![REG_APP_START])));
        assert!(writes.contains(&(DEFAULT_ADDRESS, vec![REG_MEAS_MODE, MEAS_MODE_1S])));

        let warmups = writes
            .iter()
            .filter(|w| **w == (DEFAULT_ADDRESS, vec![REG_ALG_RESULT_DATA]))
            .count();
        assert_eq!(warmups, 3);
        assert!(logger.errors().is_empty());
    }

    #[test]
    fn wrong_hardware_id_is_a_protocol_error() {
        let bus = MockBus::default();
        let mut sensor = device(&bus, 0);
        bus.set_registers(DEFAULT_ADDRESS, REG_HW_ID, &[0x55]);

        let err = sensor.initialize(&RecordingLogger::default()).unwrap_err();
        assert!(matches!(err, SensorError::Protocol { .. }));
    }

    #[test]
    fn status_error_bit_is_reported_with_fault_name() {
        let bus = MockBus::default();
        let mut sensor = device(&bus, 0);
        bus.set_registers(DEFAULT_ADDRESS, REG_STATUS, &[0x91]);
        bus.set_registers(DEFAULT_ADDRESS, REG_ERROR_ID, &[0b0010_0000]);
        let logger = RecordingLogger::default();

        sensor.initialize(&logger).unwrap();

        let errors = logger.errors();
        assert!(!errors.is_empty());
        assert!(errors[0].0.contains("HeaterSupply"));
        assert_eq!(errors[0].1, NAME);
    }

    #[test]
    fn reading_decodes_big_endian_results() {
        let bus = MockBus::default();
        let mut sensor = device(&bus, 0);

        let sample = sensor.take_reading(&RecordingLogger::default()).unwrap();
        assert_eq!(sample.writes(), &[(Metric::Co2, 400.0), (Metric::Tvoc, 42.0)]);
    }
}
