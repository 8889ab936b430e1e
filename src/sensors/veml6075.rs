/// Vishay VEML6075 UVA/UVB light sensor on I2C, driven through its registers
use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::bus::{DeviceRegistry, ReadMode, RegisterChannel};
use crate::error::SensorError;
use crate::logging::EventLogger;
use crate::models::{Metric, SensorSample, Unit};
use crate::sensors::Sensor;

pub const DEFAULT_ADDRESS: u8 = 0x10;

const REG_CONF: u8 = 0x00;
const REG_UVA: u8 = 0x07;
const REG_UVD: u8 = 0x08;
const REG_UVB: u8 = 0x09;
const REG_UVCOMP1: u8 = 0x0A;
const REG_UVCOMP2: u8 = 0x0B;

const INTEGRATION_800MS: u8 = 0b0100_0000;
const DYNAMIC_HIGH: u8 = 0b0000_1000;
const NO_FORCE_TRIGGER: u8 = 0b0000_0000;
const NORMAL_MODE: u8 = 0b0000_0000;
const POWER_ON: u8 = 0b0000_0000;
// The trigger bit reads back as zero
const READBACK_MASK: u8 = 0b1111_1011;
const CONFIG_SETTLE_MS: u32 = 100;

const UVA_VISIBLE_COEF: f64 = 2.22;
const UVA_IR_COEF: f64 = 1.33;
const UVB_VISIBLE_COEF: f64 = 2.95;
const UVB_IR_COEF: f64 = 1.74;
const UVA_RESPONSIVITY: f64 = 0.001461;
const UVB_RESPONSIVITY: f64 = 0.002591;

const NAME: &str = "VEML6075";
const METRICS: &[Metric] = &[Metric::UvA, Metric::UvB, Metric::UvIndex];

/// One set of raw UV counts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UvCounts {
    pub uva: u16,
    pub uvd: u16,
    pub uvb: u16,
    pub comp1: u16,
    pub comp2: u16,
}

impl UvCounts {
    pub fn compensated_uva(&self) -> f64 {
        self.uva as f64 - UVA_VISIBLE_COEF * self.comp1 as f64 - UVA_IR_COEF * self.comp2 as f64
    }

    pub fn compensated_uvb(&self) -> f64 {
        self.uvb as f64 - UVB_VISIBLE_COEF * self.comp1 as f64 - UVB_IR_COEF * self.comp2 as f64
    }

    /// Average of the UVA and UVB indices after dark current removal, never negative
    pub fn uv_index(&self) -> f64 {
        let uvd = self.uvd as f64;
        let comp1 = self.comp1 as f64 - uvd;
        let comp2 = self.comp2 as f64 - uvd;

        let uva = (self.uva as f64 - uvd) - UVA_VISIBLE_COEF * comp1 - UVA_IR_COEF * comp2;
        let uvb = (self.uvb as f64 - uvd) - UVB_VISIBLE_COEF * comp1 - UVB_IR_COEF * comp2;

        ((uvb * UVB_RESPONSIVITY + uva * UVA_RESPONSIVITY) / 2.0).max(0.0)
    }
}

pub fn config_word() -> u8 {
    INTEGRATION_800MS | DYNAMIC_HIGH | NO_FORCE_TRIGGER | NORMAL_MODE | POWER_ON
}

pub struct Veml6075<B, D> {
    channel: RegisterChannel<B>,
    delay: D,
}

impl<B: I2c, D: DelayNs> Veml6075<B, D> {
    pub fn new(registry: &mut DeviceRegistry<B>, address: u8, delay: D) -> Self {
        Veml6075 {
            channel: registry.register(address),
            delay,
        }
    }

    fn read_word(&self, register: u8) -> Result<u16, SensorError> {
        let bytes = self.channel.read(register, 2, ReadMode::Raw)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    fn read_counts(&self) -> Result<UvCounts, SensorError> {
        Ok(UvCounts {
            uva: self.read_word(REG_UVA)?,
            uvd: self.read_word(REG_UVD)?,
            uvb: self.read_word(REG_UVB)?,
            comp1: self.read_word(REG_UVCOMP1)?,
            comp2: self.read_word(REG_UVCOMP2)?,
        })
    }
}

impl<B, D> Sensor for Veml6075<B, D>
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
        logger.notify_message(
            &format!("Device address: {:#04x}", self.channel.address()),
            NAME,
        );

        let config = config_word();
        self.channel.write(REG_CONF, &[config, 0x00])?;
        self.delay.delay_ms(CONFIG_SETTLE_MS);

        let readback = self.read_word(REG_CONF)?;
        logger.notify_message(&format!("Config: {:#06x}", readback), NAME);
        if readback != (config & READBACK_MASK) as u16 {
            return Err(SensorError::Protocol {
                sensor: NAME,
                details: format!(
                    "configuration write failed, wrote {:#04x}, read back {:#06x}",
                    config, readback
                ),
            });
        }

        logger.notify_success(NAME);
        Ok(())
    }

    fn take_reading(&mut self, _logger: &dyn EventLogger) -> Result<SensorSample, SensorError> {
        let mut sample = SensorSample::new(NAME);
        let counts = self.read_counts()?;

        sample.add_raw("RAW UVA", counts.uva as f64, Unit::Dimensionless);
        sample.add_raw("RAW UVB", counts.uvb as f64, Unit::Dimensionless);
        sample.add_diagnostic(format!(
            "uvd {} comp1 {} comp2 {}",
            counts.uvd, counts.comp1, counts.comp2
        ));

        sample.record(Metric::UvA, counts.compensated_uva());
        sample.record(Metric::UvB, counts.compensated_uvb());
        sample.record(Metric::UvIndex, counts.uv_index());
        Ok(sample)
    }

    fn describe(&self) -> String {
        format!("VEML6075 on I2C address {:#04x}", self.channel.address())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::{MockBus, NoDelay};
    use crate::logging::recording::RecordingLogger;

    const DAYLIGHT: UvCounts = UvCounts {
        uva: 1000,
        uvd: 10,
        uvb: 900,
        comp1: 100,
        comp2: 50,
    };

    fn device(bus: &MockBus) -> Veml6075<MockBus, NoDelay> {
        let mut registry = DeviceRegistry::new(bus.clone());
        Veml6075::new(&mut registry, DEFAULT_ADDRESS, NoDelay)
    }

    #[test]
    fn compensation_formulas() {
        assert!((DAYLIGHT.compensated_uva() - 711.5).abs() < 1e-9);
        assert!((DAYLIGHT.compensated_uvb() - 518.0).abs() < 1e-9);
        assert!((DAYLIGHT.uv_index() - 1.25725145).abs() < 1e-9);
    }

    #[test]
    fn uv_index_is_floored_at_zero() {
        let dark = UvCounts {
            uva: 0,
            uvd: 0,
            uvb: 0,
            comp1: 100,
            comp2: 100,
        };
        assert_eq!(dark.uv_index(), 0.0);
    }

    #[test]
    fn initialize_writes_configuration_and_verifies_readback() {
        let bus = MockBus::default();
        let mut sensor = device(&bus);

        sensor.initialize(&RecordingLogger::default()).unwrap();
        assert_eq!(config_word(), 0x48);
        assert_eq!(bus.writes()[0], (DEFAULT_ADDRESS, vec![REG_CONF, 0x48, 0x00]));
    }

    #[test]
    fn failed_configuration_is_a_protocol_error() {
        let bus = MockBus::default();
        // device keeps its power-on configuration
        bus.set_registers(DEFAULT_ADDRESS, REG_CONF, &[0x01, 0x00]);
        bus.set_ignore_writes(true);
        let mut sensor = device(&bus);

        let err = sensor.initialize(&RecordingLogger::default()).unwrap_err();
        assert!(matches!(err, SensorError::Protocol { .. }));
        assert!(err.disables_driver());
    }

    #[test]
    fn reading_decodes_little_endian_words() {
        let bus = MockBus::default();
        bus.set_command(DEFAULT_ADDRESS, REG_UVA, &[0xE8, 0x03]);
        bus.set_command(DEFAULT_ADDRESS, REG_UVD, &[0x0A, 0x00]);
        bus.set_command(DEFAULT_ADDRESS, REG_UVB, &[0x84, 0x03]);
        bus.set_command(DEFAULT_ADDRESS, REG_UVCOMP1, &[0x64, 0x00]);
        bus.set_command(DEFAULT_ADDRESS, REG_UVCOMP2, &[0x32, 0x00]);
        let mut sensor = device(&bus);

        let sample = sensor.take_reading(&RecordingLogger::default()).unwrap();
        let writes = sample.writes();
        assert_eq!(writes[0].0, Metric::UvA);
        assert!((writes[0].1 - 711.5).abs() < 1e-9);
        assert!((writes[1].1 - 518.0).abs() < 1e-9);
        assert!((writes[2].1 - 1.25725145).abs() < 1e-9);
    }
}
