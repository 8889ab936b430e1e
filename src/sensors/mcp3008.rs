/// MCP3008 8-channel 10-bit ADC on SPI
use embedded_hal::spi::{Error as _, SpiDevice};

use crate::error::BusError;

const FULL_SCALE: f64 = 1024.0;

pub struct Mcp3008<S> {
    spi: S,
}

impl<S: SpiDevice> Mcp3008<S> {
    pub fn new(spi: S) -> Self {
        Mcp3008 { spi }
    }

    /// Single-ended conversion of `channel`, 0..=1023
    pub fn read(&mut self, channel: u8) -> Result<u16, BusError> {
        let request = [0x01, (0x08 | (channel & 0x07)) << 4, 0x00];
        let mut response = [0u8; 3];

        self.spi
            .transfer(&mut response, &request)
            .map_err(|e| BusError::Spi { kind: e.kind() })?;

        Ok((((response[1] & 0x03) as u16) << 8) | response[2] as u16)
    }

    /// Conversion of `channel` as a fraction of the reference voltage, in [0, 1)
    pub fn read_fraction(&mut self, channel: u8) -> Result<f64, BusError> {
        Ok(self.read(channel)? as f64 / FULL_SCALE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockAdc;

    #[test]
    fn sends_single_ended_request_and_decodes_ten_bits() {
        let mut adc = Mcp3008::new(MockAdc {
            value: 0x2AB,
            ..MockAdc::default()
        });

        assert_eq!(adc.read(0).unwrap(), 0x2AB);
        assert_eq!(adc.read(3).unwrap(), 0x2AB);
        assert_eq!(adc.spi.requests, vec![vec![0x01, 0x80, 0x00], vec![0x01, 0xB0, 0x00]]);
    }

    #[test]
    fn fraction_is_normalised_by_full_scale() {
        let mut adc = Mcp3008::new(MockAdc {
            value: 512,
            ..MockAdc::default()
        });
        assert_eq!(adc.read_fraction(0).unwrap(), 0.5);
    }

    #[test]
    fn spi_failure_is_a_bus_error() {
        let mut adc = Mcp3008::new(MockAdc {
            failing: true,
            ..MockAdc::default()
        });
        assert!(matches!(adc.read(0), Err(BusError::Spi { .. })));
    }
}
