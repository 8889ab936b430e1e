/// Floating point compensation of raw BME280 conversions
use crate::sensors::bme280::calibration::Calibration;

/// Uncompensated ADC values from the 8-byte burst read at `0xF7`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawMeasurement {
    pub pressure: u32,
    pub temperature: u32,
    pub humidity: u32,
}

impl RawMeasurement {
    /// Pressure and temperature are 20-bit, humidity 16-bit, all big-endian.
    pub fn from_block(data: &[u8]) -> Self {
        RawMeasurement {
            pressure: ((data[0] as u32) << 12) | ((data[1] as u32) << 4) | ((data[2] as u32) >> 4),
            temperature: ((data[3] as u32) << 12) | ((data[4] as u32) << 4) | ((data[5] as u32) >> 4),
            humidity: ((data[6] as u32) << 8) | data[7] as u32,
        }
    }
}

/// Fine temperature shared by the pressure and humidity formulas
pub fn t_fine(calibration: &Calibration, raw_temperature: u32) -> f64 {
    let raw = raw_temperature as f64;
    let t1 = calibration.t1 as f64;

    let var1 = (raw / 16384.0 - t1 / 1024.0) * calibration.t2 as f64;
    let var2 = (raw / 131072.0 - t1 / 8192.0).powi(2) * calibration.t3 as f64;
    var1 + var2
}

/// Degrees Celsius
pub fn temperature(t_fine: f64) -> f64 {
    t_fine / 5120.0
}

/// Hectopascal. Returns 0 when the P1 coefficient makes the divisor vanish.
pub fn pressure(calibration: &Calibration, t_fine: f64, raw_pressure: u32) -> f64 {
    let c = calibration;

    let mut var1 = t_fine / 2.0 - 64000.0;
    let mut var2 = var1 * var1 * c.p6 as f64 / 32768.0;
    var2 += var1 * c.p5 as f64 * 2.0;
    var2 = var2 / 4.0 + c.p4 as f64 * 65536.0;
    var1 = (c.p3 as f64 * var1 * var1 / 524288.0 + c.p2 as f64 * var1) / 524288.0;
    var1 = (1.0 + var1 / 32768.0) * c.p1 as f64;

    if var1 == 0.0 {
        return 0.0;
    }

    let mut p = 1048576.0 - raw_pressure as f64;
    p = (p - var2 / 4096.0) * 6250.0 / var1;
    let var1 = c.p9 as f64 * p * p / 2147483648.0;
    let var2 = p * c.p8 as f64 / 32768.0;
    p += (var1 + var2 + c.p7 as f64) / 16.0;

    p / 100.0
}

/// Relative humidity in percent, clamped to 0..=100
pub fn humidity(calibration: &Calibration, t_fine: f64, raw_humidity: u32) -> f64 {
    let c = calibration;

    let mut h = t_fine - 76800.0;
    h = (raw_humidity as f64 - (c.h4 as f64 * 64.0 + c.h5 as f64 / 16384.0 * h))
        * (c.h2 as f64 / 65536.0
            * (1.0 + c.h6 as f64 / 67108864.0 * h * (1.0 + c.h3 as f64 / 67108864.0 * h)));
    h *= 1.0 - c.h1 as f64 * h / 524288.0;

    h.clamp(0.0, 100.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Worked example published with the Bosch driver
    fn reference_calibration() -> Calibration {
        Calibration {
            t1: 27504,
            t2: 26435,
            t3: -1000,
            p1: 36477,
            p2: -10685,
            p3: 3024,
            p4: 2855,
            p5: 140,
            p6: -7,
            p7: 15500,
            p8: -14600,
            p9: 6000,
            h1: 75,
            h2: 326,
            h3: 0,
            h4: 419,
            h5: 50,
            h6: 30,
        }
    }

    #[test]
    fn decodes_burst_read_into_adc_values() {
        let raw = RawMeasurement::from_block(&[0x65, 0x5A, 0xC0, 0x7E, 0xED, 0x00, 0x69, 0x78]);
        assert_eq!(raw.pressure, 415148);
        assert_eq!(raw.temperature, 519888);
        assert_eq!(raw.humidity, 27000);
    }

    #[test]
    fn temperature_follows_fine_temperature_formula() {
        let calibration = Calibration {
            t1: 28154,
            t2: 26709,
            t3: 50,
            ..Calibration::default()
        };

        let fine = t_fine(&calibration, 551036);
        assert!((fine - 163980.7041).abs() < 1e-3, "t_fine was {}", fine);
        assert!((temperature(fine) - 32.03).abs() < 0.01);
    }

    #[test]
    fn reference_conversion_matches_published_values() {
        let calibration = reference_calibration();
        let fine = t_fine(&calibration, 519888);

        assert!((temperature(fine) - 25.08).abs() < 0.01);
        assert!((pressure(&calibration, fine, 415148) - 1006.53).abs() < 0.01);
    }

    #[test]
    fn pressure_is_zero_when_p1_is_zero() {
        let calibration = Calibration {
            p1: 0,
            ..reference_calibration()
        };
        for raw_temperature in [0, 519888, 0xFFFFF] {
            let fine = t_fine(&calibration, raw_temperature);
            for raw_pressure in [0, 1, 415148, 0x80000, 0xFFFFF] {
                assert_eq!(pressure(&calibration, fine, raw_pressure), 0.0);
            }
        }
    }

    #[test]
    fn humidity_stays_within_percent_range() {
        let calibration = reference_calibration();
        let fine = t_fine(&calibration, 519888);

        let plausible = humidity(&calibration, fine, 30000);
        assert!((plausible - 15.37).abs() < 0.01);

        for raw in (0..=u16::MAX as u32).step_by(257) {
            let value = humidity(&calibration, fine, raw);
            assert!((0.0..=100.0).contains(&value), "raw {} gave {}", raw, value);
        }
        assert_eq!(humidity(&calibration, fine, 0), 0.0);
        assert_eq!(humidity(&calibration, fine, 60000), 100.0);
    }
}
