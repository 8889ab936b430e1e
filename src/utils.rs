/// Utility functions for byte decoding, formatting and batch summaries
use time::{format_description, OffsetDateTime};

use crate::models::{ObservationSummary, WeatherObservation};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    match format_description::parse("[day].[month].[year] - [hour]:[minute]:[second]") {
        Ok(format) => dt.format(&format).unwrap_or_else(|_| dt.to_string()),
        Err(_) => dt.to_string(),
    }
}

/// Render register bytes as a comma separated list for diagnostics, e.g. `141,110,5`
pub fn print_byte_array(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| b.to_string())
        .collect::<Vec<_>>()
        .join(",")
}

/// Little-endian unsigned 16-bit value at `index`
pub fn u16_le(bytes: &[u8], index: usize) -> u16 {
    u16::from_le_bytes([bytes[index], bytes[index + 1]])
}

/// Little-endian signed 16-bit value at `index`
pub fn i16_le(bytes: &[u8], index: usize) -> i16 {
    i16::from_le_bytes([bytes[index], bytes[index + 1]])
}

/// Byte at `index` reinterpreted as two's complement
pub fn i8_at(bytes: &[u8], index: usize) -> i8 {
    bytes[index] as i8
}

/// Reduce a publish window of observations to one database row
///
/// Temperatures, humidity, pressure, air quality and average wind speed are
/// averaged, the gust is the maximum seen in the window and precipitation is
/// the total fallen during the window.
///
/// # Returns
/// None when the window is empty
pub fn summarize_observations(observations: &[WeatherObservation]) -> Option<ObservationSummary> {
    if observations.is_empty() {
        return None;
    }

    let count = observations.len() as f64;
    let average = |field: fn(&WeatherObservation) -> f64| {
        observations.iter().map(field).sum::<f64>() / count
    };

    let wind_gust = observations
        .iter()
        .map(|o| o.wind_gust)
        .fold(f64::NEG_INFINITY, f64::max);

    Some(ObservationSummary {
        temperature1: (average(|o| o.temperature1) * 100.0).round() / 100.0, // 2 decimal places
        temperature2: (average(|o| o.temperature2) * 100.0).round() / 100.0, // 2 decimal places
        relative_humidity: (average(|o| o.relative_humidity) * 100.0).round() / 100.0,
        barometric_pressure: (average(|o| o.barometric_pressure) * 100.0).round() / 100.0,
        co2: average(|o| o.co2).round(),
        tvoc: average(|o| o.tvoc).round(),
        wind_gust,
        wind_average: (average(|o| o.wind_average) * 100.0).round() / 100.0,
        precipitation: observations.iter().map(|o| o.precipitation).sum(),
        time: OffsetDateTime::now_utc(),
        samples: observations.len() as i32,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metric, ObservationBuilder};

    // Factory calibration block captured from a real BME280
    const CALIBRATION_1: [u8; 24] = [
        141, 110, 5, 103, 50, 0, 228, 145, 17, 214, 208, 11, 26, 48, 90, 255, 249, 255, 12, 48,
        32, 209, 136, 19,
    ];
    const CALIBRATION_2: [u8; 1] = [75];
    const CALIBRATION_3: [u8; 7] = [70, 1, 0, 26, 35, 3, 30];

    #[test]
    fn reads_unsigned_short() {
        assert_eq!(u16_le(&CALIBRATION_1, 0), 28301);
    }

    #[test]
    fn reads_signed_short() {
        assert_eq!(i16_le(&CALIBRATION_1, 2), 26373);
        assert_eq!(i16_le(&CALIBRATION_1, 14), -166);
    }

    #[test]
    fn reads_signed_byte() {
        assert_eq!(i8_at(&CALIBRATION_3, 3), 26);
        assert_eq!(i8_at(&[0xFE], 0), -2);
    }

    #[test]
    fn reads_unsigned_byte() {
        assert_eq!(CALIBRATION_2[0], 75);
    }

    #[test]
    fn prints_bytes_comma_separated() {
        assert_eq!(print_byte_array(&CALIBRATION_3), "70,1,0,26,35,3,30");
        assert_eq!(print_byte_array(&[]), "");
    }

    fn observation(temperature: f64, gust: f64, rain: f64) -> WeatherObservation {
        let mut builder = ObservationBuilder::new();
        builder.set(Metric::Temperature1, temperature).unwrap();
        builder.set(Metric::WindGust, gust).unwrap();
        builder.set(Metric::Precipitation, rain).unwrap();
        builder.build()
    }

    #[test]
    fn summary_averages_maxes_and_sums() {
        let batch = vec![
            observation(20.0, 12.5, 0.2794),
            observation(21.0, 30.25, 0.0),
            observation(22.5, 8.0, 0.5588),
        ];

        let summary = summarize_observations(&batch).unwrap();
        assert_eq!(summary.temperature1, 21.17);
        assert_eq!(summary.wind_gust, 30.25);
        assert!((summary.precipitation - 0.8382).abs() < 1e-9);
        assert_eq!(summary.samples, 3);
    }

    #[test]
    fn empty_window_has_no_summary() {
        assert!(summarize_observations(&[]).is_none());
    }
}
