/// Psychrometric and barometric quantities derived from temperature, humidity and pressure
const KELVIN_OFFSET: f64 = 273.15;
const STANDARD_PRESSURE_HPA: f64 = 1013.25;
const LAPSE_RATE: f64 = 0.0065; // K/m
const GRAVITY: f64 = 9.80665; // m/s²
const DRY_AIR_GAS_CONSTANT: f64 = 287.05; // J/(kg·K)
const WATER_VAPOUR_GAS_CONSTANT: f64 = 461.5; // J/(kg·K)

/// Saturation vapour pressure over water in hPa (Magnus, Alduchov-Eskridge coefficients)
pub fn saturation_vapour_pressure_water(celsius: f64) -> f64 {
    6.1094 * (17.625 * celsius / (celsius + 243.04)).exp()
}

/// Saturation vapour pressure over ice in hPa
pub fn saturation_vapour_pressure_ice(celsius: f64) -> f64 {
    6.1115 * (22.452 * celsius / (celsius + 272.55)).exp()
}

/// Partial pressure of water vapour in hPa
pub fn actual_vapour_pressure(celsius: f64, relative_humidity: f64) -> f64 {
    relative_humidity / 100.0 * saturation_vapour_pressure_water(celsius)
}

pub fn dew_point(celsius: f64, relative_humidity: f64) -> f64 {
    let alpha = (actual_vapour_pressure(celsius, relative_humidity) / 6.1094).ln();
    243.04 * alpha / (17.625 - alpha)
}

/// Grams of water vapour per cubic metre of air
pub fn absolute_humidity(celsius: f64, relative_humidity: f64) -> f64 {
    let vapour_pa = actual_vapour_pressure(celsius, relative_humidity) * 100.0;
    vapour_pa / (WATER_VAPOUR_GAS_CONSTANT * (celsius + KELVIN_OFFSET)) * 1000.0
}

/// Apparent temperature in °C using the NWS Rothfusz regression with its
/// low and high humidity adjustments.
pub fn heat_index(celsius: f64, relative_humidity: f64) -> f64 {
    let tf = celsius * 9.0 / 5.0 + 32.0;
    let rh = relative_humidity;

    let simple = 0.5 * (tf + 61.0 + (tf - 68.0) * 1.2 + rh * 0.094);
    let fahrenheit = if (simple + tf) / 2.0 < 80.0 {
        simple
    } else {
        let mut index = -42.379 + 2.04901523 * tf + 10.14333127 * rh
            - 0.22475541 * tf * rh
            - 0.00683783 * tf * tf
            - 0.05481717 * rh * rh
            + 0.00122874 * tf * tf * rh
            + 0.00085282 * tf * rh * rh
            - 0.00000199 * tf * tf * rh * rh;

        if rh < 13.0 && (80.0..=112.0).contains(&tf) {
            index -= ((13.0 - rh) / 4.0) * ((17.0 - (tf - 95.0).abs()) / 17.0).sqrt();
        } else if rh > 85.0 && (80.0..=87.0).contains(&tf) {
            index += ((rh - 85.0) / 10.0) * ((87.0 - tf) / 5.0);
        }
        index
    };

    (fahrenheit - 32.0) * 5.0 / 9.0
}

/// Altitude in metres implied by `pressure` against the standard atmosphere
pub fn altitude(pressure: f64) -> f64 {
    if pressure <= 0.0 {
        return 0.0;
    }
    ((STANDARD_PRESSURE_HPA / pressure).powf(1.0 / 5.255) - 1.0) * 288.15 / LAPSE_RATE
}

/// Station pressure reduced to sea level with the hypsometric formula
pub fn sea_level_pressure(pressure: f64, celsius: f64, altitude: f64) -> f64 {
    let lapse = LAPSE_RATE * altitude;
    pressure * (1.0 - lapse / (celsius + KELVIN_OFFSET + lapse)).powf(-5.257)
}

/// Station pressure reduced to sea level with a humidity corrected virtual temperature
pub fn barometric_pressure(pressure: f64, celsius: f64, altitude: f64, vapour_pressure: f64) -> f64 {
    let column_temperature =
        celsius + KELVIN_OFFSET + 0.12 * vapour_pressure + LAPSE_RATE * altitude / 2.0;
    pressure * (GRAVITY * altitude / (DRY_AIR_GAS_CONSTANT * column_temperature)).exp()
}
