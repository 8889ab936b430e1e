/// Error types shared by the bus layer, the drivers, the coordinator and the sinks
use thiserror::Error;

use crate::models::Metric;

/// A failed bus transaction. Never retried; the driver that issued it gives up
/// for the current pass.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("I2C transaction with device {address:#04x} at register {register:#04x} failed: {kind:?}")]
    I2c {
        address: u8,
        register: u8,
        kind: embedded_hal::i2c::ErrorKind,
    },
    #[error("SPI transfer failed: {kind:?}")]
    Spi { kind: embedded_hal::spi::ErrorKind },
    #[error("bus handle for device {address:#04x} is poisoned")]
    Poisoned { address: u8 },
}

#[derive(Debug, Error)]
pub enum SensorError {
    #[error("transport error: {0}")]
    Transport(#[from] BusError),
    #[error("{sensor}: I/O error: {source}")]
    Io {
        sensor: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("{sensor}: protocol error: {details}")]
    Protocol {
        sensor: &'static str,
        details: String,
    },
    #[error("{sensor}: arithmetic error: {details}")]
    Arithmetic {
        sensor: &'static str,
        details: String,
    },
    #[error("{sensor}: {details}")]
    Unavailable {
        sensor: &'static str,
        details: String,
    },
    #[error("no wind direction for corrected voltage {voltage:.1} V")]
    DirectionLookup { voltage: f64 },
}

impl SensorError {
    /// Protocol errors mean the device is not what the driver expects, so the
    /// driver stays out of every following pass. Everything else only costs
    /// the current pass.
    pub fn disables_driver(&self) -> bool {
        matches!(self, SensorError::Protocol { .. })
    }
}

#[derive(Debug, Error, PartialEq)]
pub enum ObservationError {
    #[error("{0} was already written during this pass")]
    AlreadyWritten(Metric),
    #[error("{sensor} does not own {metric}")]
    NotOwned {
        sensor: &'static str,
        metric: Metric,
    },
}

#[derive(Debug, Error)]
pub enum SinkError {
    #[error("{sink}: writer task is gone")]
    Closed { sink: &'static str },
}
