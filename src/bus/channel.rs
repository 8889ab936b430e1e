/// Register-level request/response access to one device on a shared I2C bus
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::i2c::{Error as _, I2c};

use crate::error::BusError;

/// Bus handle shared by every channel on the same bus
pub type SharedBus<B> = Arc<Mutex<B>>;

// Set on the register address for devices that expect a read flag
const READ_BIT: u8 = 0x80;

/// How the register address is sent before a read
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMode {
    /// Register address is sent unchanged
    Raw,
    /// High bit of the register address is set before the read
    SetReadBit,
}

/// One device address on the bus. Stateless apart from the bus handle; clones
/// talk to the same device.
pub struct RegisterChannel<B> {
    bus: SharedBus<B>,
    address: u8,
}

impl<B> Clone for RegisterChannel<B> {
    fn clone(&self) -> Self {
        RegisterChannel {
            bus: Arc::clone(&self.bus),
            address: self.address,
        }
    }
}

impl<B: I2c> RegisterChannel<B> {
    pub fn new(bus: SharedBus<B>, address: u8) -> Self {
        RegisterChannel { bus, address }
    }

    pub fn address(&self) -> u8 {
        self.address
    }

    /// Write `payload` starting at `register` in a single transaction
    pub fn write(&self, register: u8, payload: &[u8]) -> Result<(), BusError> {
        let mut frame = Vec::with_capacity(payload.len() + 1);
        frame.push(register);
        frame.extend_from_slice(payload);

        let mut bus = self.lock()?;
        bus.write(self.address, &frame)
            .map_err(|e| self.i2c_error(register, e))
    }

    pub fn write_byte(&self, register: u8, value: u8) -> Result<(), BusError> {
        self.write(register, &[value])
    }

    /// Send the register address, then block reading `length` bytes
    pub fn read(&self, register: u8, length: usize, mode: ReadMode) -> Result<Vec<u8>, BusError> {
        let command = match mode {
            ReadMode::Raw => register,
            ReadMode::SetReadBit => register | READ_BIT,
        };
        let mut buffer = vec![0u8; length];

        let mut bus = self.lock()?;
        bus.write(self.address, &[command])
            .map_err(|e| self.i2c_error(register, e))?;
        bus.read(self.address, &mut buffer)
            .map_err(|e| self.i2c_error(register, e))?;

        Ok(buffer)
    }

    pub fn read_byte(&self, register: u8, mode: ReadMode) -> Result<u8, BusError> {
        Ok(self.read(register, 1, mode)?[0])
    }

    fn lock(&self) -> Result<MutexGuard<'_, B>, BusError> {
        self.bus.lock().map_err(|_| BusError::Poisoned {
            address: self.address,
        })
    }

    fn i2c_error<E: embedded_hal::i2c::Error>(&self, register: u8, error: E) -> BusError {
        BusError::I2c {
            address: self.address,
            register,
            kind: error.kind(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::mock::MockBus;

    fn channel(bus: &MockBus, address: u8) -> RegisterChannel<MockBus> {
        RegisterChannel::new(Arc::new(Mutex::new(bus.clone())), address)
    }

    #[test]
    fn write_prefixes_register_to_payload() {
        let bus = MockBus::default();
        channel(&bus, 0x77).write(0xF4, &[0x49, 0x01]).unwrap();
        assert_eq!(bus.writes(), vec![(0x77, vec![0xF4, 0x49, 0x01])]);
    }

    #[test]
    fn read_sets_high_bit_when_requested() {
        let bus = MockBus::default();
        bus.set_registers(0x10, 0x87, &[0xAB, 0xCD]);

        let bytes = channel(&bus, 0x10).read(0x07, 2, ReadMode::SetReadBit).unwrap();
        assert_eq!(bytes, vec![0xAB, 0xCD]);
        assert_eq!(bus.writes(), vec![(0x10, vec![0x87])]);
    }

    #[test]
    fn raw_read_sends_register_unchanged() {
        let bus = MockBus::default();
        bus.set_registers(0x5B, 0x20, &[0x81]);

        assert_eq!(channel(&bus, 0x5B).read_byte(0x20, ReadMode::Raw).unwrap(), 0x81);
        assert_eq!(bus.writes(), vec![(0x5B, vec![0x20])]);
    }

    #[test]
    fn transport_failure_propagates_without_retry() {
        let bus = MockBus::default();
        bus.set_failing(true);

        let err = channel(&bus, 0x77).read(0xD0, 1, ReadMode::SetReadBit).unwrap_err();
        assert!(matches!(
            err,
            BusError::I2c {
                address: 0x77,
                register: 0xD0,
                ..
            }
        ));
        assert_eq!(bus.transactions(), 1);
    }
}
