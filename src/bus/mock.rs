/// In-memory stand-ins for the I2C bus, the SPI ADC and the delay provider.
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{self, I2c};
use embedded_hal::spi::{self, SpiDevice};

#[derive(Debug)]
pub struct MockError;

impl i2c::Error for MockError {
    fn kind(&self) -> i2c::ErrorKind {
        i2c::ErrorKind::NoAcknowledge(i2c::NoAcknowledgeSource::Address)
    }
}

impl spi::Error for MockError {
    fn kind(&self) -> spi::ErrorKind {
        spi::ErrorKind::Other
    }
}

#[derive(Debug, Default)]
struct MockState {
    registers: HashMap<u8, [u8; 256]>,
    commands: HashMap<(u8, u8), Vec<u8>>,
    pointers: HashMap<u8, u8>,
    writes: Vec<(u8, Vec<u8>)>,
    transactions: usize,
    failing: bool,
    ignore_writes: bool,
}

/// Register file per device address. The first byte of a write moves the
/// register pointer, following bytes are stored auto-incrementing, reads
/// return bytes from the pointer onwards. Nothing wraps past `0xFF`.
#[derive(Debug, Clone, Default)]
pub struct MockBus {
    state: Arc<Mutex<MockState>>,
}

impl MockBus {
    pub fn set_registers(&self, address: u8, start: u8, bytes: &[u8]) {
        let mut state = self.state.lock().unwrap();
        let file = state.registers.entry(address).or_insert([0; 256]);
        for (slot, byte) in file[start as usize..].iter_mut().zip(bytes) {
            *slot = *byte;
        }
    }

    /// Response for reads issued right after command code `command`, for
    /// devices whose registers are words rather than auto-incrementing bytes
    pub fn set_command(&self, address: u8, command: u8, response: &[u8]) {
        let mut state = self.state.lock().unwrap();
        state.commands.insert((address, command), response.to_vec());
    }

    pub fn writes(&self) -> Vec<(u8, Vec<u8>)> {
        self.state.lock().unwrap().writes.clone()
    }

    pub fn transactions(&self) -> usize {
        self.state.lock().unwrap().transactions
    }

    pub fn set_failing(&self, failing: bool) {
        self.state.lock().unwrap().failing = failing;
    }

    /// Register pointer still moves, payload bytes are dropped
    pub fn set_ignore_writes(&self, ignore: bool) {
        self.state.lock().unwrap().ignore_writes = ignore;
    }
}

impl i2c::ErrorType for MockBus {
    type Error = MockError;
}

impl I2c for MockBus {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [i2c::Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.lock().unwrap();
        state.transactions += 1;
        if state.failing {
            return Err(MockError);
        }

        for operation in operations {
            match operation {
                i2c::Operation::Write(bytes) => {
                    state.writes.push((address, bytes.to_vec()));
                    if let Some((&register, payload)) = bytes.split_first() {
                        state.pointers.insert(address, register);
                        if state.ignore_writes {
                            continue;
                        }
                        let file = state.registers.entry(address).or_insert([0; 256]);
                        for (slot, byte) in file[register as usize..].iter_mut().zip(payload) {
                            *slot = *byte;
                        }
                    }
                }
                i2c::Operation::Read(buffer) => {
                    let pointer = state.pointers.get(&address).copied().unwrap_or(0);
                    if let Some(response) = state.commands.get(&(address, pointer)) {
                        for (byte, value) in buffer.iter_mut().zip(response) {
                            *byte = *value;
                        }
                        continue;
                    }
                    let file = state.registers.get(&address).copied().unwrap_or([0; 256]);
                    for (byte, value) in buffer.iter_mut().zip(file[pointer as usize..].iter()) {
                        *byte = *value;
                    }
                }
            }
        }
        Ok(())
    }
}

/// MCP3008 stand-in answering every conversion with a fixed 10-bit value
#[derive(Debug, Default)]
pub struct MockAdc {
    pub value: u16,
    pub failing: bool,
    pub requests: Vec<Vec<u8>>,
}

impl spi::ErrorType for MockAdc {
    type Error = MockError;
}

impl SpiDevice for MockAdc {
    fn transaction(&mut self, operations: &mut [spi::Operation<'_, u8>]) -> Result<(), Self::Error> {
        if self.failing {
            return Err(MockError);
        }

        for operation in operations {
            if let spi::Operation::Transfer(read, write) = operation {
                self.requests.push(write.to_vec());
                let response = [0u8, ((self.value >> 8) & 0x03) as u8, (self.value & 0xFF) as u8];
                for (slot, byte) in read.iter_mut().zip(response) {
                    *slot = byte;
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}
