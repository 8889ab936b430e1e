use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use embedded_hal::i2c::I2c;
use log::debug;

use crate::bus::channel::{RegisterChannel, SharedBus};

/// Owns the I2C bus handle and hands out one cached channel per device address.
///
/// Built once at startup and passed to each driver constructor.
pub struct DeviceRegistry<B> {
    bus: SharedBus<B>,
    channels: HashMap<u8, RegisterChannel<B>>,
}

impl<B: I2c> DeviceRegistry<B> {
    pub fn new(bus: B) -> Self {
        DeviceRegistry {
            bus: Arc::new(Mutex::new(bus)),
            channels: HashMap::new(),
        }
    }

    /// Channel for `address`, created on first use and reused afterwards
    pub fn register(&mut self, address: u8) -> RegisterChannel<B> {
        self.channels
            .entry(address)
            .or_insert_with(|| {
                debug!("Registering I2C device {:#04x}", address);
                RegisterChannel::new(Arc::clone(&self.bus), address)
            })
            .clone()
    }

    #[cfg(test)]
    pub fn channel(&self, address: u8) -> Option<RegisterChannel<B>> {
        self.channels.get(&address).cloned()
    }

    pub fn addresses(&self) -> Vec<u8> {
        let mut addresses: Vec<u8> = self.channels.keys().copied().collect();
        addresses.sort_unstable();
        addresses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::channel::ReadMode;
    use crate::bus::mock::MockBus;

    #[test]
    fn registering_twice_reuses_the_channel() {
        let mut registry = DeviceRegistry::new(MockBus::default());
        registry.register(0x77);
        registry.register(0x5B);
        registry.register(0x77);

        assert_eq!(registry.addresses(), vec![0x5B, 0x77]);
        assert_eq!(registry.channel(0x77).map(|c| c.address()), Some(0x77));
        assert!(registry.channel(0x10).is_none());
    }

    #[test]
    fn channels_share_one_bus() {
        let bus = MockBus::default();
        bus.set_registers(0x77, 0xD0, &[0x60]);
        bus.set_registers(0x5B, 0x20, &[0x81]);

        let mut registry = DeviceRegistry::new(bus.clone());
        let bme = registry.register(0x77);
        let ccs = registry.register(0x5B);

        assert_eq!(bme.read_byte(0xD0, ReadMode::SetReadBit).unwrap(), 0x60);
        assert_eq!(ccs.read_byte(0x20, ReadMode::Raw).unwrap(), 0x81);
        assert_eq!(bus.transactions(), 4);
    }
}
