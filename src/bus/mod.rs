pub mod channel;
pub mod gpio;
#[cfg(test)]
pub mod mock;
pub mod registry;

pub use channel::{ReadMode, RegisterChannel};
pub use gpio::{watch_line, Edge};
pub use registry::DeviceRegistry;
