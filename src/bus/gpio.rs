/// GPIO line events from the kernel character device, forwarded to counter actors
use std::error::Error;
use std::thread::{self, JoinHandle};

use gpio_cdev::{Chip, EventRequestFlags, LineRequestFlags};
use log::{debug, warn};
use tokio::sync::mpsc::UnboundedSender;

use crate::sensors::pulse::EdgeEvent;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
}

/// Request edge events on `pin` and forward each one to `events` from a
/// dedicated thread. The thread ends when the receiving actor goes away.
pub fn watch_line(
    chip_path: &str,
    pin: u32,
    edge: Edge,
    consumer: &'static str,
    events: UnboundedSender<EdgeEvent>,
) -> Result<JoinHandle<()>, Box<dyn Error>> {
    let mut chip = Chip::new(chip_path)?;
    let line = chip.get_line(pin)?;
    let flags = match edge {
        Edge::Rising => EventRequestFlags::RISING_EDGE,
        Edge::Falling => EventRequestFlags::FALLING_EDGE,
    };
    let line_events = line.events(LineRequestFlags::INPUT, flags, consumer)?;

    let watcher = thread::Builder::new()
        .name(format!("gpio-{}", pin))
        .spawn(move || {
            for event in line_events {
                match event {
                    Ok(_) => {
                        if events.send(EdgeEvent::now()).is_err() {
                            break;
                        }
                    }
                    Err(e) => {
                        warn!("GPIO line {} ({}) stopped delivering events: {}", pin, consumer, e);
                        break;
                    }
                }
            }
            debug!("GPIO line {} watcher exiting", pin);
        })?;

    Ok(watcher)
}
