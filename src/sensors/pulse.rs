/// Pulse counting shared between edge interrupts and the sampling loop
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::debug;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::task::JoinHandle;

/// Edge count written by exactly one counter actor and drained by the
/// sampling loop. Lock-free on both sides.
#[derive(Debug, Default)]
pub struct PulseCounter {
    count: AtomicU64,
}

impl PulseCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the count including this pulse
    pub fn increment(&self) -> u64 {
        self.count.fetch_add(1, Ordering::AcqRel) + 1
    }

    #[cfg(test)]
    pub fn value(&self) -> u64 {
        self.count.load(Ordering::Acquire)
    }

    /// Read the count and zero it in one atomic step
    pub fn get_and_reset(&self) -> u64 {
        self.count.swap(0, Ordering::AcqRel)
    }
}

/// One edge seen on a GPIO line
#[derive(Debug, Clone, Copy)]
pub struct EdgeEvent {
    pub at: Instant,
}

impl EdgeEvent {
    pub fn now() -> Self {
        EdgeEvent { at: Instant::now() }
    }
}

/// Per-driver reaction to an edge, run inside the counter actor
pub trait EdgeHandler: Send + 'static {
    fn on_edge(&mut self, at: Instant);
}

impl EdgeHandler for Arc<PulseCounter> {
    fn on_edge(&mut self, _at: Instant) {
        self.increment();
    }
}

/// Run `handler` for every edge delivered on `events` until all senders are gone
pub fn spawn_edge_actor<H: EdgeHandler>(
    name: &'static str,
    mut events: UnboundedReceiver<EdgeEvent>,
    mut handler: H,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            handler.on_edge(event.at);
        }
        debug!("{} edge channel closed", name);
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;
    use tokio::sync::mpsc::unbounded_channel;

    #[test]
    fn concurrent_increments_drain_exactly_once() {
        let counter = Arc::new(PulseCounter::new());
        let workers: Vec<_> = (0..8)
            .map(|_| {
                let counter = Arc::clone(&counter);
                thread::spawn(move || {
                    for _ in 0..1000 {
                        counter.increment();
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }

        assert_eq!(counter.get_and_reset(), 8000);
        assert_eq!(counter.get_and_reset(), 0);
    }

    #[test]
    fn increment_reports_running_total() {
        let counter = PulseCounter::new();
        assert_eq!(counter.increment(), 1);
        assert_eq!(counter.increment(), 2);
        assert_eq!(counter.value(), 2);
    }

    #[tokio::test]
    async fn actor_counts_every_delivered_edge() {
        let counter = Arc::new(PulseCounter::new());
        let (tx, rx) = unbounded_channel();
        let actor = spawn_edge_actor("test", rx, Arc::clone(&counter));

        for _ in 0..25 {
            tx.send(EdgeEvent::now()).unwrap();
        }
        drop(tx);
        actor.await.unwrap();

        assert_eq!(counter.get_and_reset(), 25);
    }
}
