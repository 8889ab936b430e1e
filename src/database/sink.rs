/// Observation sink that batches passes and publishes averaged rows to PostgreSQL
use std::time::Instant;

use log::{error, info, warn};
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::database::operations::store_observation_summary;
use crate::error::SinkError;
use crate::models::WeatherObservation;
use crate::sinks::ObservationSink;
use crate::utils::{format_datetime, summarize_observations};

const NAME: &str = "postgres";

/// Observations collected since the last publish
#[derive(Debug)]
pub struct Batch {
    interval: Duration,
    started: Instant,
    observations: Vec<WeatherObservation>,
}

impl Batch {
    pub fn new(interval: Duration, started: Instant) -> Self {
        Batch {
            interval,
            started,
            observations: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    /// Add an observation received at `now`
    ///
    /// # Returns
    /// The whole window, this observation included, once `interval` has
    /// elapsed since the window started. The batch then starts over at `now`.
    pub fn push(&mut self, observation: WeatherObservation, now: Instant) -> Option<Vec<WeatherObservation>> {
        self.observations.push(observation);

        if now.saturating_duration_since(self.started) < self.interval {
            return None;
        }

        self.started = now;
        Some(std::mem::take(&mut self.observations))
    }
}

/// Forwards observations to a publisher task; `record` never blocks on the database
pub struct PostgresSink {
    sender: UnboundedSender<WeatherObservation>,
}

impl PostgresSink {
    /// Start the publisher task on the current runtime
    ///
    /// # Arguments
    /// * `database_url` - PostgreSQL connection string
    /// * `publish_interval` - Length of the window averaged into one row
    pub fn spawn(database_url: String, publish_interval: Duration) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = unbounded_channel();
        let publisher = tokio::spawn(publish_loop(database_url, publish_interval, receiver));
        (PostgresSink { sender }, publisher)
    }
}

impl ObservationSink for PostgresSink {
    fn name(&self) -> &'static str {
        NAME
    }

    fn record(&mut self, observation: &WeatherObservation) -> Result<(), SinkError> {
        self.sender
            .send(observation.clone())
            .map_err(|_| SinkError::Closed { sink: NAME })
    }
}

async fn publish_loop(
    database_url: String,
    publish_interval: Duration,
    mut receiver: UnboundedReceiver<WeatherObservation>,
) {
    let mut batch = Batch::new(publish_interval, Instant::now());

    while let Some(observation) = receiver.recv().await {
        let Some(window) = batch.push(observation, Instant::now()) else {
            continue;
        };

        let Some(summary) = summarize_observations(&window) else {
            continue;
        };

        match store_observation_summary(&summary, &database_url).await {
            Ok(()) => info!(
                "Stored {} observations summarized at {}",
                summary.samples,
                format_datetime(&summary.time)
            ),
            Err(e) => error!("Failed to store {} observations: {}", summary.samples, e),
        }
    }

    if batch.len() > 0 {
        warn!("Dropping {} unpublished observations on shutdown", batch.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Metric, ObservationBuilder};

    fn observation(rain: f64) -> WeatherObservation {
        let mut builder = ObservationBuilder::new();
        builder.set(Metric::Precipitation, rain).unwrap();
        builder.build()
    }

    #[test]
    fn batch_releases_window_once_interval_elapses() {
        let start = Instant::now();
        let interval = Duration::from_secs(300);
        let mut batch = Batch::new(interval, start);

        assert!(batch.push(observation(0.1), start + Duration::from_secs(60)).is_none());
        assert!(batch.push(observation(0.2), start + Duration::from_secs(120)).is_none());

        let window = batch.push(observation(0.3), start + interval).unwrap();
        assert_eq!(window.len(), 3);
        assert_eq!(window[2].precipitation, 0.3);
        assert_eq!(batch.len(), 0);
    }

    #[test]
    fn next_window_starts_at_release() {
        let start = Instant::now();
        let interval = Duration::from_secs(300);
        let mut batch = Batch::new(interval, start);

        assert!(batch.push(observation(0.0), start + Duration::from_secs(301)).is_some());
        assert!(batch.push(observation(0.0), start + Duration::from_secs(500)).is_none());
        assert!(batch.push(observation(0.0), start + Duration::from_secs(601)).is_some());
    }

    #[test]
    fn closed_publisher_is_reported() {
        let (sender, receiver) = unbounded_channel();
        drop(receiver);
        let mut sink = PostgresSink { sender };

        let err = sink.record(&observation(0.0)).unwrap_err();
        assert!(matches!(err, SinkError::Closed { sink: "postgres" }));
    }

    #[tokio::test]
    async fn record_queues_for_publisher() {
        let (sender, mut receiver) = unbounded_channel();
        let mut sink = PostgresSink { sender };

        sink.record(&observation(0.2794)).unwrap();
        let queued = receiver.recv().await.unwrap();
        assert_eq!(queued.precipitation, 0.2794);
    }
}
