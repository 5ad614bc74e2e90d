//! Sensor reading history for serra
//!
//! The Recorder keeps a bounded in-memory series per sensor and answers the
//! queries the history views need: raw readings since a point in time and
//! min/max/mean summaries. Durable storage is out of scope; the series is
//! rebuilt from live readings after a restart.

use std::collections::VecDeque;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use serra_core::{EventKind, EventPayload, SensorId};
use serra_event_bus::EventBus;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

/// Default number of readings retained per sensor
const DEFAULT_CAPACITY: usize = 1024;

/// One recorded reading
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub value: f64,
    pub timestamp: DateTime<Utc>,
}

/// Summary of a reading series
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesStats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub samples: usize,
}

/// Bounded per-sensor reading history
pub struct Recorder {
    series: DashMap<SensorId, VecDeque<Reading>>,
    capacity: usize,
}

impl Recorder {
    /// Create a recorder with the default per-sensor capacity
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Create a recorder retaining at most `capacity` readings per sensor
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            series: DashMap::new(),
            capacity,
        }
    }

    /// Append a reading, dropping the oldest entry at capacity
    pub fn record(&self, sensor_id: SensorId, value: f64, timestamp: DateTime<Utc>) {
        let mut series = self.series.entry(sensor_id).or_default();
        series.push_back(Reading { value, timestamp });
        while series.len() > self.capacity {
            series.pop_front();
        }
    }

    /// Readings for a sensor, oldest first, optionally bounded below
    pub fn series(&self, sensor_id: &SensorId, since: Option<DateTime<Utc>>) -> Vec<Reading> {
        let Some(series) = self.series.get(sensor_id) else {
            return Vec::new();
        };
        series
            .iter()
            .filter(|r| since.map_or(true, |s| r.timestamp >= s))
            .copied()
            .collect()
    }

    /// Min/max/mean summary over a sensor's readings
    pub fn stats(&self, sensor_id: &SensorId, since: Option<DateTime<Utc>>) -> Option<SeriesStats> {
        let readings = self.series(sensor_id, since);
        if readings.is_empty() {
            return None;
        }

        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        let mut sum = 0.0;
        for r in &readings {
            min = min.min(r.value);
            max = max.max(r.value);
            sum += r.value;
        }

        Some(SeriesStats {
            min,
            max,
            mean: sum / readings.len() as f64,
            samples: readings.len(),
        })
    }

    /// Number of sensors with at least one reading
    pub fn sensor_count(&self) -> usize {
        self.series.len()
    }

    /// Subscribe to the bus and record every sensor update until it closes
    pub fn spawn(self: Arc<Self>, bus: &EventBus) -> JoinHandle<()> {
        let mut rx = bus.subscribe(EventKind::SensorUpdated);

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => {
                        if let EventPayload::SensorUpdated(data) = &event.payload {
                            self.record(
                                data.new.id.clone(),
                                data.new.value,
                                data.new.last_update,
                            );
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(missed = n, "History recorder lagged behind the event stream");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Event bus closed, stopping history recorder");
                        break;
                    }
                }
            }
        })
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new()
    }
}
