//! Event bus with typed pub/sub for serra
//!
//! The EventBus is the central message broker between the state store and
//! its observers (alert monitor, history recorder, server surfaces).
//! Subscriptions are keyed by [`EventKind`]; a match-all channel serves
//! consumers that want the full stream.

use dashmap::DashMap;
use serra_core::{Context, Event, EventKind, EventPayload};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Default channel capacity for event subscriptions
const DEFAULT_CHANNEL_CAPACITY: usize = 1024;

/// The event bus for publishing and subscribing to domain events
pub struct EventBus {
    /// Per-kind broadcast senders, created lazily on first subscription
    listeners: DashMap<EventKind, broadcast::Sender<Event>>,
    /// Sender feeding subscribers of the full stream
    match_all_sender: broadcast::Sender<Event>,
    /// Channel capacity
    capacity: usize,
}

impl EventBus {
    /// Create a new event bus
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CHANNEL_CAPACITY)
    }

    /// Create a new event bus with the given channel capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (match_all_sender, _) = broadcast::channel(capacity);
        Self {
            listeners: DashMap::new(),
            match_all_sender,
            capacity,
        }
    }

    /// Subscribe to events of a specific kind
    pub fn subscribe(&self, kind: EventKind) -> broadcast::Receiver<Event> {
        trace!(?kind, "Subscribing to event kind");

        self.listeners
            .entry(kind)
            .or_insert_with(|| {
                let (tx, _) = broadcast::channel(self.capacity);
                tx
            })
            .subscribe()
    }

    /// Subscribe to every event
    pub fn subscribe_all(&self) -> broadcast::Receiver<Event> {
        self.match_all_sender.subscribe()
    }

    /// Fire an event to all subscribers
    ///
    /// Delivered to subscribers of the payload's kind and to match-all
    /// subscribers. Send errors just mean no active receivers and are
    /// ignored.
    pub fn fire(&self, payload: EventPayload, context: Context) -> Event {
        let event = Event::new(payload, context);
        debug!(kind = ?event.kind(), "Firing event");

        if let Some(sender) = self.listeners.get(&event.kind()) {
            let _ = sender.send(event.clone());
        }
        let _ = self.match_all_sender.send(event.clone());

        event
    }

    /// Number of kinds with at least one past subscription
    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe wrapper for EventBus
pub type SharedEventBus = Arc<EventBus>;

#[cfg(test)]
mod tests {
    use super::*;
    use serra_core::{
        Sensor, SensorId, SensorKind, SensorUpdatedData, SiteId, SiteStatus,
        SiteStatusChangedData,
    };

    fn sensor_updated(site: &str, sensor: &str, value: f64) -> EventPayload {
        let site_id = SiteId::new(site).unwrap();
        let old = Sensor::new(
            SensorId::new(sensor).unwrap(),
            "Température Air",
            SensorKind::Temperature,
            24.5,
            site_id.clone(),
        );
        let new = old.with_value(value);
        EventPayload::SensorUpdated(SensorUpdatedData { site_id, old, new })
    }

    fn status_changed(site: &str) -> EventPayload {
        EventPayload::SiteStatusChanged(SiteStatusChangedData {
            site_id: SiteId::new(site).unwrap(),
            old: SiteStatus::Active,
            new: SiteStatus::Offline,
        })
    }

    #[tokio::test]
    async fn test_subscribe_and_fire() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe(EventKind::SensorUpdated);

        bus.fire(sensor_updated("1", "s1", 30.0), Context::new());

        let event = rx.recv().await.unwrap();
        assert_eq!(event.kind(), EventKind::SensorUpdated);
        match event.payload {
            EventPayload::SensorUpdated(data) => assert_eq!(data.new.value, 30.0),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_match_all_subscription() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe_all();

        bus.fire(sensor_updated("1", "s1", 25.0), Context::new());
        bus.fire(status_changed("1"), Context::new());

        assert_eq!(rx.recv().await.unwrap().kind(), EventKind::SensorUpdated);
        assert_eq!(rx.recv().await.unwrap().kind(), EventKind::SiteStatusChanged);
    }

    #[tokio::test]
    async fn test_no_cross_kind_pollution() {
        let bus = EventBus::new();
        let mut sensor_rx = bus.subscribe(EventKind::SensorUpdated);
        let mut status_rx = bus.subscribe(EventKind::SiteStatusChanged);

        bus.fire(sensor_updated("1", "s1", 25.0), Context::new());

        assert_eq!(sensor_rx.recv().await.unwrap().kind(), EventKind::SensorUpdated);
        assert!(status_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_multiple_subscribers() {
        let bus = EventBus::new();
        let mut rx1 = bus.subscribe(EventKind::SensorUpdated);
        let mut rx2 = bus.subscribe(EventKind::SensorUpdated);

        bus.fire(sensor_updated("1", "s1", 26.0), Context::new());

        assert!(rx1.recv().await.is_ok());
        assert!(rx2.recv().await.is_ok());
    }

    #[test]
    fn test_fire_without_subscribers_is_ok() {
        let bus = EventBus::new();
        // no receivers anywhere; must not panic or error
        bus.fire(status_changed("2"), Context::new());
    }
}
