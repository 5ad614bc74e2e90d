//! Domain events carried on the event bus
//!
//! The payload is a closed enum rather than stringly-typed event names:
//! every switch over events is exhaustive, so adding a variant is a compile
//! error at each consumer until it is handled.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    Alert, Context, Equipment, EquipmentId, RuleId, Sensor, SiteId, SiteStatus,
};

/// Field-less discriminant of [`EventPayload`], used to key subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SensorUpdated,
    EquipmentChanged,
    SiteStatusChanged,
    AlertRaised,
    RuleFired,
}

/// Data for sensor reading updates
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorUpdatedData {
    pub site_id: SiteId,
    pub old: Sensor,
    pub new: Sensor,
}

/// Data for equipment active-state changes
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentChangedData {
    pub site_id: SiteId,
    pub old: Equipment,
    pub new: Equipment,
}

/// Data for site status transitions
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteStatusChangedData {
    pub site_id: SiteId,
    pub old: SiteStatus,
    pub new: SiteStatus,
}

/// Data for newly raised alerts
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertRaisedData {
    pub alert: Alert,
}

/// Data for a rule firing against equipment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleFiredData {
    pub rule_id: RuleId,
    pub site_id: SiteId,
    pub equipment_id: EquipmentId,

    /// Resulting equipment state
    pub active: bool,

    /// Sensor reading that satisfied the condition
    pub observed: f64,

    /// Threshold the reading was compared against
    pub threshold: f64,
}

/// Payload of a domain event
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    SensorUpdated(SensorUpdatedData),
    EquipmentChanged(EquipmentChangedData),
    SiteStatusChanged(SiteStatusChangedData),
    AlertRaised(AlertRaisedData),
    RuleFired(RuleFiredData),
}

impl EventPayload {
    /// Discriminant used to route the event to subscribers
    pub fn kind(&self) -> EventKind {
        match self {
            EventPayload::SensorUpdated(_) => EventKind::SensorUpdated,
            EventPayload::EquipmentChanged(_) => EventKind::EquipmentChanged,
            EventPayload::SiteStatusChanged(_) => EventKind::SiteStatusChanged,
            EventPayload::AlertRaised(_) => EventKind::AlertRaised,
            EventPayload::RuleFired(_) => EventKind::RuleFired,
        }
    }
}

/// An event as delivered to subscribers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    pub payload: EventPayload,

    /// When the event was fired
    pub time_fired: DateTime<Utc>,

    /// Context tracking the origin and causality of the mutation
    pub context: Context,
}

impl Event {
    /// Create a new event with the current timestamp
    pub fn new(payload: EventPayload, context: Context) -> Self {
        Self {
            payload,
            time_fired: Utc::now(),
            context,
        }
    }

    /// Discriminant of the payload
    pub fn kind(&self) -> EventKind {
        self.payload.kind()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{SensorId, SensorKind};

    #[test]
    fn test_payload_kind() {
        let site_id = SiteId::new("1").unwrap();
        let old = Sensor::new(
            SensorId::new("s1").unwrap(),
            "Température Air",
            SensorKind::Temperature,
            24.5,
            site_id.clone(),
        );
        let new = old.with_value(30.0);

        let payload = EventPayload::SensorUpdated(SensorUpdatedData { site_id, old, new });
        assert_eq!(payload.kind(), EventKind::SensorUpdated);
    }

    #[test]
    fn test_event_serde_tagging() {
        let site_id = SiteId::new("1").unwrap();
        let payload = EventPayload::SiteStatusChanged(SiteStatusChangedData {
            site_id,
            old: SiteStatus::Active,
            new: SiteStatus::Maintenance,
        });
        let event = Event::new(payload, Context::new());

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["type"], "site_status_changed");
        assert_eq!(json["payload"]["new"], "maintenance");
    }
}
