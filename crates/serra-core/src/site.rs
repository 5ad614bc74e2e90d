//! Site model: a monitored greenhouse installation owning sensors and equipment

use serde::{Deserialize, Serialize};

use crate::{Equipment, EquipmentId, Sensor, SensorId, SensorKind, SiteId};

/// Operational status of a site
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SiteStatus {
    Active,
    Maintenance,
    Offline,
}

/// Geographic position of a site
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

/// A monitored physical greenhouse installation
///
/// Sites own their sensors and equipment by composition; every child carries
/// the owning `site_id` and the store enforces that they agree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Site {
    pub id: SiteId,
    pub name: String,
    pub location: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    pub status: SiteStatus,

    pub sensors: Vec<Sensor>,
    pub equipment: Vec<Equipment>,
}

impl Site {
    /// Create an empty active site
    pub fn new(id: SiteId, name: impl Into<String>, location: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            location: location.into(),
            coordinates: None,
            status: SiteStatus::Active,
            sensors: Vec::new(),
            equipment: Vec::new(),
        }
    }

    /// Find an owned sensor by id
    pub fn sensor(&self, id: &SensorId) -> Option<&Sensor> {
        self.sensors.iter().find(|s| &s.id == id)
    }

    /// Find an owned actuator by id
    pub fn equipment(&self, id: &EquipmentId) -> Option<&Equipment> {
        self.equipment.iter().find(|e| &e.id == id)
    }

    /// First sensor of the given kind, in declaration order
    ///
    /// Rule conditions name a sensor kind rather than a sensor id; when a
    /// site carries several sensors of one kind the first one declared is
    /// authoritative.
    pub fn first_sensor_of(&self, kind: SensorKind) -> Option<&Sensor> {
        self.sensors.iter().find(|s| s.kind == kind)
    }

    /// Whether any owned sensor has the given kind
    pub fn has_sensor_kind(&self, kind: SensorKind) -> bool {
        self.first_sensor_of(kind).is_some()
    }

    /// Whether the site participates in rule evaluation
    pub fn is_active(&self) -> bool {
        self.status == SiteStatus::Active
    }
}
