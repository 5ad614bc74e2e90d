//! Equipment model: binary actuators attached to a site

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EquipmentId, SiteId};

/// Kind of actuator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EquipmentKind {
    Pump,
    Fan,
    Light,
    Heater,
    Cooling,
}

/// A typed actuator with a binary active state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Equipment {
    pub id: EquipmentId,
    pub name: String,
    pub kind: EquipmentKind,

    /// Whether the actuator is currently running
    pub active: bool,

    /// When the active state last changed
    pub last_action: DateTime<Utc>,

    /// Owning site
    pub site_id: SiteId,
}

impl Equipment {
    /// Create equipment in the given initial state
    pub fn new(
        id: EquipmentId,
        name: impl Into<String>,
        kind: EquipmentKind,
        active: bool,
        site_id: SiteId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            active,
            last_action: Utc::now(),
            site_id,
        }
    }

    /// Copy-on-write state change with a fresh action timestamp
    pub fn with_active(&self, active: bool) -> Self {
        Self {
            active,
            last_action: Utc::now(),
            ..self.clone()
        }
    }
}
