//! Configuration file model and conversion into store entities

use serde::{Deserialize, Serialize};

use serra_alerts::NotificationSettings;
use serra_automation::RuleConfig;
use serra_core::{
    Coordinates, Equipment, EquipmentId, EquipmentKind, Sensor, SensorId, SensorKind, Site,
    SiteId, SiteStatus,
};

use crate::error::{ConfigError, ConfigResult};

/// Top-level configuration document
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerraConfig {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub sites: Vec<SiteConfig>,

    #[serde(default)]
    pub rules: Vec<RuleConfig>,

    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl SerraConfig {
    /// Convert every site definition into a store entity
    pub fn build_sites(&self) -> ConfigResult<Vec<Site>> {
        self.sites.iter().map(SiteConfig::build).collect()
    }
}

/// Evaluation loop settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSettings {
    /// Seconds between evaluation passes
    #[serde(default = "default_tick_secs")]
    pub tick_interval_secs: u64,

    /// Depth of the serialized command queue
    #[serde(default = "default_command_buffer")]
    pub command_buffer: usize,
}

fn default_tick_secs() -> u64 {
    30
}

fn default_command_buffer() -> usize {
    32
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            tick_interval_secs: default_tick_secs(),
            command_buffer: default_command_buffer(),
        }
    }
}

/// One site definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub id: String,
    pub name: String,
    pub location: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub coordinates: Option<Coordinates>,

    #[serde(default = "default_site_status")]
    pub status: SiteStatus,

    #[serde(default)]
    pub sensors: Vec<SensorConfig>,

    #[serde(default)]
    pub equipment: Vec<EquipmentConfig>,
}

fn default_site_status() -> SiteStatus {
    SiteStatus::Active
}

impl SiteConfig {
    /// Build the store entity, validating ids and readings
    ///
    /// Sensor status is always derived from the configured value; the file
    /// cannot claim a status the reading does not support.
    pub fn build(&self) -> ConfigResult<Site> {
        let site_id = SiteId::new(&self.id).map_err(|e| ConfigError::InvalidValue {
            key: format!("sites[{}].id", self.id),
            reason: e.to_string(),
        })?;

        let mut site = Site::new(site_id.clone(), &self.name, &self.location);
        site.coordinates = self.coordinates;
        site.status = self.status;

        for sensor in &self.sensors {
            if !sensor.value.is_finite() {
                return Err(ConfigError::InvalidValue {
                    key: format!("sites[{}].sensors[{}].value", self.id, sensor.id),
                    reason: format!("reading must be finite, got {}", sensor.value),
                });
            }
            let sensor_id = SensorId::new(&sensor.id).map_err(|e| ConfigError::InvalidValue {
                key: format!("sites[{}].sensors[{}].id", self.id, sensor.id),
                reason: e.to_string(),
            })?;
            site.sensors.push(Sensor::new(
                sensor_id,
                &sensor.name,
                sensor.kind,
                sensor.value,
                site_id.clone(),
            ));
        }

        for equipment in &self.equipment {
            let equipment_id =
                EquipmentId::new(&equipment.id).map_err(|e| ConfigError::InvalidValue {
                    key: format!("sites[{}].equipment[{}].id", self.id, equipment.id),
                    reason: e.to_string(),
                })?;
            site.equipment.push(Equipment::new(
                equipment_id,
                &equipment.name,
                equipment.kind,
                equipment.active,
                site_id.clone(),
            ));
        }

        Ok(site)
    }
}

/// One sensor definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SensorConfig {
    pub id: String,
    pub name: String,

    #[serde(alias = "type")]
    pub kind: SensorKind,

    /// Initial reading
    pub value: f64,
}

/// One equipment definition
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EquipmentConfig {
    pub id: String,
    pub name: String,

    #[serde(alias = "type")]
    pub kind: EquipmentKind,

    #[serde(default)]
    pub active: bool,
}
