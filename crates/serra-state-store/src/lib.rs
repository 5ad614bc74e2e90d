//! Site state store for serra
//!
//! The SiteStore owns the collection of monitored sites and everything they
//! compose: sensors and equipment. It is responsible for:
//! - Keeping sites in registration order (the read contract is an ordered
//!   sequence)
//! - Maintaining sensor→site and equipment→site indexes for direct lookups
//! - Mutating via immutable snapshot + replace: a write clones the owning
//!   site, rewrites the child, and swaps the entry, so concurrent readers
//!   always observe a consistent site
//! - Firing change events on the event bus
//!
//! Unknown identifiers are typed errors, never silent no-ops: callers can
//! always distinguish "not found" from "no change needed".

use indexmap::IndexMap;
use serra_core::{
    Context, Equipment, EquipmentChangedData, EquipmentId, EventPayload, Sensor, SensorId,
    SensorUpdatedData, Site, SiteId, SiteStatus, SiteStatusChangedData,
};
use serra_event_bus::EventBus;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, instrument, warn};

/// Errors from store operations
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("site not found: {0}")]
    SiteNotFound(SiteId),

    #[error("sensor not found: {0}")]
    SensorNotFound(SensorId),

    #[error("equipment not found: {0}")]
    EquipmentNotFound(EquipmentId),

    #[error("site already registered: {0}")]
    DuplicateSite(SiteId),

    #[error("sensor {0} is already registered on another site")]
    DuplicateSensor(SensorId),

    #[error("equipment {0} is already registered on another site")]
    DuplicateEquipment(EquipmentId),

    #[error("child {child} of site {site} carries foreign owner {owner}")]
    ForeignChild {
        site: SiteId,
        child: String,
        owner: SiteId,
    },

    #[error("non-finite reading {value} rejected for sensor {sensor_id}")]
    InvalidReading { sensor_id: SensorId, value: f64 },
}

/// Result type for store operations
pub type StoreResult<T> = Result<T, StoreError>;

/// Outcome of a state-aware equipment write
///
/// `changed` is false when the equipment was already in the requested state;
/// the write is then a recorded no-op: no timestamp bump, no event.
#[derive(Debug, Clone)]
pub struct EquipmentWrite {
    pub equipment: Equipment,
    pub changed: bool,
}

struct Inner {
    /// Sites in registration order
    sites: IndexMap<SiteId, Site>,
    /// Sensor id → owning site
    sensor_index: HashMap<SensorId, SiteId>,
    /// Equipment id → owning site
    equipment_index: HashMap<EquipmentId, SiteId>,
}

/// The store tracking all sites and their children
pub struct SiteStore {
    inner: RwLock<Inner>,
    bus: Arc<EventBus>,
}

impl SiteStore {
    /// Create an empty store publishing on the given bus
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            inner: RwLock::new(Inner {
                sites: IndexMap::new(),
                sensor_index: HashMap::new(),
                equipment_index: HashMap::new(),
            }),
            bus,
        }
    }

    /// Register a site and index its children
    ///
    /// Rejects duplicate site ids, children owned by another site, and
    /// sensor/equipment ids already registered elsewhere.
    pub fn insert_site(&self, site: Site) -> StoreResult<()> {
        let mut inner = self.inner.write().expect("store lock poisoned");

        if inner.sites.contains_key(&site.id) {
            return Err(StoreError::DuplicateSite(site.id));
        }
        for sensor in &site.sensors {
            if sensor.site_id != site.id {
                return Err(StoreError::ForeignChild {
                    site: site.id.clone(),
                    child: sensor.id.to_string(),
                    owner: sensor.site_id.clone(),
                });
            }
            if inner.sensor_index.contains_key(&sensor.id) {
                return Err(StoreError::DuplicateSensor(sensor.id.clone()));
            }
        }
        for equipment in &site.equipment {
            if equipment.site_id != site.id {
                return Err(StoreError::ForeignChild {
                    site: site.id.clone(),
                    child: equipment.id.to_string(),
                    owner: equipment.site_id.clone(),
                });
            }
            if inner.equipment_index.contains_key(&equipment.id) {
                return Err(StoreError::DuplicateEquipment(equipment.id.clone()));
            }
        }

        for sensor in &site.sensors {
            inner.sensor_index.insert(sensor.id.clone(), site.id.clone());
        }
        for equipment in &site.equipment {
            inner
                .equipment_index
                .insert(equipment.id.clone(), site.id.clone());
        }

        debug!(site_id = %site.id, sensors = site.sensors.len(), equipment = site.equipment.len(), "Registered site");
        inner.sites.insert(site.id.clone(), site);
        Ok(())
    }

    /// All sites, in registration order
    pub fn sites(&self) -> Vec<Site> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner.sites.values().cloned().collect()
    }

    /// A single site snapshot
    pub fn site(&self, id: &SiteId) -> StoreResult<Site> {
        let inner = self.inner.read().expect("store lock poisoned");
        inner
            .sites
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::SiteNotFound(id.clone()))
    }

    /// Direct sensor lookup across all sites
    pub fn sensor(&self, id: &SensorId) -> StoreResult<Sensor> {
        let inner = self.inner.read().expect("store lock poisoned");
        let site_id = inner
            .sensor_index
            .get(id)
            .ok_or_else(|| StoreError::SensorNotFound(id.clone()))?;
        let site = inner
            .sites
            .get(site_id)
            .ok_or_else(|| StoreError::SiteNotFound(site_id.clone()))?;
        site.sensor(id)
            .cloned()
            .ok_or_else(|| StoreError::SensorNotFound(id.clone()))
    }

    /// Direct equipment lookup across all sites
    pub fn equipment(&self, id: &EquipmentId) -> StoreResult<Equipment> {
        let inner = self.inner.read().expect("store lock poisoned");
        let site_id = inner
            .equipment_index
            .get(id)
            .ok_or_else(|| StoreError::EquipmentNotFound(id.clone()))?;
        let site = inner
            .sites
            .get(site_id)
            .ok_or_else(|| StoreError::SiteNotFound(site_id.clone()))?;
        site.equipment(id)
            .cloned()
            .ok_or_else(|| StoreError::EquipmentNotFound(id.clone()))
    }

    /// Ingest a sensor reading
    ///
    /// Updates the value and `last_update`, re-derives the status, and fires
    /// a SensorUpdated event. Non-finite readings are rejected.
    #[instrument(skip(self, context), fields(sensor_id = %sensor_id))]
    pub fn set_sensor_value(
        &self,
        sensor_id: &SensorId,
        value: f64,
        context: Context,
    ) -> StoreResult<Sensor> {
        if !value.is_finite() {
            warn!(value, "Rejecting non-finite sensor reading");
            return Err(StoreError::InvalidReading {
                sensor_id: sensor_id.clone(),
                value,
            });
        }

        let (site_id, old, new) = {
            let mut inner = self.inner.write().expect("store lock poisoned");
            let site_id = inner
                .sensor_index
                .get(sensor_id)
                .cloned()
                .ok_or_else(|| StoreError::SensorNotFound(sensor_id.clone()))?;
            let site = inner
                .sites
                .get(&site_id)
                .ok_or_else(|| StoreError::SiteNotFound(site_id.clone()))?;

            let pos = site
                .sensors
                .iter()
                .position(|s| &s.id == sensor_id)
                .ok_or_else(|| StoreError::SensorNotFound(sensor_id.clone()))?;

            let old = site.sensors[pos].clone();
            let new = old.with_value(value);

            // snapshot + replace: readers never see a half-written site
            let mut updated = site.clone();
            updated.sensors[pos] = new.clone();
            inner.sites.insert(site_id.clone(), updated);

            (site_id, old, new)
        };

        debug!(
            value = new.value,
            status = ?new.status,
            "Sensor reading ingested"
        );
        self.bus.fire(
            EventPayload::SensorUpdated(SensorUpdatedData {
                site_id,
                old,
                new: new.clone(),
            }),
            context,
        );

        Ok(new)
    }

    /// Flip an actuator's active state
    #[instrument(skip(self, context), fields(equipment_id = %equipment_id))]
    pub fn toggle_equipment(
        &self,
        equipment_id: &EquipmentId,
        context: Context,
    ) -> StoreResult<Equipment> {
        let write = self.write_equipment(equipment_id, |active| !active, context)?;
        Ok(write.equipment)
    }

    /// Drive an actuator to a target state
    ///
    /// When the equipment is already in the requested state the call is a
    /// recorded no-op: `changed` is false, `last_action` keeps its value,
    /// and no event is fired.
    #[instrument(skip(self, context), fields(equipment_id = %equipment_id))]
    pub fn set_equipment_active(
        &self,
        equipment_id: &EquipmentId,
        active: bool,
        context: Context,
    ) -> StoreResult<EquipmentWrite> {
        self.write_equipment(equipment_id, |_| active, context)
    }

    /// Change a site's operational status
    ///
    /// Fires SiteStatusChanged on a real transition; setting the current
    /// status again returns the unchanged snapshot.
    pub fn set_site_status(
        &self,
        site_id: &SiteId,
        status: SiteStatus,
        context: Context,
    ) -> StoreResult<Site> {
        let (old, site) = {
            let mut inner = self.inner.write().expect("store lock poisoned");
            let site = inner
                .sites
                .get(site_id)
                .ok_or_else(|| StoreError::SiteNotFound(site_id.clone()))?;

            let old = site.status;
            if old == status {
                return Ok(site.clone());
            }

            let mut updated = site.clone();
            updated.status = status;
            inner.sites.insert(site_id.clone(), updated.clone());
            (old, updated)
        };

        debug!(site_id = %site_id, ?old, new = ?status, "Site status changed");
        self.bus.fire(
            EventPayload::SiteStatusChanged(SiteStatusChangedData {
                site_id: site_id.clone(),
                old,
                new: status,
            }),
            context,
        );
        Ok(site)
    }

    /// Number of registered sites
    pub fn site_count(&self) -> usize {
        self.inner.read().expect("store lock poisoned").sites.len()
    }

    fn write_equipment(
        &self,
        equipment_id: &EquipmentId,
        desired: impl FnOnce(bool) -> bool,
        context: Context,
    ) -> StoreResult<EquipmentWrite> {
        let (payload, write) = {
            let mut inner = self.inner.write().expect("store lock poisoned");
            let site_id = inner
                .equipment_index
                .get(equipment_id)
                .cloned()
                .ok_or_else(|| StoreError::EquipmentNotFound(equipment_id.clone()))?;
            let site = inner
                .sites
                .get(&site_id)
                .ok_or_else(|| StoreError::SiteNotFound(site_id.clone()))?;

            let pos = site
                .equipment
                .iter()
                .position(|e| &e.id == equipment_id)
                .ok_or_else(|| StoreError::EquipmentNotFound(equipment_id.clone()))?;

            let old = site.equipment[pos].clone();
            let target = desired(old.active);
            if target == old.active {
                return Ok(EquipmentWrite {
                    equipment: old,
                    changed: false,
                });
            }

            let new = old.with_active(target);
            let mut updated = site.clone();
            updated.equipment[pos] = new.clone();
            inner.sites.insert(site_id.clone(), updated);

            (
                EventPayload::EquipmentChanged(EquipmentChangedData {
                    site_id,
                    old,
                    new: new.clone(),
                }),
                EquipmentWrite {
                    equipment: new,
                    changed: true,
                },
            )
        };

        debug!(active = write.equipment.active, "Equipment state changed");
        self.bus.fire(payload, context);
        Ok(write)
    }
}

/// Thread-safe wrapper for SiteStore
pub type SharedSiteStore = Arc<SiteStore>;
