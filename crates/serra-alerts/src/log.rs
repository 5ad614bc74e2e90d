//! Alert log: owns all alert records

use indexmap::IndexMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;
use tracing::{debug, info};

use serra_core::{
    Alert, AlertId, AlertRaisedData, Context, EventPayload, SensorId, Severity, SiteId,
};
use serra_event_bus::EventBus;

/// Errors from alert log operations
#[derive(Debug, Error)]
pub enum AlertError {
    #[error("alert not found: {0}")]
    NotFound(AlertId),
}

/// Result type for alert log operations
pub type AlertResult<T> = Result<T, AlertError>;

/// Owns every alert record, in raise order
pub struct AlertLog {
    alerts: RwLock<IndexMap<AlertId, Alert>>,
    bus: Arc<EventBus>,
}

impl AlertLog {
    /// Create an empty log publishing on the given bus
    pub fn new(bus: Arc<EventBus>) -> Self {
        Self {
            alerts: RwLock::new(IndexMap::new()),
            bus,
        }
    }

    /// Raise a new alert and fire AlertRaised
    pub fn raise(
        &self,
        site_id: SiteId,
        sensor_id: SensorId,
        message: impl Into<String>,
        severity: Severity,
        context: Context,
    ) -> Alert {
        let alert = Alert::new(site_id, sensor_id, message, severity);
        info!(alert_id = %alert.id, ?severity, message = %alert.message, "Alert raised");

        {
            let mut alerts = self.alerts.write().expect("alert log lock poisoned");
            alerts.insert(alert.id.clone(), alert.clone());
        }
        self.bus.fire(
            EventPayload::AlertRaised(AlertRaisedData {
                alert: alert.clone(),
            }),
            context,
        );
        alert
    }

    /// Mark an alert acknowledged
    ///
    /// Idempotent: acknowledging an already-acknowledged alert succeeds and
    /// leaves the record unchanged.
    pub fn acknowledge(&self, id: &AlertId) -> AlertResult<Alert> {
        let mut alerts = self.alerts.write().expect("alert log lock poisoned");
        let alert = alerts
            .get_mut(id)
            .ok_or_else(|| AlertError::NotFound(id.clone()))?;
        if !alert.acknowledged {
            alert.acknowledged = true;
            debug!(alert_id = %id, "Alert acknowledged");
        }
        Ok(alert.clone())
    }

    /// Remove exactly the alert with the given id
    pub fn delete(&self, id: &AlertId) -> AlertResult<Alert> {
        let mut alerts = self.alerts.write().expect("alert log lock poisoned");
        let alert = alerts
            .shift_remove(id)
            .ok_or_else(|| AlertError::NotFound(id.clone()))?;
        debug!(alert_id = %id, "Alert deleted");
        Ok(alert)
    }

    /// Get an alert snapshot
    pub fn get(&self, id: &AlertId) -> AlertResult<Alert> {
        let alerts = self.alerts.read().expect("alert log lock poisoned");
        alerts
            .get(id)
            .cloned()
            .ok_or_else(|| AlertError::NotFound(id.clone()))
    }

    /// All alerts, oldest first
    pub fn all(&self) -> Vec<Alert> {
        let alerts = self.alerts.read().expect("alert log lock poisoned");
        alerts.values().cloned().collect()
    }

    /// Alerts scoped to one site
    pub fn for_site(&self, site_id: &SiteId) -> Vec<Alert> {
        let alerts = self.alerts.read().expect("alert log lock poisoned");
        alerts
            .values()
            .filter(|a| &a.site_id == site_id)
            .cloned()
            .collect()
    }

    /// Alerts nobody has acknowledged yet
    pub fn unacknowledged(&self) -> Vec<Alert> {
        let alerts = self.alerts.read().expect("alert log lock poisoned");
        alerts
            .values()
            .filter(|a| !a.acknowledged)
            .cloned()
            .collect()
    }

    /// Number of unacknowledged alerts
    pub fn unacknowledged_count(&self) -> usize {
        self.unacknowledged().len()
    }

    /// Total number of alerts
    pub fn count(&self) -> usize {
        self.alerts.read().expect("alert log lock poisoned").len()
    }
}
