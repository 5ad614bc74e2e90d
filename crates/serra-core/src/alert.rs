//! Alert model: records of out-of-normal sensor conditions

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ulid::Ulid;

use crate::{AlertId, SensorId, SiteId};

/// How urgent an alert is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

/// A record of an out-of-normal sensor condition requiring acknowledgment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Alert {
    pub id: AlertId,
    pub site_id: SiteId,
    pub sensor_id: SensorId,
    pub message: String,
    pub severity: Severity,
    pub timestamp: DateTime<Utc>,
    pub acknowledged: bool,
}

impl Alert {
    /// Create an unacknowledged alert with a generated id
    pub fn new(
        site_id: SiteId,
        sensor_id: SensorId,
        message: impl Into<String>,
        severity: Severity,
    ) -> Self {
        // ULIDs contain no whitespace, so this cannot fail
        let id = AlertId::new(Ulid::new().to_string()).expect("ulid is a valid id");
        Self {
            id,
            site_id,
            sensor_id,
            message: message.into(),
            severity,
            timestamp: Utc::now(),
            acknowledged: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_alert_is_unacknowledged() {
        let alert = Alert::new(
            SiteId::new("1").unwrap(),
            SensorId::new("s2").unwrap(),
            "Humidité de l'air élevée (68%)",
            Severity::Warning,
        );

        assert!(!alert.acknowledged);
        assert_eq!(alert.severity, Severity::Warning);
        assert!(!alert.id.as_str().is_empty());
    }

    #[test]
    fn test_severity_ordering() {
        assert!(Severity::Critical > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
    }
}
