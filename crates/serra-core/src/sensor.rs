//! Sensor model: typed measurement sources attached to a site

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{SensorId, SiteId};

/// Kind of measurement a sensor produces
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorKind {
    Temperature,
    HumidityAir,
    HumiditySoil,
    Ph,
    Light,
}

impl SensorKind {
    /// Unit readings of this kind are reported in
    pub fn canonical_unit(&self) -> &'static str {
        match self {
            SensorKind::Temperature => "°C",
            SensorKind::HumidityAir | SensorKind::HumiditySoil => "%",
            SensorKind::Ph => "pH",
            SensorKind::Light => "lux",
        }
    }

    /// Band of readings considered nominal for a greenhouse crop
    fn nominal_band(&self) -> (f64, f64) {
        match self {
            SensorKind::Temperature => (18.0, 28.0),
            SensorKind::HumidityAir => (40.0, 65.0),
            SensorKind::HumiditySoil => (40.0, 70.0),
            SensorKind::Ph => (6.0, 7.5),
            SensorKind::Light => (200.0, 2000.0),
        }
    }

    /// Band outside of which a reading is critical rather than a warning
    fn tolerated_band(&self) -> (f64, f64) {
        match self {
            SensorKind::Temperature => (10.0, 32.0),
            SensorKind::HumidityAir => (25.0, 80.0),
            SensorKind::HumiditySoil => (30.0, 85.0),
            SensorKind::Ph => (5.5, 8.0),
            SensorKind::Light => (50.0, 5000.0),
        }
    }

    /// Classify a reading against this kind's bands
    pub fn classify(&self, value: f64) -> SensorStatus {
        let (lo, hi) = self.nominal_band();
        if value >= lo && value <= hi {
            return SensorStatus::Ok;
        }
        let (lo, hi) = self.tolerated_band();
        if value >= lo && value <= hi {
            SensorStatus::Warning
        } else {
            SensorStatus::Critical
        }
    }
}

/// Health classification of a sensor's latest reading
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SensorStatus {
    Ok,
    Warning,
    Critical,
}

/// A typed read-only measurement source attached to a site
///
/// Sensors are never mutated in place. An ingested reading produces a new
/// Sensor via [`Sensor::with_value`], and the store swaps the snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sensor {
    pub id: SensorId,
    pub name: String,
    pub kind: SensorKind,

    /// Latest reading, in `unit`
    pub value: f64,
    pub unit: String,

    /// Derived from `value` and the kind's bands, never stored independently
    pub status: SensorStatus,

    /// When the latest reading was ingested
    pub last_update: DateTime<Utc>,

    /// Owning site
    pub site_id: SiteId,
}

impl Sensor {
    /// Create a sensor with status derived from the initial reading
    pub fn new(
        id: SensorId,
        name: impl Into<String>,
        kind: SensorKind,
        value: f64,
        site_id: SiteId,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            value,
            unit: kind.canonical_unit().to_string(),
            status: kind.classify(value),
            last_update: Utc::now(),
            site_id,
        }
    }

    /// Copy-on-write update: new reading, fresh timestamp, re-derived status
    pub fn with_value(&self, value: f64) -> Self {
        Self {
            value,
            status: self.kind.classify(value),
            last_update: Utc::now(),
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sensor(kind: SensorKind, value: f64) -> Sensor {
        Sensor::new(
            SensorId::new("s1").unwrap(),
            "Température Air",
            kind,
            value,
            SiteId::new("1").unwrap(),
        )
    }

    #[test]
    fn test_classify_temperature() {
        assert_eq!(SensorKind::Temperature.classify(24.5), SensorStatus::Ok);
        assert_eq!(SensorKind::Temperature.classify(30.0), SensorStatus::Warning);
        assert_eq!(
            SensorKind::Temperature.classify(32.5),
            SensorStatus::Critical
        );
        assert_eq!(SensorKind::Temperature.classify(5.0), SensorStatus::Critical);
    }

    #[test]
    fn test_classify_humidity_air() {
        assert_eq!(SensorKind::HumidityAir.classify(55.0), SensorStatus::Ok);
        // 68% is the stock demo warning reading
        assert_eq!(SensorKind::HumidityAir.classify(68.0), SensorStatus::Warning);
        assert_eq!(
            SensorKind::HumidityAir.classify(90.0),
            SensorStatus::Critical
        );
    }

    #[test]
    fn test_with_value_rederives_status() {
        let s = sensor(SensorKind::Temperature, 24.5);
        assert_eq!(s.status, SensorStatus::Ok);

        let updated = s.with_value(33.0);
        assert_eq!(updated.status, SensorStatus::Critical);
        assert_eq!(updated.value, 33.0);
        assert!(updated.last_update >= s.last_update);
        // original snapshot untouched
        assert_eq!(s.value, 24.5);
    }

    #[test]
    fn test_serde_kind_names() {
        let json = serde_json::to_string(&SensorKind::HumiditySoil).unwrap();
        assert_eq!(json, "\"humidity_soil\"");

        let kind: SensorKind = serde_json::from_str("\"ph\"").unwrap();
        assert_eq!(kind, SensorKind::Ph);
    }
}
